//! Session framework: a serializable container advanced by step functions.
//!
//! A problem type declares its config, input, state, output and export
//! types through [`ProblemType`]; [`CalibrationSession`] holds one instance
//! of each together with metadata, a step log and recorded exports.

pub mod calibsession;
pub mod problem_type;
pub mod types;

pub use calibsession::CalibrationSession;
pub use problem_type::{InvalidationPolicy, ProblemType};
pub use types::{ExportRecord, LogEntry, SessionMetadata};
