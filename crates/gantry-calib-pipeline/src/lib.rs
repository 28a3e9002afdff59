//! Data pipeline for gantry vs. motion-capture calibration.
//!
//! - [`io`]: motion-capture export, gantry log and side-file loaders.
//! - [`sync`]: the synchronized multi-track dataset.
//! - [`cache`]: persistence of fitted parameter vectors.
//! - [`session`]: generic session container and problem trait.
//! - [`gantry_calibration`]: the calibration problem and its steps.
//! - [`export`]: controller configuration text.

pub mod cache;
pub mod export;
pub mod gantry_calibration;
pub mod io;
pub mod session;
pub mod stats;
pub mod sync;

pub use cache::{JsonFileCache, MemoryCache, ParamCache};
pub use export::kinematics_config;
pub use gantry_calibration::{
    GantryCalibrationConfig, GantryCalibrationExport, GantryCalibrationInput,
    GantryCalibrationProblem, run_calibration,
};
pub use session::CalibrationSession;
pub use stats::ErrorStats;
pub use sync::SyncedDataset;
