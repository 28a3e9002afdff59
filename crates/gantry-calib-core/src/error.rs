use thiserror::Error;

/// Malformed-input errors raised by the core data types and transforms.
///
/// These are never recovered from internally: callers are expected to fix
/// their input rather than retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("expected {expected} parameters, got {got}")]
    ParamLength { expected: usize, got: usize },
    #[error("quadratic matrix must have a zero third row, got {0:?}")]
    QuadraticThirdRow([f64; 3]),
    #[error("unknown track '{0}'")]
    UnknownTrack(String),
    #[error("track '{0}' already exists")]
    DuplicateTrack(String),
    #[error("track '{name}' has {got} samples, series has {expected}")]
    TrackLength {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("time column is not sorted at index {0}")]
    UnsortedTime(usize),
    #[error("number of fitted markers ({fitted}) does not match the number of raw markers ({raw})")]
    MarkerCountMismatch { raw: usize, fitted: usize },
    #[error("bounds for axis {axis} are inverted: min {min} > max {max}")]
    InvertedBounds { axis: usize, min: f64, max: f64 },
    #[error("bad frame range [{start}, {end}] is inverted")]
    InvertedRange { start: usize, end: usize },
    #[error("invalid axis '{0}', expected one of x, y, z")]
    InvalidAxis(String),
    #[error("{0}")]
    Invalid(String),
}
