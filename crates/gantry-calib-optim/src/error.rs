use gantry_calib_core::{CoreError, Real};
use thiserror::Error;

/// Errors raised before or while running a minimization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("initial guess has {got} parameters, objective expects {expected}")]
    Dimension { expected: usize, got: usize },
    #[error("{got} bounds given for {expected} parameters")]
    BoundsLength { expected: usize, got: usize },
    #[error("bound {index} is inverted: lower {lower} > upper {upper}")]
    InvertedBound { index: usize, lower: Real, upper: Real },
    #[error("objective is not finite at the initial guess ({0})")]
    NonFiniteObjective(Real),
}
