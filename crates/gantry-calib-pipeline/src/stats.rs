use std::fmt;

use gantry_calib_core::Real;
use serde::{Deserialize, Serialize};

/// Summary of an error column, undefined samples skipped.
///
/// `mean` and `std` are the maximum-likelihood normal fit (population
/// standard deviation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    pub count: usize,
    pub mean: Real,
    pub std: Real,
    pub rms: Real,
    pub max: Real,
}

impl ErrorStats {
    /// `None` if no value is defined.
    pub fn from_values(values: &[Real]) -> Option<Self> {
        let defined: Vec<Real> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if defined.is_empty() {
            return None;
        }
        let n = defined.len() as Real;
        let mean = defined.iter().sum::<Real>() / n;
        let var = defined.iter().map(|v| (v - mean).powi(2)).sum::<Real>() / n;
        let rms = (defined.iter().map(|v| v * v).sum::<Real>() / n).sqrt();
        let max = defined.iter().copied().fold(Real::NEG_INFINITY, Real::max);
        Some(Self {
            count: defined.len(),
            mean,
            std: var.sqrt(),
            rms,
            max,
        })
    }
}

impl fmt::Display for ErrorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} mean={:.4} std={:.4} rms={:.4} max={:.4}",
            self.count, self.mean, self.std, self.rms, self.max
        )
    }
}
