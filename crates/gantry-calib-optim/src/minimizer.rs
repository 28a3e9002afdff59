//! Derivative-free minimization interface.
//!
//! Solvers in this crate depend only on [`Minimizer`]; the concrete method
//! ([`crate::Powell`] by default) is injected by the caller.

use gantry_calib_core::Real;
use log::info;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::OptimError;

/// Scalar objective over a dense parameter vector.
pub trait Objective {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;
    /// Objective value; `NaN` is treated as `+inf` by minimizers.
    fn value(&self, x: &DVector<Real>) -> Real;
}

/// Adapter turning a closure into an [`Objective`].
pub struct FnObjective<F> {
    n: usize,
    f: F,
}

impl<F> FnObjective<F>
where
    F: Fn(&DVector<Real>) -> Real,
{
    pub fn new(n: usize, f: F) -> Self {
        Self { n, f }
    }
}

impl<F> Objective for FnObjective<F>
where
    F: Fn(&DVector<Real>) -> Real,
{
    fn num_params(&self) -> usize {
        self.n
    }

    fn value(&self, x: &DVector<Real>) -> Real {
        (self.f)(x)
    }
}

/// Box constraint on one parameter. `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bound {
    pub lower: Option<Real>,
    pub upper: Option<Real>,
}

impl Bound {
    pub fn free() -> Self {
        Self::default()
    }

    pub fn new(lower: Real, upper: Real) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// `[center - half_width, center + half_width]`.
    pub fn around(center: Real, half_width: Real) -> Self {
        Self::new(center - half_width, center + half_width)
    }

    pub fn lower_or_inf(&self) -> Real {
        self.lower.unwrap_or(Real::NEG_INFINITY)
    }

    pub fn upper_or_inf(&self) -> Real {
        self.upper.unwrap_or(Real::INFINITY)
    }

    pub fn is_free(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }
}

/// Snapshot passed to progress observers once per outer iteration.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub iteration: usize,
    pub evaluations: usize,
    pub fval: Real,
    pub x: &'a DVector<Real>,
}

/// Why a minimization stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Converged,
    MaxIterations,
    MaxEvaluations,
}

/// Outcome of a minimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimizeReport {
    /// Best parameters found.
    pub x: Vec<Real>,
    /// Objective value at `x`.
    pub fval: Real,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: Termination,
}

impl MinimizeReport {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Progress observer that logs the objective value.
pub fn log_progress(progress: &Progress<'_>) {
    info!("fval: {}", progress.fval);
}

/// A bound-constrained derivative-free minimizer.
pub trait Minimizer {
    /// Minimize `objective` from `x0`, reporting each outer iteration to
    /// `observer`. Observers cannot interrupt the search.
    fn minimize_observed(
        &self,
        objective: &dyn Objective,
        x0: &[Real],
        bounds: Option<&[Bound]>,
        observer: &mut dyn FnMut(&Progress<'_>),
    ) -> Result<MinimizeReport, OptimError>;

    /// [`minimize_observed`](Self::minimize_observed) with [`log_progress`].
    fn minimize(
        &self,
        objective: &dyn Objective,
        x0: &[Real],
        bounds: Option<&[Bound]>,
    ) -> Result<MinimizeReport, OptimError> {
        self.minimize_observed(objective, x0, bounds, &mut log_progress)
    }
}

/// Check `x0` and `bounds` against the objective dimension.
pub(crate) fn validate_inputs(
    objective: &dyn Objective,
    x0: &[Real],
    bounds: Option<&[Bound]>,
) -> Result<(), OptimError> {
    let n = objective.num_params();
    if x0.len() != n {
        return Err(OptimError::Dimension {
            expected: n,
            got: x0.len(),
        });
    }
    if let Some(bounds) = bounds {
        if bounds.len() != n {
            return Err(OptimError::BoundsLength {
                expected: n,
                got: bounds.len(),
            });
        }
        for (index, b) in bounds.iter().enumerate() {
            let (lower, upper) = (b.lower_or_inf(), b.upper_or_inf());
            if lower > upper {
                return Err(OptimError::InvertedBound {
                    index,
                    lower,
                    upper,
                });
            }
        }
    }
    Ok(())
}
