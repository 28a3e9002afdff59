//! Powell's conjugate direction method with optional box constraints.
//!
//! Each outer iteration runs a line search along every direction of the
//! current set, then tries an extrapolated step along the net displacement
//! and, when promising, swaps it in for the direction of largest decrease.
//!
//! With bounds, every line search is restricted to the segment of the line
//! that stays inside the box, so iterates never leave it.

use gantry_calib_core::Real;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::OptimError;
use crate::line_search::{LineMin, bounded_brent, brent};
use crate::minimizer::{
    Bound, MinimizeReport, Minimizer, Objective, Progress, Termination, validate_inputs,
};

/// Options for [`Powell`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowellOptions {
    /// Relative tolerance on the objective decrease per outer iteration.
    pub ftol: Real,
    /// Relative tolerance of the line searches.
    pub xtol: Real,
    /// Outer iteration cap; `None` means `1000 × n`.
    pub max_iterations: Option<usize>,
    /// Objective evaluation cap; `None` means `1000 × n`.
    pub max_evaluations: Option<usize>,
}

impl Default for PowellOptions {
    fn default() -> Self {
        Self {
            ftol: 1e-9,
            xtol: 1e-9,
            max_iterations: None,
            max_evaluations: None,
        }
    }
}

impl PowellOptions {
    /// Same tolerance on objective and step, as a single `tol` knob.
    pub fn with_tol(tol: Real) -> Self {
        Self {
            ftol: tol,
            xtol: tol,
            ..Self::default()
        }
    }
}

/// Powell minimizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Powell {
    pub options: PowellOptions,
}

impl Powell {
    pub fn new(options: PowellOptions) -> Self {
        Self { options }
    }
}

/// Counts evaluations and maps undefined values to `+inf`.
struct Evaluator<'a> {
    objective: &'a dyn Objective,
    evaluations: usize,
}

impl Evaluator<'_> {
    fn eval(&mut self, x: &DVector<Real>) -> Real {
        self.evaluations += 1;
        let v = self.objective.value(x);
        if v.is_nan() { Real::INFINITY } else { v }
    }
}

/// Box limits as two dense vectors, `±inf` where unbounded.
struct BoxLimits {
    lower: DVector<Real>,
    upper: DVector<Real>,
}

impl BoxLimits {
    fn from_bounds(bounds: &[Bound]) -> Self {
        Self {
            lower: DVector::from_iterator(bounds.len(), bounds.iter().map(Bound::lower_or_inf)),
            upper: DVector::from_iterator(bounds.len(), bounds.iter().map(Bound::upper_or_inf)),
        }
    }

    fn clamp(&self, x: &DVector<Real>) -> DVector<Real> {
        DVector::from_fn(x.len(), |i, _| x[i].clamp(self.lower[i], self.upper[i]))
    }

    fn contains(&self, x: &DVector<Real>) -> bool {
        (0..x.len()).all(|i| self.lower[i] <= x[i] && x[i] <= self.upper[i])
    }

    /// Range `[lmin, lmax]` of `alpha` such that `x + alpha·d` stays in the box.
    fn line_range(&self, x: &DVector<Real>, d: &DVector<Real>) -> (Real, Real) {
        let mut lmin = Real::NEG_INFINITY;
        let mut lmax = Real::INFINITY;
        let mut any = false;
        for i in 0..x.len() {
            if d[i] == 0.0 {
                continue;
            }
            any = true;
            let low = (self.lower[i] - x[i]) / d[i];
            let high = (self.upper[i] - x[i]) / d[i];
            let (lo, hi) = if d[i] > 0.0 { (low, high) } else { (high, low) };
            lmin = lmin.max(lo);
            lmax = lmax.min(hi);
        }
        if !any || lmax < lmin {
            (0.0, 0.0)
        } else {
            (lmin, lmax)
        }
    }
}

/// Minimize along `d` from `x`. Returns the new value, point and the
/// displacement actually taken.
fn line_search(
    eval: &mut Evaluator<'_>,
    x: &DVector<Real>,
    d: &DVector<Real>,
    fval: Real,
    tol: Real,
    limits: Option<&BoxLimits>,
    max_evals: usize,
) -> (Real, DVector<Real>, DVector<Real>) {
    if d.iter().all(|&v| v == 0.0) {
        return (fval, x.clone(), d.clone());
    }

    let mut along = |alpha: Real| eval.eval(&(x + d * alpha));
    let range = limits.map(|l| l.line_range(x, d));

    let found = match range {
        None => brent(&mut along, tol),
        Some((lmin, lmax)) if lmin.is_infinite() && lmax.is_infinite() => brent(&mut along, tol),
        Some((lmin, lmax)) if lmin.is_finite() && lmax.is_finite() => {
            bounded_brent(&mut along, lmin, lmax, tol / 100.0, max_evals)
        }
        Some((lmin, lmax)) => {
            // Half-open range: search in arctan space so the interval is finite.
            let mut warped = |t: Real| along(t.tan());
            let m = bounded_brent(&mut warped, lmin.atan(), lmax.atan(), tol / 100.0, max_evals);
            LineMin {
                alpha: m.alpha.tan(),
                fval: m.fval,
            }
        }
    };

    // The bounded search never evaluates alpha = 0; keep the current point
    // if nothing better was found.
    if found.fval > fval {
        return (fval, x.clone(), DVector::zeros(x.len()));
    }
    let step = d * found.alpha;
    (found.fval, x + &step, step)
}

impl Minimizer for Powell {
    fn minimize_observed(
        &self,
        objective: &dyn Objective,
        x0: &[Real],
        bounds: Option<&[Bound]>,
        observer: &mut dyn FnMut(&Progress<'_>),
    ) -> Result<MinimizeReport, OptimError> {
        validate_inputs(objective, x0, bounds)?;
        let n = x0.len();
        let opts = &self.options;
        let max_iter = opts.max_iterations.unwrap_or(1000 * n);
        let max_evals = opts.max_evaluations.unwrap_or(1000 * n);
        let line_tol = opts.xtol * 100.0;

        let limits = bounds
            .filter(|b| b.iter().any(|b| !b.is_free()))
            .map(BoxLimits::from_bounds);

        let mut x = DVector::from_column_slice(x0);
        if let Some(limits) = &limits {
            if !limits.contains(&x) {
                warn!("initial guess is outside the bounds, clipping");
            }
            x = limits.clamp(&x);
        }

        let mut eval = Evaluator {
            objective,
            evaluations: 0,
        };
        let mut fval = eval.eval(&x);
        if !fval.is_finite() {
            return Err(OptimError::NonFiniteObjective(objective.value(&x)));
        }

        let mut directions = DMatrix::<Real>::identity(n, n);
        let mut x1 = x.clone();
        let mut iterations = 0;

        let termination = loop {
            let fx = fval;
            let mut biggest = 0;
            let mut delta = 0.0;

            for i in 0..n {
                let d = directions.row(i).transpose();
                let before = fval;
                let (f_new, x_new, _) =
                    line_search(&mut eval, &x, &d, fval, line_tol, limits.as_ref(), max_evals);
                fval = f_new;
                x = x_new;
                if before - fval > delta {
                    delta = before - fval;
                    biggest = i;
                }
            }

            iterations += 1;
            observer(&Progress {
                iteration: iterations,
                evaluations: eval.evaluations,
                fval,
                x: &x,
            });
            debug!("powell iter {iterations}: fval {fval:.6e}, evals {}", eval.evaluations);

            let bnd = opts.ftol * (fx.abs() + fval.abs()) + 1e-20;
            if 2.0 * (fx - fval) <= bnd {
                break Termination::Converged;
            }
            if eval.evaluations >= max_evals {
                break Termination::MaxEvaluations;
            }
            if iterations >= max_iter {
                break Termination::MaxIterations;
            }

            // Extrapolate along the net displacement of this iteration.
            let d = &x - &x1;
            x1 = x.clone();
            let lmax = match &limits {
                None => 1.0,
                Some(l) => l.line_range(&x, &d).1,
            };
            let x2 = &x + &d * lmax.min(1.0);
            let fx2 = eval.eval(&x2);

            if fx > fx2 {
                let mut t = 2.0 * (fx + fx2 - 2.0 * fval);
                let temp = fx - fval - delta;
                t *= temp * temp;
                let temp = fx - fx2;
                t -= delta * temp * temp;
                if t < 0.0 {
                    let (f_new, x_new, step) =
                        line_search(&mut eval, &x, &d, fval, line_tol, limits.as_ref(), max_evals);
                    fval = f_new;
                    x = x_new;
                    if step.iter().any(|&v| v != 0.0) {
                        let last = directions.row(n - 1).into_owned();
                        directions.set_row(biggest, &last);
                        directions.set_row(n - 1, &step.transpose());
                    }
                }
            }
        };

        Ok(MinimizeReport {
            x: x.iter().copied().collect(),
            fval,
            iterations,
            evaluations: eval.evaluations,
            termination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minimizer::FnObjective;
    use approx::assert_abs_diff_eq;

    fn rosenbrock(x: &DVector<Real>) -> Real {
        (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2)
    }

    #[test]
    fn minimizes_quadratic_bowl() {
        let f = FnObjective::new(3, |x: &DVector<Real>| {
            (x[0] - 1.0).powi(2) + 2.0 * (x[1] + 2.0).powi(2) + 0.5 * (x[2] - 0.3).powi(2)
        });
        let report = Powell::default().minimize(&f, &[0.0, 0.0, 0.0], None).unwrap();
        assert!(report.converged());
        assert_abs_diff_eq!(report.x[0], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(report.x[1], -2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(report.x[2], 0.3, epsilon = 1e-5);
        assert!(report.fval < 1e-9);
    }

    #[test]
    fn minimizes_rosenbrock() {
        let f = FnObjective::new(2, rosenbrock);
        let report = Powell::default().minimize(&f, &[-1.2, 1.0], None).unwrap();
        assert_abs_diff_eq!(report.x[0], 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(report.x[1], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn respects_bounds() {
        let f = FnObjective::new(2, |x: &DVector<Real>| (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2));
        let bounds = [Bound::new(-1.0, 1.0), Bound::free()];
        let mut seen_outside = false;
        let report = Powell::default()
            .minimize_observed(&f, &[0.0, 0.0], Some(&bounds), &mut |p| {
                seen_outside |= p.x[0] > 1.0 || p.x[0] < -1.0;
            })
            .unwrap();
        assert!(!seen_outside);
        assert_abs_diff_eq!(report.x[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(report.x[1], -1.0, epsilon = 1e-5);
    }

    #[test]
    fn clips_initial_guess_into_bounds() {
        let f = FnObjective::new(1, |x: &DVector<Real>| x[0] * x[0]);
        let report = Powell::default()
            .minimize(&f, &[5.0], Some(&[Bound::new(-2.0, 2.0)]))
            .unwrap();
        assert_abs_diff_eq!(report.x[0], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn half_open_bounds() {
        let f = FnObjective::new(1, |x: &DVector<Real>| (x[0] + 4.0).powi(2));
        let report = Powell::default()
            .minimize(&f, &[3.0], Some(&[Bound { lower: Some(0.5), upper: None }]))
            .unwrap();
        assert_abs_diff_eq!(report.x[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn undefined_objective_at_start_is_an_error() {
        let f = FnObjective::new(1, |_: &DVector<Real>| Real::NAN);
        assert!(matches!(
            Powell::default().minimize(&f, &[0.0], None),
            Err(OptimError::NonFiniteObjective(_))
        ));
    }

    #[test]
    fn observer_sees_every_iteration() {
        let f = FnObjective::new(2, rosenbrock);
        let mut calls = 0;
        let report = Powell::default()
            .minimize_observed(&f, &[0.0, 0.0], None, &mut |_| calls += 1)
            .unwrap();
        assert_eq!(calls, report.iterations);
    }

    #[test]
    fn evaluation_cap_is_honoured() {
        let f = FnObjective::new(2, rosenbrock);
        let powell = Powell::new(PowellOptions {
            max_evaluations: Some(30),
            ..PowellOptions::default()
        });
        let report = powell.minimize(&f, &[-1.2, 1.0], None).unwrap();
        assert_eq!(report.termination, Termination::MaxEvaluations);
    }
}
