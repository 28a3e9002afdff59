//! Offline sanity checks for a fitted calibration model.
//!
//! Two independent checks are provided:
//!
//! - [`jacobian_invertibility`]: a sufficient condition for the forward map
//!   to stay invertible over a whole envelope. With
//!   `D = 2·A⁻ᵀ·Bᵀ·diag(max|bound|)`, the Jacobian `Aᵀ(I + A⁻ᵀBᵀ·2·diag(q))`
//!   is non-singular everywhere in the envelope when `‖D‖ < 1` in any
//!   induced norm. The 1-norm and ∞-norm are tried.
//! - [`check_joint_bounds`]: the extremes of each joint over a commanded
//!   envelope, found by bounded minimization of the inverse-kinematics
//!   solution, compared against physical joint limits.
//!
//! Neither check returns an error for a failing model; the reports carry
//! `passed` and the offending values.

use gantry_calib_core::kinematics::{self, InverseOptions};
use gantry_calib_core::{Axis, AxisBounds, CalibrationParams, Mat3, Real, Vec3, norm_1, norm_inf};
use log::{debug, info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::OptimError;
use crate::minimizer::{Bound, FnObjective, Minimizer, Progress};

/// Outcome of [`jacobian_invertibility`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JacobianReport {
    /// `2·A⁻ᵀ·Bᵀ·diag(max|bound|)`, absent when `A` is singular.
    pub d: Option<Mat3>,
    pub norm_1: Real,
    pub norm_inf: Real,
    /// `norm_1 < 1 || norm_inf < 1`.
    pub passed: bool,
}

/// Check invertibility of the model over `envelope`.
pub fn jacobian_invertibility(params: &CalibrationParams, envelope: &AxisBounds) -> JacobianReport {
    let Some(a_inv_t) = params.a().transpose().try_inverse() else {
        warn!("linear part of the model is singular");
        return JacobianReport {
            d: None,
            norm_1: Real::INFINITY,
            norm_inf: Real::INFINITY,
            passed: false,
        };
    };

    let d = a_inv_t * params.b().transpose() * Mat3::from_diagonal(&envelope.max_abs()) * 2.0;
    let (n1, ninf) = (norm_1(&d), norm_inf(&d));
    let passed = n1 < 1.0 || ninf < 1.0;
    info!("jacobian check: 1-norm {n1:.6}, inf-norm {ninf:.6}, passed {passed}");

    JacobianReport {
        d: Some(d),
        norm_1: n1,
        norm_inf: ninf,
        passed,
    }
}

/// Options for the joint extremum search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSearchOptions {
    /// Inverse kinematics settings used inside the objective.
    pub inverse: InverseOptions,
}

impl Default for JointSearchOptions {
    fn default() -> Self {
        Self {
            inverse: InverseOptions::precise(),
        }
    }
}

/// A joint value and the commanded position where it is reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointExtremum {
    pub value: Real,
    pub position: Vec3,
}

/// Smallest and largest value of one joint over the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointRange {
    pub axis: Axis,
    pub min: JointExtremum,
    pub max: JointExtremum,
}

fn search_extremum(
    params: &CalibrationParams,
    axis: Axis,
    sign: Real,
    seed: &Vec3,
    bounds: &[Bound],
    opts: &JointSearchOptions,
    minimizer: &dyn Minimizer,
) -> Result<JointExtremum, OptimError> {
    let j = axis.index();
    let objective = FnObjective::new(3, |x: &DVector<Real>| {
        let target = Vec3::new(x[0], x[1], x[2]);
        sign * kinematics::inverse(params, &target, None, None, &opts.inverse).joints[j]
    });
    let mut observer = |p: &Progress<'_>| debug!("joint {axis} search: fval {}", p.fval);
    let report =
        minimizer.minimize_observed(&objective, seed.as_slice(), Some(bounds), &mut observer)?;
    Ok(JointExtremum {
        value: sign * report.fval,
        position: Vec3::new(report.x[0], report.x[1], report.x[2]),
    })
}

/// Minimum and maximum of every joint over `axis_bounds`.
///
/// Minima are seeded at the lower envelope corner, maxima at the upper one.
pub fn joint_extrema(
    params: &CalibrationParams,
    axis_bounds: &AxisBounds,
    opts: &JointSearchOptions,
    minimizer: &dyn Minimizer,
) -> Result<[JointRange; 3], OptimError> {
    axis_bounds.validate()?;
    let bounds: Vec<Bound> = (0..3)
        .map(|i| {
            let (lo, hi) = axis_bounds.pair(i);
            Bound::new(lo, hi)
        })
        .collect();

    let mut ranges = Vec::with_capacity(3);
    for axis in Axis::ALL {
        let min = search_extremum(params, axis, 1.0, &axis_bounds.min, &bounds, opts, minimizer)?;
        let max = search_extremum(params, axis, -1.0, &axis_bounds.max, &bounds, opts, minimizer)?;
        debug!("joint {axis}: [{:.6}, {:.6}]", min.value, max.value);
        ranges.push(JointRange { axis, min, max });
    }
    Ok([ranges[0], ranges[1], ranges[2]])
}

/// Outcome of [`check_joint_bounds`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointBoundsReport {
    pub ranges: [JointRange; 3],
    pub joint_bounds: AxisBounds,
    /// Joints whose range leaves `joint_bounds`.
    pub violations: Vec<Axis>,
    pub passed: bool,
}

/// Check that every joint stays within `joint_bounds` while the commanded
/// position ranges over `axis_bounds`.
pub fn check_joint_bounds(
    params: &CalibrationParams,
    axis_bounds: &AxisBounds,
    joint_bounds: &AxisBounds,
    opts: &JointSearchOptions,
    minimizer: &dyn Minimizer,
) -> Result<JointBoundsReport, OptimError> {
    joint_bounds.validate()?;
    let ranges = joint_extrema(params, axis_bounds, opts, minimizer)?;

    let violations: Vec<Axis> = ranges
        .iter()
        .filter(|r| {
            let (lo, hi) = joint_bounds.pair(r.axis.index());
            !(lo <= r.min.value && r.max.value <= hi)
        })
        .map(|r| r.axis)
        .collect();
    let passed = violations.is_empty();

    for r in &ranges {
        info!(
            "joint {}: [{:.6}, {:.6}] within [{:.6}, {:.6}]",
            r.axis,
            r.min.value,
            r.max.value,
            joint_bounds.min[r.axis.index()],
            joint_bounds.max[r.axis.index()]
        );
    }
    if !passed {
        warn!("joint bounds violated on {violations:?}");
    }

    Ok(JointBoundsReport {
        ranges,
        joint_bounds: *joint_bounds,
        violations,
        passed,
    })
}
