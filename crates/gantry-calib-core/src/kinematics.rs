//! Forward and inverse kinematics of the quadratic calibration model.
//!
//! The forward map is `q·A + q²·B + C` for a joint (commanded) position `q`.
//! The inverse is solved with Newton-Raphson using the analytic Jacobian
//! `J(q) = Aᵀ + 2·Bᵀ·diag(q)`.
//!
//! A singular Jacobian is a recoverable condition: the solver logs it and
//! returns the last iterate with [`InverseStatus::SingularJacobian`].

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::bounds::AxisBounds;
use crate::math::{Mat3, Real, Vec3};
use crate::params::CalibrationParams;

/// Options for [`inverse`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InverseOptions {
    /// Stop once the Newton step norm falls below this value.
    pub tol: Real,
    /// Maximum number of Newton iterations.
    pub max_iter: usize,
}

impl Default for InverseOptions {
    fn default() -> Self {
        Self {
            tol: 1e-3,
            max_iter: 10,
        }
    }
}

impl InverseOptions {
    /// Tight settings used when the inverse is evaluated inside an optimizer.
    pub fn precise() -> Self {
        Self {
            tol: 1e-9,
            max_iter: 20,
        }
    }
}

/// How an inverse solve terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InverseStatus {
    Converged,
    MaxIterations,
    SingularJacobian,
}

/// Result of [`inverse`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InverseSolution {
    /// Joint position of the last accepted iterate.
    pub joints: Vec3,
    /// Number of Newton steps taken.
    pub iterations: usize,
    /// Norm of the last step, before bounds clipping.
    pub last_step: Real,
    pub status: InverseStatus,
}

impl InverseSolution {
    pub fn converged(&self) -> bool {
        self.status == InverseStatus::Converged
    }
}

/// Joint position to predicted physical position.
pub fn forward(params: &CalibrationParams, joints: &Vec3) -> Vec3 {
    params.apply(joints)
}

/// Jacobian of [`forward`] at `joints`; entry `(i, j)` is `∂pᵢ/∂qⱼ`.
pub fn jacobian(params: &CalibrationParams, joints: &Vec3) -> Mat3 {
    params.a().transpose() + params.b().transpose() * Mat3::from_diagonal(&(joints * 2.0))
}

/// Solve `forward(q) = target` for `q` by Newton-Raphson.
///
/// The initial guess defaults to `target`. If `bounds` are given, the initial
/// guess and every iterate are clipped into them.
pub fn inverse(
    params: &CalibrationParams,
    target: &Vec3,
    initial: Option<Vec3>,
    bounds: Option<&AxisBounds>,
    opts: &InverseOptions,
) -> InverseSolution {
    let mut x = initial.unwrap_or(*target);

    if let Some(bounds) = bounds {
        if !bounds.contains(&x) {
            warn!(
                "initial guess [{:.6}, {:.6}, {:.6}] is out of bounds, clipping",
                x.x, x.y, x.z
            );
        }
        x = bounds.clamp(&x);
    }

    let mut last_step = Real::INFINITY;
    for iter in 0..opts.max_iter {
        let j = jacobian(params, &x);
        let Some(j_inv) = j.try_inverse() else {
            error!("jacobian is singular at [{:.6}, {:.6}, {:.6}]", x.x, x.y, x.z);
            return InverseSolution {
                joints: x,
                iterations: iter,
                last_step,
                status: InverseStatus::SingularJacobian,
            };
        };

        let residual = forward(params, &x) - target;
        let mut next = x - j_inv * residual;
        last_step = (next - x).norm();

        if let Some(bounds) = bounds {
            next = bounds.clamp(&next);
        }
        x = next;

        debug!("inverse iter {iter}: step {last_step:.3e}");

        if last_step < opts.tol {
            return InverseSolution {
                joints: x,
                iterations: iter + 1,
                last_step,
                status: InverseStatus::Converged,
            };
        }
    }

    InverseSolution {
        joints: x,
        iterations: opts.max_iter,
        last_step,
        status: InverseStatus::MaxIterations,
    }
}
