//! Quadratic kinematic calibration.
//!
//! Fits `p_measured ≈ p_commanded·A + p_commanded²·B + C` over the 18 free
//! parameters (the third row of `B` is fixed at zero), minimizing the mean
//! Euclidean distance between measured and predicted positions. The search
//! is unbounded and starts from the identity model unless told otherwise.

use gantry_calib_core::{
    CalibrationParams, DEFAULT_TRACK, PositionSeries, Real, TrackSelection, mean_distance,
};
use log::{info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::OptimError;
use crate::minimizer::{FnObjective, MinimizeReport, Minimizer};

/// Measured and commanded trajectories, each a single-track series.
#[derive(Debug, Clone)]
pub struct CalibrationDataset {
    pub measured: PositionSeries,
    pub commanded: PositionSeries,
}

impl CalibrationDataset {
    pub fn from_tracks(
        measured: &PositionSeries,
        measured_track: &str,
        commanded: &PositionSeries,
        commanded_track: &str,
    ) -> Result<Self, OptimError> {
        Ok(Self {
            measured: measured.extract(measured_track)?,
            commanded: commanded.extract(commanded_track)?,
        })
    }

    /// Mean distance between measured positions and the model prediction.
    pub fn cost(&self, params: &CalibrationParams) -> Real {
        params
            .transform()
            .apply(&self.commanded, &TrackSelection::All)
            .and_then(|predicted| {
                mean_distance(&self.measured, DEFAULT_TRACK, &predicted, DEFAULT_TRACK)
            })
            .unwrap_or(Real::NAN)
    }
}

/// Solve options for calibration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationSolveOptions {
    /// Starting model; identity when absent.
    pub initial: Option<CalibrationParams>,
}

/// Result of calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub params: CalibrationParams,
    pub initial_cost: Real,
    pub final_cost: Real,
    pub report: MinimizeReport,
}

/// Fit calibration parameters with the given minimizer.
pub fn optimize_calibration(
    dataset: &CalibrationDataset,
    opts: &CalibrationSolveOptions,
    minimizer: &dyn Minimizer,
) -> Result<CalibrationResult, OptimError> {
    let init = opts.initial.unwrap_or_else(CalibrationParams::identity);
    let initial_cost = dataset.cost(&init);
    info!("calibrating: initial mean distance {initial_cost:.6}");

    let objective = FnObjective::new(CalibrationParams::LEN, |x: &DVector<Real>| {
        match CalibrationParams::from_slice(x.as_slice()) {
            Ok(params) => dataset.cost(&params),
            Err(_) => Real::NAN,
        }
    });
    let report = minimizer.minimize(&objective, &init.to_vec(), None)?;
    let params = CalibrationParams::from_slice(&report.x)?;

    info!(
        "calibration finished after {} iterations: mean distance {:.6}",
        report.iterations, report.fval
    );
    if !report.converged() {
        warn!(
            "calibration stopped before converging ({:?}); keeping best parameters",
            report.termination
        );
    }

    Ok(CalibrationResult {
        params,
        initial_cost,
        final_cost: report.fval,
        report,
    })
}
