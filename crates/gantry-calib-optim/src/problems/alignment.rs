//! Rigid alignment between two devices observing the same trajectory.
//!
//! Fits the 7 alignment parameters (translation, rotations about the moving
//! track's own centroid, time shift) minimizing the mean Euclidean distance
//! between the reference track and the transformed moving track.
//!
//! Rotations are confined to a small window around their initial values;
//! translation and time shift are free.

use gantry_calib_core::{
    AlignmentParams, DEFAULT_TRACK, PositionSeries, Real, TrackSelection, mean_distance,
};
use log::{info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::OptimError;
use crate::minimizer::{Bound, FnObjective, MinimizeReport, Minimizer};

/// Reference and moving trajectories, each a single-track series.
#[derive(Debug, Clone)]
pub struct AlignmentDataset {
    pub reference: PositionSeries,
    pub moving: PositionSeries,
}

impl AlignmentDataset {
    /// Build from named tracks of two series.
    pub fn from_tracks(
        reference: &PositionSeries,
        reference_track: &str,
        moving: &PositionSeries,
        moving_track: &str,
    ) -> Result<Self, OptimError> {
        Ok(Self {
            reference: reference.extract(reference_track)?,
            moving: moving.extract(moving_track)?,
        })
    }

    /// Objective value for a parameter set.
    pub fn cost(&self, params: &AlignmentParams) -> Real {
        params
            .pipeline(DEFAULT_TRACK, TrackSelection::All)
            .apply(&self.moving)
            .and_then(|moved| mean_distance(&self.reference, DEFAULT_TRACK, &moved, DEFAULT_TRACK))
            .unwrap_or(Real::NAN)
    }
}

/// Solve options for alignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentSolveOptions {
    /// Half width of the rotation window around the initial angles (rad).
    pub rotation_window: Real,
}

impl Default for AlignmentSolveOptions {
    fn default() -> Self {
        Self {
            rotation_window: std::f64::consts::PI / 32.0,
        }
    }
}

impl AlignmentSolveOptions {
    /// Box constraints for a given initial guess.
    pub fn bounds(&self, init: &AlignmentParams) -> Vec<Bound> {
        let mut bounds = vec![Bound::free(); AlignmentParams::LEN];
        for axis in 0..3 {
            bounds[3 + axis] = Bound::around(init.rotation[axis], self.rotation_window);
        }
        bounds
    }
}

/// Result of alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub params: AlignmentParams,
    /// Mean distance at the initial guess.
    pub initial_cost: Real,
    /// Mean distance at the solution.
    pub final_cost: Real,
    pub report: MinimizeReport,
}

/// Fit alignment parameters with the given minimizer.
pub fn optimize_alignment(
    dataset: &AlignmentDataset,
    init: Option<&AlignmentParams>,
    opts: &AlignmentSolveOptions,
    minimizer: &dyn Minimizer,
) -> Result<AlignmentResult, OptimError> {
    let init = init.copied().unwrap_or_default();
    let initial_cost = dataset.cost(&init);
    info!("aligning: initial mean distance {initial_cost:.6}");

    let objective = FnObjective::new(AlignmentParams::LEN, |x: &DVector<Real>| {
        match AlignmentParams::from_slice(x.as_slice()) {
            Ok(params) => dataset.cost(&params),
            Err(_) => Real::NAN,
        }
    });
    let bounds = opts.bounds(&init);
    let report = minimizer.minimize(&objective, &init.to_vec(), Some(&bounds))?;
    let params = AlignmentParams::from_slice(&report.x)?;

    info!(
        "alignment finished after {} iterations: mean distance {:.6}, params {:?}",
        report.iterations,
        report.fval,
        params.to_vec()
    );
    if !report.converged() {
        warn!(
            "alignment stopped before converging ({:?}); keeping best parameters",
            report.termination
        );
    }

    Ok(AlignmentResult {
        params,
        initial_cost,
        final_cost: report.fval,
        report,
    })
}
