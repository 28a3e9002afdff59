//! Intermediate results of the gantry calibration steps.

use gantry_calib_core::{AlignmentParams, CalibrationParams, Real};
use serde::{Deserialize, Serialize};

use crate::sync::SyncedDataset;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GantryCalibrationState {
    // ─────────────────────────────────────────────────────────────────────────
    // Synchronization
    // ─────────────────────────────────────────────────────────────────────────
    /// Synchronized tracks, updated in place by every later step.
    pub synced: Option<SyncedDataset>,

    // ─────────────────────────────────────────────────────────────────────────
    // Alignment
    // ─────────────────────────────────────────────────────────────────────────
    pub alignment: Option<AlignmentParams>,
    /// Mean distance after alignment, before masking.
    pub alignment_cost: Option<Real>,
    pub alignment_from_cache: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // Bad frames
    // ─────────────────────────────────────────────────────────────────────────
    /// Number of masked samples; `None` until the masking step ran.
    pub masked_samples: Option<usize>,

    // ─────────────────────────────────────────────────────────────────────────
    // Calibration
    // ─────────────────────────────────────────────────────────────────────────
    pub calibration: Option<CalibrationParams>,
    /// Mean distance with the fitted model applied.
    pub calibration_cost: Option<Real>,
    pub calibration_from_cache: bool,
}

impl GantryCalibrationState {
    pub fn is_synchronized(&self) -> bool {
        self.synced.is_some()
    }

    pub fn is_aligned(&self) -> bool {
        self.alignment.is_some()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// Forget everything downstream of synchronization.
    pub fn clear_after_sync(&mut self) {
        *self = Self {
            synced: self.synced.take(),
            ..Self::default()
        };
    }
}
