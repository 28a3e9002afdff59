//! [`ProblemType`] implementation for gantry vs. motion-capture calibration.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use gantry_calib_core::{
    AlignmentParams, BadFrameRanges, CalibrationParams, DEFAULT_TRACK, MarkerCapture,
    PositionSeries, Real,
};
use gantry_calib_optim::PowellOptions;
use gantry_calib_optim::problems::alignment::AlignmentSolveOptions;
use serde::{Deserialize, Serialize};

use crate::export::kinematics_config;
use crate::io::{load_gantry_csv, load_mocap_csv};
use crate::session::{InvalidationPolicy, ProblemType};
use crate::stats::ErrorStats;

use super::state::GantryCalibrationState;

// ─────────────────────────────────────────────────────────────────────────────
// Input
// ─────────────────────────────────────────────────────────────────────────────

/// One calibration take: the capture, the gantry log and optional hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GantryCalibrationInput {
    pub capture: MarkerCapture,
    /// Commanded positions in track [`DEFAULT_TRACK`], on the gantry clock.
    pub gantry: PositionSeries,
    /// Capture start on the gantry clock; subtracted from gantry times.
    pub clock_offset: Real,
    pub bad_frames: Option<BadFrameRanges>,
    /// Starting point for the alignment search.
    pub alignment_init: Option<AlignmentParams>,
}

impl GantryCalibrationInput {
    pub fn new(capture: MarkerCapture, gantry: PositionSeries, clock_offset: Real) -> Self {
        Self {
            capture,
            gantry,
            clock_offset,
            bad_frames: None,
            alignment_init: None,
        }
    }

    /// Load a take from its export and log files. The clock offset is the
    /// capture start time read as local time.
    pub fn from_files(
        mocap: impl AsRef<Path>,
        gantry: impl AsRef<Path>,
        rigid_body: Option<&str>,
    ) -> Result<Self> {
        let take = load_mocap_csv(mocap, rigid_body)?;
        let gantry = load_gantry_csv(gantry)?;
        let clock_offset = take
            .metadata
            .capture_start_timestamp()
            .context("failed to place the capture on the gantry clock")?;
        Ok(Self::new(take.capture, gantry, clock_offset))
    }

    pub fn with_bad_frames(mut self, bad_frames: BadFrameRanges) -> Self {
        self.bad_frames = Some(bad_frames);
        self
    }

    pub fn with_alignment_init(mut self, init: AlignmentParams) -> Self {
        self.alignment_init = Some(init);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for [`run_calibration`](super::run_calibration) and its steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GantryCalibrationConfig {
    /// Fit the quadratic model after alignment.
    pub calibrate: bool,
    /// Mask the input's bad frames before calibrating.
    pub remove_bad_frames: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // Parameter cache
    // ─────────────────────────────────────────────────────────────────────────
    /// Cache key of the alignment parameters. `None` disables caching.
    pub alignment_key: Option<String>,
    /// Cache key of the calibration parameters. `None` disables caching.
    pub calibration_key: Option<String>,
    /// Ignore and overwrite a cached alignment.
    pub recompute_alignment: bool,
    /// Ignore and overwrite a cached calibration.
    pub recompute_calibration: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // Solvers
    // ─────────────────────────────────────────────────────────────────────────
    pub alignment: AlignmentSolveOptions,
    pub powell: PowellOptions,
}

impl Default for GantryCalibrationConfig {
    fn default() -> Self {
        Self {
            calibrate: true,
            remove_bad_frames: true,
            alignment_key: Some("alignment_params.json".to_string()),
            calibration_key: Some("calibration_params.json".to_string()),
            recompute_alignment: false,
            recompute_calibration: false,
            alignment: AlignmentSolveOptions::default(),
            powell: PowellOptions::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output and export
// ─────────────────────────────────────────────────────────────────────────────

/// Final result of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GantryCalibrationOutput {
    pub alignment: AlignmentParams,
    /// Mean rigid-body to gantry distance after alignment.
    pub alignment_cost: Real,
    pub calibration: Option<CalibrationParams>,
    pub calibration_cost: Option<Real>,
    /// `|rigid_body - gantry|` over the samples left after masking.
    pub error_before: Option<ErrorStats>,
    /// `|rigid_body - gantry_calibrated|`, when calibrated.
    pub error_after: Option<ErrorStats>,
}

/// Parameter vectors and controller configuration for downstream use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GantryCalibrationExport {
    /// `[dx, dy, dz, rx, ry, rz, dt]`.
    pub alignment: Vec<Real>,
    /// Flat 18-value model layout.
    pub calibration: Option<Vec<Real>>,
    /// `setp` lines for the controller, when calibrated.
    pub kinematics_config: Option<String>,
    pub error_before: Option<ErrorStats>,
    pub error_after: Option<ErrorStats>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ProblemType
// ─────────────────────────────────────────────────────────────────────────────

/// Aligns a motion-capture rigid body to the gantry frame and fits the
/// quadratic correction model between commanded and measured positions.
#[derive(Debug)]
pub struct GantryCalibrationProblem;

impl ProblemType for GantryCalibrationProblem {
    type Config = GantryCalibrationConfig;
    type Input = GantryCalibrationInput;
    type State = GantryCalibrationState;
    type Output = GantryCalibrationOutput;
    type Export = GantryCalibrationExport;

    fn name() -> &'static str {
        "gantry_calibration"
    }

    fn validate_input(input: &Self::Input) -> Result<()> {
        ensure!(!input.capture.is_empty(), "motion capture take has no samples");
        ensure!(!input.gantry.is_empty(), "gantry log has no samples");
        ensure!(
            input.gantry.has_track(DEFAULT_TRACK),
            "gantry log has no '{DEFAULT_TRACK}' track"
        );
        ensure!(
            input.clock_offset.is_finite(),
            "clock offset must be finite, got {}",
            input.clock_offset
        );
        if let Some(bad_frames) = &input.bad_frames {
            bad_frames.validate()?;
        }
        Ok(())
    }

    fn validate_config(config: &Self::Config) -> Result<()> {
        ensure!(
            config.alignment.rotation_window >= 0.0,
            "rotation window must be non-negative"
        );
        ensure!(
            config.powell.ftol > 0.0 && config.powell.xtol > 0.0,
            "solver tolerances must be positive"
        );
        for key in [&config.alignment_key, &config.calibration_key]
            .into_iter()
            .flatten()
        {
            ensure!(!key.is_empty(), "cache keys must not be empty");
        }
        ensure!(
            config.alignment_key.is_none() || config.alignment_key != config.calibration_key,
            "alignment and calibration must use different cache keys"
        );
        Ok(())
    }

    fn on_input_change() -> InvalidationPolicy {
        InvalidationPolicy::CLEAR_COMPUTED
    }

    fn on_config_change() -> InvalidationPolicy {
        InvalidationPolicy::KEEP_ALL
    }

    fn export(output: &Self::Output, _config: &Self::Config) -> Result<Self::Export> {
        Ok(GantryCalibrationExport {
            alignment: output.alignment.to_vec(),
            calibration: output.calibration.as_ref().map(CalibrationParams::to_vec),
            kinematics_config: output.calibration.as_ref().map(kinematics_config),
            error_before: output.error_before,
            error_after: output.error_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_calib_core::Vec3;

    fn input() -> GantryCalibrationInput {
        let time = vec![0.0, 0.1, 0.2];
        let rb = vec![Vec3::zeros(); 3];
        let capture = MarkerCapture::new("rb", vec![0, 1, 2], time.clone(), rb.clone(), vec![], vec![])
            .unwrap();
        let gantry = PositionSeries::single(time, rb).unwrap();
        GantryCalibrationInput::new(capture, gantry, 0.0)
    }

    #[test]
    fn default_config_is_valid() {
        let config = GantryCalibrationConfig::default();
        assert!(config.calibrate && config.remove_bad_frames);
        GantryCalibrationProblem::validate_config(&config).unwrap();
    }

    #[test]
    fn config_rejects_shared_cache_key() {
        let config = GantryCalibrationConfig {
            calibration_key: Some("alignment_params.json".into()),
            ..Default::default()
        };
        assert!(GantryCalibrationProblem::validate_config(&config).is_err());
    }

    #[test]
    fn partial_config_json_uses_defaults() {
        let config: GantryCalibrationConfig =
            serde_json::from_str(r#"{"calibrate": false, "alignment_key": null}"#).unwrap();
        assert!(!config.calibrate);
        assert!(config.alignment_key.is_none());
        assert_eq!(
            config.calibration_key.as_deref(),
            Some("calibration_params.json")
        );
    }

    #[test]
    fn input_validation() {
        GantryCalibrationProblem::validate_input(&input()).unwrap();

        let mut bad = input();
        bad.clock_offset = Real::NAN;
        assert!(GantryCalibrationProblem::validate_input(&bad).is_err());

        let bad = input().with_bad_frames(BadFrameRanges { ranges: vec![(5, 2)] });
        assert!(GantryCalibrationProblem::validate_input(&bad).is_err());
    }

    #[test]
    fn export_includes_controller_config() {
        let output = GantryCalibrationOutput {
            alignment: AlignmentParams::default(),
            alignment_cost: 0.1,
            calibration: Some(CalibrationParams::identity()),
            calibration_cost: Some(0.01),
            error_before: None,
            error_after: None,
        };
        let export =
            GantryCalibrationProblem::export(&output, &GantryCalibrationConfig::default()).unwrap();
        assert_eq!(export.alignment.len(), AlignmentParams::LEN);
        assert_eq!(export.calibration.as_ref().map(Vec::len), Some(CalibrationParams::LEN));
        assert!(export.kinematics_config.unwrap().starts_with("# Calibration matrix A"));
    }
}
