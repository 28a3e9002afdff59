//! Synchronized gantry and motion-capture dataset.
//!
//! The gantry log is resampled onto the motion-capture timestamps; every
//! position stream then lives as a named track of one [`PositionSeries`]
//! indexed by motion-capture sample, and all derived error columns share
//! that index. Samples are never dropped: missing detections, out-of-range
//! resampling and bad frames all become undefined values.

use anyhow::{Context, Result, ensure};
use gantry_calib_core::{
    AlignmentParams, BadFrameRanges, CalibrationParams, DEFAULT_TRACK, MarkerCapture,
    PositionSeries, Real, TrackSelection, Vec3, fill_inside_vec3, has_undefined, nan_mean,
    resample_vec3, undefined_vec3,
};
use gantry_calib_optim::problems::alignment::AlignmentDataset;
use gantry_calib_optim::problems::calibration::CalibrationDataset;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Rigid-body position reported by the motion-capture system.
pub const RIGID_BODY: &str = "rigid_body";
/// Mean of the gap-filled raw marker positions.
pub const MARKER_CENTROID: &str = "marker_centroid";
/// Commanded gantry position, resampled onto capture time.
pub const GANTRY: &str = "gantry";
/// Gantry position mapped through the calibration model.
pub const GANTRY_CALIBRATED: &str = "gantry_calibrated";

/// Track of raw marker `i` (1-based).
pub fn marker_track(i: usize) -> String {
    format!("marker{i}")
}

/// Track of rigid-body-fitted marker `i` (1-based).
pub fn rb_marker_track(i: usize) -> String {
    format!("rb_marker{i}")
}

/// Signed per-axis error and its Euclidean norm, per sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorColumn {
    #[serde(with = "gantry_calib_core::serde_undefined::points")]
    pub signed: Vec<Vec3>,
    #[serde(with = "gantry_calib_core::serde_undefined::values")]
    pub abs: Vec<Real>,
}

impl ErrorColumn {
    /// `measured - reference`, sample by sample.
    pub fn between(measured: &[Vec3], reference: &[Vec3]) -> Self {
        let signed: Vec<Vec3> = measured.iter().zip(reference).map(|(m, r)| m - r).collect();
        let abs = signed.iter().map(|e| e.norm()).collect();
        Self { signed, abs }
    }

    fn undefined(len: usize) -> Self {
        Self {
            signed: vec![undefined_vec3(); len],
            abs: vec![Real::NAN; len],
        }
    }

    fn mask(&mut self, idx: usize) {
        self.signed[idx] = undefined_vec3();
        self.abs[idx] = Real::NAN;
    }
}

/// Synchronized data for one calibration take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedDataset {
    /// Capture frame number per sample.
    pub frame: Vec<usize>,
    /// Position tracks on the capture time base.
    pub positions: PositionSeries,
    pub marker_count: usize,
    /// `raw - fitted` per marker.
    pub marker_errors: Vec<ErrorColumn>,
    /// Cross-marker mean of [`marker_errors`](Self::marker_errors).
    pub marker_error_mean: ErrorColumn,
    /// `rigid_body - gantry`.
    pub gantry_error: ErrorColumn,
    /// `rigid_body - gantry_calibrated`.
    pub gantry_calibrated_error: ErrorColumn,
}

fn marker_error_mean(errors: &[ErrorColumn], len: usize) -> ErrorColumn {
    let signed = (0..len)
        .map(|i| {
            Vec3::from_fn(|k, _| nan_mean(errors.iter().map(|e| e.signed[i][k])))
        })
        .collect();
    let abs = (0..len)
        .map(|i| nan_mean(errors.iter().map(|e| e.abs[i])))
        .collect();
    ErrorColumn { signed, abs }
}

/// Centroid of the raw markers after filling interior gaps of each marker.
fn marker_centroid(raw_markers: &[Vec<Vec3>], len: usize) -> Vec<Vec3> {
    let filled: Vec<Vec<Vec3>> = raw_markers.iter().map(|m| fill_inside_vec3(m)).collect();
    (0..len)
        .map(|i| Vec3::from_fn(|k, _| nan_mean(filled.iter().map(|m| m[i][k]))))
        .collect()
}

impl SyncedDataset {
    /// Build the dataset from a capture and a gantry log.
    ///
    /// `clock_offset` is subtracted from the gantry timestamps to bring them
    /// onto the capture clock (the capture start time as a Unix timestamp).
    pub fn synchronize(
        capture: &MarkerCapture,
        gantry: &PositionSeries,
        clock_offset: Real,
    ) -> Result<Self> {
        ensure!(!capture.is_empty(), "motion capture take has no samples");
        let len = capture.len();
        let marker_count = capture.marker_count();

        let marker_errors: Vec<ErrorColumn> = capture
            .raw_markers
            .iter()
            .zip(&capture.fitted_markers)
            .map(|(raw, fitted)| ErrorColumn::between(raw, fitted))
            .collect();
        let marker_error_mean = marker_error_mean(&marker_errors, len);

        let undetected: Vec<usize> = (0..len).filter(|&i| capture.undetected(i)).collect();
        if !undetected.is_empty() {
            warn!(
                "{} of {len} frames have no raw marker detected",
                undetected.len()
            );
        }

        let mut centroid = marker_centroid(&capture.raw_markers, len);
        let mut rigid_body = capture.rigid_body.clone();
        let mut fitted = capture.fitted_markers.clone();
        for &i in &undetected {
            centroid[i] = undefined_vec3();
            rigid_body[i] = undefined_vec3();
            for m in fitted.iter_mut() {
                m[i] = undefined_vec3();
            }
        }

        let gantry_time: Vec<Real> = gantry.time().iter().map(|t| t - clock_offset).collect();
        let gantry_points = resample_vec3(
            &gantry_time,
            gantry.track(DEFAULT_TRACK).context("gantry log has no position track")?,
            &capture.time,
        );
        let resampled = gantry_points.iter().filter(|p| !has_undefined(p)).count();
        info!("gantry log covers {resampled} of {len} capture samples");

        let mut positions = PositionSeries::new(capture.time.clone())
            .context("capture time column")?
            .with_track(RIGID_BODY, rigid_body)?;
        for (i, raw) in capture.raw_markers.iter().enumerate() {
            positions.add_track(marker_track(i + 1), raw.clone())?;
        }
        for (i, m) in fitted.into_iter().enumerate() {
            positions.add_track(rb_marker_track(i + 1), m)?;
        }
        positions.add_track(MARKER_CENTROID, centroid)?;
        positions.add_track(GANTRY, gantry_points)?;
        positions.add_track(GANTRY_CALIBRATED, vec![undefined_vec3(); len])?;

        let mut dataset = Self {
            frame: capture.frame.clone(),
            positions,
            marker_count,
            marker_errors,
            marker_error_mean,
            gantry_error: ErrorColumn::undefined(len),
            gantry_calibrated_error: ErrorColumn::undefined(len),
        };
        dataset.update_gantry_errors()?;
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Tracks moved by the alignment: rigid body, all markers and the
    /// marker centroid.
    pub fn capture_tracks(&self) -> Vec<String> {
        let mut names = vec![RIGID_BODY.to_string()];
        names.extend((1..=self.marker_count).map(marker_track));
        names.extend((1..=self.marker_count).map(rb_marker_track));
        names.push(MARKER_CENTROID.to_string());
        names
    }

    /// Gantry as reference, rigid body as the moving track.
    pub fn alignment_dataset(&self) -> Result<AlignmentDataset> {
        Ok(AlignmentDataset::from_tracks(
            &self.positions,
            GANTRY,
            &self.positions,
            RIGID_BODY,
        )?)
    }

    /// Rigid body as measured, gantry as commanded position.
    pub fn calibration_dataset(&self) -> Result<CalibrationDataset> {
        Ok(CalibrationDataset::from_tracks(
            &self.positions,
            RIGID_BODY,
            &self.positions,
            GANTRY,
        )?)
    }

    /// Move every capture track into the gantry frame. Rotations are taken
    /// about the rigid-body centroid.
    pub fn apply_alignment(&mut self, params: &AlignmentParams) -> Result<()> {
        let targets = TrackSelection::Named(self.capture_tracks());
        self.positions = params
            .pipeline(RIGID_BODY, targets)
            .apply(&self.positions)
            .context("failed to apply alignment")?;
        self.update_gantry_errors()
    }

    /// Set every position and error column to undefined inside the ranges.
    /// Ranges index samples, bounds inclusive.
    pub fn mask_bad_frames(&mut self, bad_frames: &BadFrameRanges) -> Result<usize> {
        bad_frames.validate()?;
        let rows: Vec<usize> = (0..self.len()).filter(|&i| bad_frames.contains(i)).collect();
        let names: Vec<String> = self.positions.track_names().map(str::to_string).collect();
        for name in &names {
            let track = self.positions.track_mut(name)?;
            for &i in &rows {
                track[i] = undefined_vec3();
            }
        }
        for &i in &rows {
            for e in self.marker_errors.iter_mut() {
                e.mask(i);
            }
            self.marker_error_mean.mask(i);
        }
        self.update_gantry_errors()?;
        info!("masked {} bad samples", rows.len());
        Ok(rows.len())
    }

    /// Fill the calibrated gantry track, or reset it to undefined.
    pub fn apply_calibration(&mut self, params: Option<&CalibrationParams>) -> Result<()> {
        let calibrated = match params {
            Some(params) => self
                .positions
                .track(GANTRY)?
                .iter()
                .map(|p| params.apply(p))
                .collect(),
            None => vec![undefined_vec3(); self.len()],
        };
        self.positions.set_track(GANTRY_CALIBRATED, calibrated)?;
        self.update_gantry_errors()
    }

    fn update_gantry_errors(&mut self) -> Result<()> {
        let rb = self.positions.track(RIGID_BODY)?;
        self.gantry_error = ErrorColumn::between(rb, self.positions.track(GANTRY)?);
        self.gantry_calibrated_error =
            ErrorColumn::between(rb, self.positions.track(GANTRY_CALIBRATED)?);
        Ok(())
    }
}
