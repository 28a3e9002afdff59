//! Step functions for `CalibrationSession<GantryCalibrationProblem>`.
//!
//! The steps run in order: synchronize, align, mask bad frames, calibrate,
//! finalize. Each reads what earlier steps left in the session state and
//! refuses to run out of order.

use anyhow::{Context, Result, bail, ensure};
use gantry_calib_core::{AlignmentParams, CalibrationParams, Real, mean_distance};
use gantry_calib_optim::problems::alignment::optimize_alignment;
use gantry_calib_optim::problems::calibration::{CalibrationSolveOptions, optimize_calibration};
use gantry_calib_optim::{Minimizer, Powell};
use log::{info, warn};

use crate::cache::ParamCache;
use crate::session::CalibrationSession;
use crate::stats::ErrorStats;
use crate::sync::{GANTRY, GANTRY_CALIBRATED, RIGID_BODY, SyncedDataset};

use super::problem::{GantryCalibrationOutput, GantryCalibrationProblem};

type Session = CalibrationSession<GantryCalibrationProblem>;

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn require_synced(session: &mut Session) -> Result<&mut SyncedDataset> {
    session
        .state
        .synced
        .as_mut()
        .context("data not synchronized - call step_synchronize first")
}

/// Cached vector under `key`, dropping it first when `recompute` is set.
fn cached_vector(
    cache: &mut dyn ParamCache,
    key: Option<&str>,
    recompute: bool,
) -> Result<Option<Vec<Real>>> {
    let Some(key) = key else {
        return Ok(None);
    };
    if recompute && cache.remove(key)? {
        info!("discarded cached parameters '{key}'");
    }
    cache.lookup(key)
}

// ─────────────────────────────────────────────────────────────────────────────
// Step Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Resample the gantry log onto the capture clock and build the tracks.
///
/// Discards every result of later steps.
pub fn step_synchronize(session: &mut Session) -> Result<()> {
    session.validate()?;
    let input = session.require_input()?;
    let synced = SyncedDataset::synchronize(&input.capture, &input.gantry, input.clock_offset)?;
    let notes = format!("{} samples, {} markers", synced.len(), synced.marker_count);

    session.state.synced = Some(synced);
    session.state.clear_after_sync();
    session.log_success_with_notes("synchronize", notes);
    Ok(())
}

/// Bring the capture into the gantry frame.
///
/// Uses the cached alignment when one exists under the configured key,
/// otherwise fits it with `minimizer` starting from the input's initial
/// guess and stores the result.
///
/// # Errors
///
/// - Synchronization not run, or alignment already applied
/// - Cached vector of the wrong length
/// - Optimizer failure
pub fn step_align(
    session: &mut Session,
    cache: &mut dyn ParamCache,
    minimizer: &dyn Minimizer,
) -> Result<()> {
    session.validate()?;
    let init = session.require_input()?.alignment_init;
    let config = session.config.clone();
    ensure!(
        !session.state.is_aligned(),
        "alignment already applied - call step_synchronize to start over"
    );
    let synced = require_synced(session)?;

    let key = config.alignment_key.as_deref();
    let cached = cached_vector(cache, key, config.recompute_alignment)?;
    let from_cache = cached.is_some();
    let params = match cached {
        Some(values) => {
            let params = AlignmentParams::from_slice(&values)
                .context("cached alignment parameters are malformed")?;
            info!("using cached alignment {:?}", params.to_vec());
            params
        }
        None => {
            let dataset = synced.alignment_dataset()?;
            let result = optimize_alignment(&dataset, init.as_ref(), &config.alignment, minimizer)?;
            if let Some(key) = key {
                cache.store(key, &result.params.to_vec())?;
            }
            result.params
        }
    };

    synced.apply_alignment(&params)?;
    let cost = mean_distance(&synced.positions, GANTRY, &synced.positions, RIGID_BODY)?;
    if cost.is_nan() {
        warn!("aligned capture does not overlap the gantry log");
    }

    session.state.alignment = Some(params);
    session.state.alignment_cost = Some(cost);
    session.state.alignment_from_cache = from_cache;
    session.log_success_with_notes(
        "align",
        format!(
            "mean distance {cost:.6}{}",
            if from_cache { " (cached)" } else { "" }
        ),
    );
    Ok(())
}

/// Set the input's bad frames to undefined in every column.
///
/// A no-op when disabled in the config or when the input lists no bad
/// frames.
pub fn step_mask_bad_frames(session: &mut Session) -> Result<()> {
    session.validate()?;
    let bad_frames = session.require_input()?.bad_frames.clone();
    let enabled = session.config.remove_bad_frames;
    if !session.state.is_aligned() {
        bail!("alignment not run - call step_align first");
    }

    let masked = match bad_frames {
        Some(ranges) if enabled => require_synced(session)?.mask_bad_frames(&ranges)?,
        _ => 0,
    };

    session.state.masked_samples = Some(masked);
    session.log_success_with_notes("mask_bad_frames", format!("{masked} samples masked"));
    Ok(())
}

/// Fit the quadratic model and fill the calibrated gantry track.
///
/// With calibration disabled the calibrated track is reset to undefined
/// and the step only records that fact.
pub fn step_calibrate(
    session: &mut Session,
    cache: &mut dyn ParamCache,
    minimizer: &dyn Minimizer,
) -> Result<()> {
    session.validate()?;
    let config = session.config.clone();
    if !session.state.is_aligned() {
        bail!("alignment not run - call step_align first");
    }
    let synced = require_synced(session)?;

    if !config.calibrate {
        synced.apply_calibration(None)?;
        session.state.calibration = None;
        session.state.calibration_cost = None;
        session.log_success_with_notes("calibrate", "disabled");
        return Ok(());
    }

    let key = config.calibration_key.as_deref();
    let cached = cached_vector(cache, key, config.recompute_calibration)?;
    let from_cache = cached.is_some();
    let params = match cached {
        Some(values) => {
            let params = CalibrationParams::from_slice(&values)
                .context("cached calibration parameters are malformed")?;
            info!("using cached calibration");
            params
        }
        None => {
            let dataset = synced.calibration_dataset()?;
            let result =
                optimize_calibration(&dataset, &CalibrationSolveOptions::default(), minimizer)?;
            if let Some(key) = key {
                cache.store(key, &result.params.to_vec())?;
            }
            result.params
        }
    };

    synced.apply_calibration(Some(&params))?;
    let cost = mean_distance(
        &synced.positions,
        RIGID_BODY,
        &synced.positions,
        GANTRY_CALIBRATED,
    )?;

    session.state.calibration = Some(params);
    session.state.calibration_cost = Some(cost);
    session.state.calibration_from_cache = from_cache;
    session.log_success_with_notes(
        "calibrate",
        format!(
            "mean distance {cost:.6}{}",
            if from_cache { " (cached)" } else { "" }
        ),
    );
    Ok(())
}

/// Summarize the gantry errors and store the session output.
pub fn step_finalize(session: &mut Session) -> Result<()> {
    session.validate()?;
    let state = &session.state;
    let (Some(alignment), Some(alignment_cost)) = (state.alignment, state.alignment_cost) else {
        bail!("alignment not run - call step_align first");
    };
    let synced = state
        .synced
        .as_ref()
        .context("data not synchronized - call step_synchronize first")?;

    let error_before = ErrorStats::from_values(&synced.gantry_error.abs);
    let error_after = ErrorStats::from_values(&synced.gantry_calibrated_error.abs);
    if let Some(stats) = &error_before {
        info!("gantry error before calibration: {stats}");
    }
    if let Some(stats) = &error_after {
        info!("gantry error after calibration: {stats}");
    }

    let output = GantryCalibrationOutput {
        alignment,
        alignment_cost,
        calibration: state.calibration,
        calibration_cost: state.calibration_cost,
        error_before,
        error_after,
    };
    session.set_output(output);
    session.log_success("finalize");
    Ok(())
}

/// Run every step with the configured Powell minimizer.
pub fn run_calibration(session: &mut Session, cache: &mut dyn ParamCache) -> Result<()> {
    let minimizer = Powell::new(session.config.powell);
    step_synchronize(session)?;
    step_align(session, cache, &minimizer)?;
    step_mask_bad_frames(session)?;
    step_calibrate(session, cache, &minimizer)?;
    step_finalize(session)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::gantry_calibration::GantryCalibrationInput;
    use gantry_calib_core::{BadFrameRanges, MarkerCapture, PositionSeries, Vec3};

    /// Gantry moving on a plane; the capture sees it shifted by `offset`.
    fn input(offset: Vec3) -> GantryCalibrationInput {
        let n = 60;
        let time: Vec<Real> = (0..n).map(|i| i as Real * 0.125).collect();
        let gantry: Vec<Vec3> = time
            .iter()
            .map(|&t| Vec3::new(10.0 * (0.5 * t).sin(), 5.0 * t, 0.2 * t * t))
            .collect();
        let rb: Vec<Vec3> = gantry.iter().map(|p| p + offset).collect();
        let m1: Vec<Vec3> = rb.iter().map(|p| p + Vec3::new(1.0, 0.0, 0.0)).collect();
        let capture =
            MarkerCapture::new("rb", (0..n).collect(), time.clone(), rb, vec![m1.clone()], vec![m1])
                .unwrap();
        let gantry = PositionSeries::single(time.iter().map(|t| t + 1000.0).collect(), gantry)
            .unwrap();
        GantryCalibrationInput::new(capture, gantry, 1000.0)
    }

    #[test]
    fn steps_refuse_to_run_out_of_order() {
        let mut session = Session::with_input(input(Vec3::zeros())).unwrap();
        let mut cache = MemoryCache::new();
        let powell = Powell::default();
        assert!(step_align(&mut session, &mut cache, &powell).is_err());
        assert!(step_mask_bad_frames(&mut session).is_err());
        assert!(step_calibrate(&mut session, &mut cache, &powell).is_err());
        assert!(step_finalize(&mut session).is_err());
    }

    #[test]
    fn cached_alignment_is_used() {
        let mut session = Session::with_input(input(Vec3::new(0.5, 0.0, 0.0))).unwrap();
        session.config.calibrate = false;
        let mut cache = MemoryCache::new();
        cache
            .store("alignment_params.json", &[-0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
            .unwrap();

        run_calibration(&mut session, &mut cache).unwrap();
        assert!(session.state.alignment_from_cache);
        assert!(session.state.alignment_cost.unwrap() < 1e-9);
        let output = session.require_output().unwrap();
        assert!(output.calibration.is_none());
        assert!(output.error_after.is_none());
    }

    #[test]
    fn recompute_replaces_cached_alignment() {
        let mut session = Session::with_input(input(Vec3::zeros())).unwrap();
        session.config.calibrate = false;
        session.config.recompute_alignment = true;
        let mut cache = MemoryCache::new();
        cache.store("alignment_params.json", &[9.0; 7]).unwrap();

        run_calibration(&mut session, &mut cache).unwrap();
        assert!(!session.state.alignment_from_cache);
        let stored = cache.lookup("alignment_params.json").unwrap().unwrap();
        assert!(stored[0].abs() < 0.1, "{stored:?}");
    }

    #[test]
    fn malformed_cache_entry_is_an_error() {
        let mut session = Session::with_input(input(Vec3::zeros())).unwrap();
        let mut cache = MemoryCache::new();
        cache.store("alignment_params.json", &[1.0, 2.0]).unwrap();
        step_synchronize(&mut session).unwrap();
        let err = step_align(&mut session, &mut cache, &Powell::default()).unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn alignment_cannot_be_applied_twice() {
        let mut session = Session::with_input(input(Vec3::zeros())).unwrap();
        session.config.alignment_key = None;
        let mut cache = MemoryCache::new();
        step_synchronize(&mut session).unwrap();
        step_align(&mut session, &mut cache, &Powell::default()).unwrap();
        assert!(step_align(&mut session, &mut cache, &Powell::default()).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn bad_frames_are_masked_only_when_enabled() {
        let ranges = BadFrameRanges::new(vec![(0, 9)]).unwrap();
        let mut cache = MemoryCache::new();
        cache.store("alignment_params.json", &[0.0; 7]).unwrap();

        let mut session =
            Session::with_input(input(Vec3::zeros()).with_bad_frames(ranges.clone())).unwrap();
        session.config.calibrate = false;
        run_calibration(&mut session, &mut cache).unwrap();
        assert_eq!(session.state.masked_samples, Some(10));
        assert_eq!(session.require_output().unwrap().error_before.unwrap().count, 50);

        let mut session =
            Session::with_input(input(Vec3::zeros()).with_bad_frames(ranges)).unwrap();
        session.config.calibrate = false;
        session.config.remove_bad_frames = false;
        run_calibration(&mut session, &mut cache).unwrap();
        assert_eq!(session.state.masked_samples, Some(0));
        assert_eq!(session.require_output().unwrap().error_before.unwrap().count, 60);
    }
}
