//! End-to-end solver checks on synthetic snake-path measurements.
//!
//! Covers:
//! 1. Alignment recovery of a translation plus time offset
//! 2. Alignment recovery of small rotations
//! 3. Identity calibration staying at identity on clean data
//! 4. Calibration of a constant offset
//! 5. Recovery of a full quadratic model
//! 6. Feasibility checks on a fitted model

use gantry_calib_core::synthetic::noise::UniformPositionNoise;
use gantry_calib_core::synthetic::trajectory::{SnakeDirection, sample_path, snake_path};
use gantry_calib_core::{
    AlignmentParams, AxisBounds, CalibrationParams, DEFAULT_TRACK, Mat3, PositionSeries, Real, Transform,
    TrackSelection, Vec3,
};
use gantry_calib_optim::feasibility::{
    JointSearchOptions, check_joint_bounds, jacobian_invertibility,
};
use gantry_calib_optim::problems::alignment::*;
use gantry_calib_optim::problems::calibration::*;
use gantry_calib_optim::{Powell, PowellOptions};

/// Snake path over a 10 × 10 square, climbing in z on every leg.
fn snake_trajectory() -> PositionSeries {
    let legs = snake_path((0.0, 0.0), (10.0, 10.0), 4, SnakeDirection::Horizontal).unwrap();
    let waypoints: Vec<Vec3> = legs
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| Vec3::new(x, y, 0.5 * i as Real))
        .collect();
    sample_path(&waypoints, 2.0, 10.0, 0.0).unwrap()
}

fn with_points(series: &PositionSeries, f: impl Fn(usize, Vec3) -> Vec3) -> PositionSeries {
    let points = series
        .track(DEFAULT_TRACK)
        .unwrap()
        .iter()
        .enumerate()
        .map(|(i, p)| f(i, *p))
        .collect();
    PositionSeries::single(series.time().to_vec(), points).unwrap()
}

#[test]
fn alignment_recovers_translation_and_delay() {
    let reference = snake_trajectory();
    let offset = Vec3::new(0.4, -0.3, 0.2);
    let delayed = Transform::shift_time(0.25)
        .apply(&reference, &TrackSelection::All)
        .unwrap();
    let moving = with_points(&delayed, |_, p| p + offset);

    let dataset = AlignmentDataset::from_tracks(&reference, DEFAULT_TRACK, &moving, DEFAULT_TRACK)
        .unwrap();
    let result = optimize_alignment(
        &dataset,
        None,
        &AlignmentSolveOptions::default(),
        &Powell::default(),
    )
    .unwrap();

    assert!(result.initial_cost > 0.3, "initial {}", result.initial_cost);
    assert!(result.final_cost < 0.02, "final {}", result.final_cost);
    assert!((result.params.translation + offset).norm() < 0.1);
    assert!((result.params.time_shift + 0.25).abs() < 0.05);
    for r in result.params.rotation.iter() {
        assert!(r.abs() <= std::f64::consts::PI / 32.0 + 1e-12);
    }
}

#[test]
fn alignment_recovers_rotations() {
    let reference = snake_trajectory();
    let tilt = AlignmentParams::from_slice(&[0.0, 0.0, 0.0, 0.05, -0.04, 0.06, 0.0]).unwrap();
    let moving = tilt
        .pipeline(DEFAULT_TRACK, TrackSelection::All)
        .apply(&reference)
        .unwrap();

    let dataset = AlignmentDataset::from_tracks(&reference, DEFAULT_TRACK, &moving, DEFAULT_TRACK)
        .unwrap();
    let result = optimize_alignment(
        &dataset,
        None,
        &AlignmentSolveOptions::default(),
        &Powell::default(),
    )
    .unwrap();

    assert!(result.initial_cost > 0.1, "initial {}", result.initial_cost);
    assert!(result.final_cost < 1e-4, "final {}", result.final_cost);
    // Undoing small rotations needs roughly the opposite angles.
    for (got, applied) in result.params.rotation.iter().zip(tilt.rotation.iter()) {
        assert!((got + applied).abs() < 0.01, "{got} vs {applied}");
    }
    assert!(result.params.time_shift.abs() < 0.01);
}

#[test]
fn identity_calibration_on_clean_data() {
    let commanded = snake_trajectory();
    let dataset = CalibrationDataset::from_tracks(
        &commanded,
        DEFAULT_TRACK,
        &commanded,
        DEFAULT_TRACK,
    )
    .unwrap();
    let result =
        optimize_calibration(&dataset, &CalibrationSolveOptions::default(), &Powell::default())
            .unwrap();

    assert!(result.final_cost < 1e-9);
    let identity = CalibrationParams::identity();
    assert!((result.params.a() - identity.a()).norm() < 1e-6);
    assert!(result.params.b().norm() < 1e-6);
    assert!(result.params.c().norm() < 1e-6);
}

#[test]
fn calibration_reduces_offset_error() {
    let commanded = snake_trajectory();
    let noise = UniformPositionNoise::new(7, 1e-3);
    let shift = Vec3::new(0.3, -0.2, 0.1);
    let measured = with_points(&commanded, |i, p| noise.apply(i, 0, p + shift));

    let dataset =
        CalibrationDataset::from_tracks(&measured, DEFAULT_TRACK, &commanded, DEFAULT_TRACK)
            .unwrap();
    let solver = Powell::new(PowellOptions::with_tol(1e-9));
    let result =
        optimize_calibration(&dataset, &CalibrationSolveOptions::default(), &solver).unwrap();

    assert!(result.initial_cost > 0.3);
    assert!(
        result.final_cost < 2e-3,
        "{} -> {}",
        result.initial_cost,
        result.final_cost
    );
    assert!(
        (result.params.c() - shift).norm() < 0.05,
        "offset {:?}",
        result.params.c()
    );
}

#[test]
fn calibration_recovers_quadratic_model() {
    let mut b = Mat3::zeros();
    b[(0, 0)] = 2e-3;
    b[(0, 1)] = 1e-3;
    b[(1, 1)] = -1e-3;
    let truth = CalibrationParams::new(
        Mat3::new(1.02, 0.01, 0.0, -0.015, 0.98, 0.005, 0.0, 0.0, 1.01),
        b,
        Vec3::new(0.3, -0.2, 0.1),
    )
    .unwrap();
    let commanded = snake_trajectory();
    let measured = with_points(&commanded, |_, p| truth.apply(&p));

    let dataset =
        CalibrationDataset::from_tracks(&measured, DEFAULT_TRACK, &commanded, DEFAULT_TRACK)
            .unwrap();
    let result =
        optimize_calibration(&dataset, &CalibrationSolveOptions::default(), &Powell::default())
            .unwrap();

    assert!(result.initial_cost > 0.3, "initial {}", result.initial_cost);
    assert!(result.final_cost < 1e-3, "final {}", result.final_cost);
    let error: Real = result
        .params
        .to_vec()
        .iter()
        .zip(truth.to_vec())
        .map(|(got, want)| (got - want).powi(2))
        .sum::<Real>()
        .sqrt();
    assert!(error < 1e-2, "parameter error {error}");
    assert_eq!(result.params.b().row(2).norm(), 0.0);
}

#[test]
fn fitted_model_passes_feasibility() {
    let mut b = Mat3::zeros();
    b[(0, 0)] = 1e-4;
    b[(1, 1)] = -1e-4;
    let params = CalibrationParams::new(
        Mat3::new(1.001, 0.0, 0.0, 0.0, 0.999, 0.0, 0.0, 0.0, 1.0),
        b,
        Vec3::new(0.5, 0.5, 0.0),
    )
    .unwrap();

    let axis_bounds = AxisBounds::from_pairs([(0.0, 100.0), (0.0, 100.0), (-20.0, 0.0)]).unwrap();
    let joint_bounds =
        AxisBounds::from_pairs([(-5.0, 105.0), (-5.0, 105.0), (-25.0, 5.0)]).unwrap();

    let jac = jacobian_invertibility(&params, &joint_bounds);
    assert!(jac.passed, "{jac:?}");

    let report = check_joint_bounds(
        &params,
        &axis_bounds,
        &joint_bounds,
        &JointSearchOptions::default(),
        &Powell::default(),
    )
    .unwrap();
    assert!(report.passed, "{report:?}");
    // x joint reaches below zero to cover the commanded x = 0 edge.
    assert!(report.ranges[0].min.value < 0.0);
}
