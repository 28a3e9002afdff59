//! Distance metrics between position tracks.

use crate::error::CoreError;
use crate::interp::interp_vec3;
use crate::math::{Real, Vec3, nan_mean};
use crate::series::PositionSeries;

/// Euclidean distance from each reference sample to `other`, resampled at
/// the reference timestamps. Undefined where either side is undefined.
pub fn distances(
    reference_time: &[Real],
    reference: &[Vec3],
    other_time: &[Real],
    other: &[Vec3],
) -> Vec<Real> {
    reference_time
        .iter()
        .zip(reference)
        .map(|(&t, p)| (p - interp_vec3(other_time, other, t)).norm())
        .collect()
}

/// Mean Euclidean distance between two sampled trajectories, skipping
/// undefined samples. This is the objective of both solvers.
pub fn mean_distance_points(
    reference_time: &[Real],
    reference: &[Vec3],
    other_time: &[Real],
    other: &[Vec3],
) -> Real {
    nan_mean(distances(reference_time, reference, other_time, other))
}

/// [`mean_distance_points`] between named tracks of two series.
pub fn mean_distance(
    reference: &PositionSeries,
    reference_track: &str,
    other: &PositionSeries,
    other_track: &str,
) -> Result<Real, CoreError> {
    Ok(mean_distance_points(
        reference.time(),
        reference.track(reference_track)?,
        other.time(),
        other.track(other_track)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::UNDEFINED;
    use crate::series::DEFAULT_TRACK;
    use crate::transform::{Transform, TransformPipeline};

    #[test]
    fn shift_drives_distance_to_zero() {
        let reference =
            PositionSeries::single(vec![0.0, 1.0], vec![Vec3::zeros(), Vec3::zeros()]).unwrap();
        let other = PositionSeries::single(
            vec![0.0, 1.0],
            vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)],
        )
        .unwrap();

        let before = mean_distance(&reference, DEFAULT_TRACK, &other, DEFAULT_TRACK).unwrap();
        assert_eq!(before, 1.0);

        let aligned = TransformPipeline::new(vec![
            Transform::shift_xyz(-1.0, 0.0, 0.0),
            Transform::rotate_about_track(crate::transform::Axis::X, 0.0, DEFAULT_TRACK),
            Transform::shift_time(0.0),
        ])
        .apply(&other)
        .unwrap();
        let after = mean_distance(&reference, DEFAULT_TRACK, &aligned, DEFAULT_TRACK).unwrap();
        assert_eq!(after, 0.0);
    }

    #[test]
    fn distance_is_euclidean_not_per_axis() {
        let t = [0.0];
        let d = mean_distance_points(&t, &[Vec3::zeros()], &t, &[Vec3::new(3.0, 4.0, 0.0)]);
        assert_eq!(d, 5.0);
    }

    #[test]
    fn undefined_and_out_of_range_samples_are_skipped() {
        let rt = [0.0, 1.0, 2.0, 3.0];
        let rp = [
            Vec3::zeros(),
            Vec3::new(UNDEFINED, 0.0, 0.0),
            Vec3::zeros(),
            Vec3::zeros(),
        ];
        let ot = [0.0, 2.0];
        let op = [Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 2.0, 0.0)];
        // Sample 1 is undefined and sample 3 lies past the end of `other`.
        assert_eq!(mean_distance_points(&rt, &rp, &ot, &op), 2.0);
    }
}
