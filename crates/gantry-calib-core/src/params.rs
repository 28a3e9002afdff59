//! Alignment and calibration parameter sets.
//!
//! Both are persisted as flat numeric arrays; the structured forms here are
//! the only place that knows how those arrays are laid out.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::math::{Mat3, Real, Vec3, row_mul, squared};
use crate::series::TrackSelection;
use crate::transform::{Axis, Transform, TransformPipeline};

fn check_len(values: &[Real], expected: usize) -> Result<(), CoreError> {
    if values.len() != expected {
        return Err(CoreError::ParamLength {
            expected,
            got: values.len(),
        });
    }
    Ok(())
}

/// Rigid registration between two devices.
///
/// Layout: `[tx, ty, tz, rx, ry, rz, dt]`. Rotations are applied in x, y, z
/// order, each about the centroid of a designated track, after the
/// translation and before the time shift.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignmentParams {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub time_shift: Real,
}

impl AlignmentParams {
    pub const LEN: usize = 7;

    pub fn from_slice(values: &[Real]) -> Result<Self, CoreError> {
        check_len(values, Self::LEN)?;
        Ok(Self {
            translation: Vec3::new(values[0], values[1], values[2]),
            rotation: Vec3::new(values[3], values[4], values[5]),
            time_shift: values[6],
        })
    }

    pub fn to_vec(&self) -> Vec<Real> {
        let mut v = Vec::with_capacity(Self::LEN);
        v.extend(self.translation.iter());
        v.extend(self.rotation.iter());
        v.push(self.time_shift);
        v
    }

    /// Transform steps realizing these parameters.
    pub fn steps(&self, center_track: &str) -> Vec<Transform> {
        let mut steps = vec![Transform::ShiftXyz {
            offset: self.translation,
        }];
        steps.extend(
            Axis::ALL
                .iter()
                .map(|&axis| Transform::rotate_about_track(axis, self.rotation[axis.index()], center_track)),
        );
        steps.push(Transform::shift_time(self.time_shift));
        steps
    }

    /// Pipeline applying [`steps`](Self::steps) to `targets`.
    pub fn pipeline(&self, center_track: &str, targets: TrackSelection) -> TransformPipeline {
        TransformPipeline::new(self.steps(center_track)).with_targets(targets)
    }
}

/// Quadratic kinematic model `p·A + p²·B + C` (row-vector convention).
///
/// Layout: `A` row-major in `[0..9]`, the first two rows of `B` in `[9..15]`
/// and `C` in `[15..18]`. The third row of `B` is always zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    a: Mat3,
    b: Mat3,
    c: Vec3,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self::identity()
    }
}

impl CalibrationParams {
    pub const LEN: usize = 18;

    /// Build from matrices; `b` must have a zero third row.
    pub fn new(a: Mat3, b: Mat3, c: Vec3) -> Result<Self, CoreError> {
        let third = [b[(2, 0)], b[(2, 1)], b[(2, 2)]];
        if third.iter().any(|&v| v != 0.0) {
            return Err(CoreError::QuadraticThirdRow(third));
        }
        Ok(Self { a, b, c })
    }

    /// The model that leaves every position unchanged.
    pub fn identity() -> Self {
        Self {
            a: Mat3::identity(),
            b: Mat3::zeros(),
            c: Vec3::zeros(),
        }
    }

    pub fn from_slice(values: &[Real]) -> Result<Self, CoreError> {
        check_len(values, Self::LEN)?;
        let a = Mat3::from_row_slice(&values[0..9]);
        let mut b = Mat3::zeros();
        for r in 0..2 {
            for c in 0..3 {
                b[(r, c)] = values[9 + 3 * r + c];
            }
        }
        let c = Vec3::new(values[15], values[16], values[17]);
        Ok(Self { a, b, c })
    }

    pub fn to_vec(&self) -> Vec<Real> {
        let mut v = Vec::with_capacity(Self::LEN);
        for r in 0..3 {
            v.extend(self.a.row(r).iter());
        }
        for r in 0..2 {
            v.extend(self.b.row(r).iter());
        }
        v.extend(self.c.iter());
        v
    }

    pub fn a(&self) -> &Mat3 {
        &self.a
    }

    pub fn b(&self) -> &Mat3 {
        &self.b
    }

    pub fn c(&self) -> &Vec3 {
        &self.c
    }

    /// Predicted position for a commanded position.
    pub fn apply(&self, p: &Vec3) -> Vec3 {
        row_mul(p, &self.a) + row_mul(&squared(p), &self.b) + self.c
    }

    /// The model as a transform step.
    pub fn transform(&self) -> Transform {
        Transform::QuadraticMatrixTransform {
            m1: self.a,
            m2: self.b,
            c: self.c,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_layout() {
        let p = AlignmentParams::from_slice(&[1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 4.0]).unwrap();
        assert_eq!(p.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(p.rotation, Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(p.time_shift, 4.0);
        assert_eq!(p.to_vec(), vec![1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 4.0]);
        assert!(AlignmentParams::from_slice(&[0.0; 6]).is_err());
    }

    #[test]
    fn alignment_steps_are_ordered() {
        let steps = AlignmentParams::default().steps("rb");
        assert_eq!(steps.len(), 5);
        assert!(matches!(steps[0], Transform::ShiftXyz { .. }));
        assert!(matches!(
            steps[1],
            Transform::RotateDynamicCenter { axis: Axis::X, .. }
        ));
        assert!(matches!(
            steps[3],
            Transform::RotateDynamicCenter { axis: Axis::Z, .. }
        ));
        assert!(matches!(steps[4], Transform::ShiftTime { .. }));
    }

    #[test]
    fn calibration_layout() {
        let values: Vec<Real> = (0..18).map(|v| v as Real).collect();
        let p = CalibrationParams::from_slice(&values).unwrap();
        assert_eq!(p.a()[(0, 1)], 1.0);
        assert_eq!(p.a()[(2, 0)], 6.0);
        assert_eq!(p.b()[(1, 2)], 14.0);
        assert_eq!(p.b().row(2).iter().copied().collect::<Vec<_>>(), vec![0.0; 3]);
        assert_eq!(*p.c(), Vec3::new(15.0, 16.0, 17.0));
        assert_eq!(p.to_vec(), values);
    }

    #[test]
    fn rejects_quadratic_z_row() {
        let mut b = Mat3::zeros();
        b[(2, 1)] = 0.5;
        let err = CalibrationParams::new(Mat3::identity(), b, Vec3::zeros()).unwrap_err();
        assert_eq!(err, CoreError::QuadraticThirdRow([0.0, 0.5, 0.0]));
    }

    #[test]
    fn identity_model_is_noop() {
        let p = Vec3::new(1.0, -2.0, 3.0);
        assert_eq!(CalibrationParams::identity().apply(&p), p);
    }
}
