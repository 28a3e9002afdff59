//! Composable coordinate transforms on position series.
//!
//! A [`Transform`] is a closed set of operations, each a pure function from
//! one [`PositionSeries`] to another. Transforms act on the tracks chosen by
//! a [`TrackSelection`]; the time column and unselected tracks pass through
//! untouched (except for [`Transform::ShiftTime`], which resamples the
//! selected tracks against the unchanged time column).
//!
//! A [`TransformPipeline`] applies its steps strictly left to right. Order
//! matters: rotations do not commute with each other or with shifts, and a
//! [`Transform::RotateDynamicCenter`] sees the centroid produced by the
//! steps before it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::interp::resample_vec3;
use crate::math::{Mat3, Real, Vec3, nan_mean, row_mul, squared};
use crate::series::{PositionSeries, TrackSelection};

/// Coordinate axis a rotation is performed about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The two coordinates mixed by a rotation about this axis, in the
    /// order used by the 2D rotation matrix.
    fn plane(self) -> (usize, usize) {
        match self {
            Axis::X => (1, 2),
            Axis::Y => (0, 2),
            Axis::Z => (0, 1),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(s)
    }
}

impl FromStr for Axis {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" | "X" => Ok(Axis::X),
            "y" | "Y" => Ok(Axis::Y),
            "z" | "Z" => Ok(Axis::Z),
            other => Err(CoreError::InvalidAxis(other.to_string())),
        }
    }
}

/// A single coordinate transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    /// Resample at `t - dt` against the series' own time column.
    ShiftTime { dt: Real },
    /// Translate positions by `offset`.
    ShiftXyz { offset: Vec3 },
    /// Rotate about `axis` through a fixed `center`.
    Rotate { axis: Axis, angle: Real, center: Vec3 },
    /// Rotate about `axis` through the mean position of `center_track`,
    /// evaluated on the series this step receives.
    RotateDynamicCenter {
        axis: Axis,
        angle: Real,
        center_track: String,
    },
    /// `p·m + c` in row-vector convention.
    MatrixTransform { m: Mat3, c: Vec3 },
    /// `p·m1 + p²·m2 + c` in row-vector convention, `p²` element-wise.
    QuadraticMatrixTransform { m1: Mat3, m2: Mat3, c: Vec3 },
}

impl Transform {
    pub fn shift_xyz(dx: Real, dy: Real, dz: Real) -> Self {
        Transform::ShiftXyz {
            offset: Vec3::new(dx, dy, dz),
        }
    }

    pub fn shift_time(dt: Real) -> Self {
        Transform::ShiftTime { dt }
    }

    pub fn rotate(axis: Axis, angle: Real, center: Vec3) -> Self {
        Transform::Rotate {
            axis,
            angle,
            center,
        }
    }

    pub fn rotate_about_track(axis: Axis, angle: Real, center_track: impl Into<String>) -> Self {
        Transform::RotateDynamicCenter {
            axis,
            angle,
            center_track: center_track.into(),
        }
    }

    /// Apply this transform to the selected tracks of `series`.
    ///
    /// # Errors
    ///
    /// Fails if the selection or the dynamic center names a missing track.
    pub fn apply(
        &self,
        series: &PositionSeries,
        targets: &TrackSelection,
    ) -> Result<PositionSeries, CoreError> {
        let indices = targets.resolve(series)?;
        let mut out = series.clone();

        match self {
            Transform::ShiftTime { dt } => {
                if *dt == 0.0 {
                    return Ok(out);
                }
                let query: Vec<Real> = series.time().iter().map(|t| t - dt).collect();
                let time = series.time().to_vec();
                for &i in &indices {
                    let track = &mut out.tracks_mut()[i];
                    track.points = resample_vec3(&time, &track.points, &query);
                }
            }
            Transform::ShiftXyz { offset } => {
                map_points(&mut out, &indices, |p| p + offset);
            }
            Transform::Rotate {
                axis,
                angle,
                center,
            } => {
                let (sin, cos) = angle.sin_cos();
                map_points(&mut out, &indices, |p| rotate_point(p, *axis, sin, cos, center));
            }
            Transform::RotateDynamicCenter {
                axis,
                angle,
                center_track,
            } => {
                let center = track_mean(series.track(center_track)?);
                let (sin, cos) = angle.sin_cos();
                map_points(&mut out, &indices, |p| rotate_point(p, *axis, sin, cos, &center));
            }
            Transform::MatrixTransform { m, c } => {
                map_points(&mut out, &indices, |p| row_mul(&p, m) + c);
            }
            Transform::QuadraticMatrixTransform { m1, m2, c } => {
                map_points(&mut out, &indices, |p| {
                    row_mul(&p, m1) + row_mul(&squared(&p), m2) + c
                });
            }
        }
        Ok(out)
    }
}

fn map_points<F>(series: &mut PositionSeries, indices: &[usize], f: F)
where
    F: Fn(Vec3) -> Vec3,
{
    for &i in indices {
        for p in series.tracks_mut()[i].points.iter_mut() {
            *p = f(*p);
        }
    }
}

fn rotate_point(p: Vec3, axis: Axis, sin: Real, cos: Real, center: &Vec3) -> Vec3 {
    let (a, b) = axis.plane();
    let d = p - center;
    let mut out = p;
    out[a] = d[a] * cos - d[b] * sin + center[a];
    out[b] = d[a] * sin + d[b] * cos + center[b];
    out
}

/// Per-axis mean of a track, skipping undefined components.
pub fn track_mean(points: &[Vec3]) -> Vec3 {
    Vec3::new(
        nan_mean(points.iter().map(|p| p.x)),
        nan_mean(points.iter().map(|p| p.y)),
        nan_mean(points.iter().map(|p| p.z)),
    )
}

/// An ordered list of transforms applied to the same track selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformPipeline {
    pub steps: Vec<Transform>,
    pub targets: TrackSelection,
}

impl TransformPipeline {
    pub fn new(steps: Vec<Transform>) -> Self {
        Self {
            steps,
            targets: TrackSelection::All,
        }
    }

    pub fn with_targets(mut self, targets: TrackSelection) -> Self {
        self.targets = targets;
        self
    }

    pub fn push(&mut self, step: Transform) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Fold the steps over `series`, left to right.
    pub fn apply(&self, series: &PositionSeries) -> Result<PositionSeries, CoreError> {
        let mut current = series.clone();
        for step in &self.steps {
            current = step.apply(&current, &self.targets)?;
        }
        Ok(current)
    }
}
