//! Raw and rigid-body marker positions from a capture.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::math::{Real, Vec3};

/// One motion-capture take for a single rigid body.
///
/// `raw_markers[i]` holds the detected positions of marker `i + 1`,
/// `fitted_markers[i]` the position of the same marker as fitted to the
/// rigid-body model. Undetected samples are undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerCapture {
    pub rigid_body_name: String,
    pub frame: Vec<usize>,
    pub time: Vec<Real>,
    #[serde(with = "crate::serde_undefined::points")]
    pub rigid_body: Vec<Vec3>,
    #[serde(with = "crate::serde_undefined::point_sets")]
    pub raw_markers: Vec<Vec<Vec3>>,
    #[serde(with = "crate::serde_undefined::point_sets")]
    pub fitted_markers: Vec<Vec<Vec3>>,
}

impl MarkerCapture {
    /// Validate and assemble a capture.
    ///
    /// # Errors
    ///
    /// Fails if raw and fitted marker counts differ or any column length
    /// disagrees with the time column.
    pub fn new(
        rigid_body_name: impl Into<String>,
        frame: Vec<usize>,
        time: Vec<Real>,
        rigid_body: Vec<Vec3>,
        raw_markers: Vec<Vec<Vec3>>,
        fitted_markers: Vec<Vec<Vec3>>,
    ) -> Result<Self, CoreError> {
        if raw_markers.len() != fitted_markers.len() {
            return Err(CoreError::MarkerCountMismatch {
                raw: raw_markers.len(),
                fitted: fitted_markers.len(),
            });
        }
        let n = time.len();
        let columns = [("frame".to_string(), frame.len()), ("rigid_body".to_string(), rigid_body.len())]
            .into_iter()
            .chain(raw_markers.iter().enumerate().map(|(i, m)| (format!("marker{}", i + 1), m.len())))
            .chain(
                fitted_markers
                    .iter()
                    .enumerate()
                    .map(|(i, m)| (format!("rb_marker{}", i + 1), m.len())),
            );
        for (name, got) in columns {
            if got != n {
                return Err(CoreError::TrackLength {
                    name,
                    expected: n,
                    got,
                });
            }
        }
        Ok(Self {
            rigid_body_name: rigid_body_name.into(),
            frame,
            time,
            rigid_body,
            raw_markers,
            fitted_markers,
        })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn marker_count(&self) -> usize {
        self.raw_markers.len()
    }

    /// `true` if no raw marker was detected at sample `idx`. A capture
    /// without markers never counts as undetected.
    pub fn undetected(&self, idx: usize) -> bool {
        !self.raw_markers.is_empty() && self.raw_markers.iter().all(|m| m[idx].x.is_nan())
    }
}
