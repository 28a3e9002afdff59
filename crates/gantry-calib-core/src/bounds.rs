//! Per-axis travel limits.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::math::{Real, Vec3};

/// Per-axis `(min, max)` envelope for commanded positions or joints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl AxisBounds {
    pub fn new(min: Vec3, max: Vec3) -> Result<Self, CoreError> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Build from `[(min, max); 3]` pairs.
    pub fn from_pairs(pairs: [(Real, Real); 3]) -> Result<Self, CoreError> {
        Self::new(
            Vec3::new(pairs[0].0, pairs[1].0, pairs[2].0),
            Vec3::new(pairs[0].1, pairs[1].1, pairs[2].1),
        )
    }

    /// Symmetric envelope `[-half, half]` on every axis.
    pub fn symmetric(half: Vec3) -> Result<Self, CoreError> {
        Self::new(-half, half)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        for axis in 0..3 {
            let (min, max) = (self.min[axis], self.max[axis]);
            if min.is_nan() || max.is_nan() || min > max {
                return Err(CoreError::InvertedBounds { axis, min, max });
            }
        }
        Ok(())
    }

    pub fn clamp(&self, p: &Vec3) -> Vec3 {
        Vec3::from_fn(|i, _| p[i].clamp(self.min[i], self.max[i]))
    }

    pub fn contains(&self, p: &Vec3) -> bool {
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }

    /// Largest absolute coordinate per axis.
    pub fn max_abs(&self) -> Vec3 {
        self.min.abs().sup(&self.max.abs())
    }

    pub fn pair(&self, axis: usize) -> (Real, Real) {
        (self.min[axis], self.max[axis])
    }
}
