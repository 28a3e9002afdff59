//! Core math and data primitives for `gantry-calib`.
//!
//! This crate provides the building blocks shared by the solver and pipeline
//! crates:
//!
//! - linear algebra aliases and NaN-aware helpers ([`Real`], [`Vec3`], [`Mat3`]),
//! - multi-track position time series with strict, non-extrapolating
//!   linear resampling,
//! - the composable transform engine ([`Transform`], [`TransformPipeline`]),
//! - alignment and calibration parameter layouts,
//! - forward/inverse kinematics of the quadratic calibration model.
//!
//! Positions are row vectors in the model formulas (`p·A + p²·B + C`) and
//! column vectors ([`Vec3`]) in code; [`row_mul`] bridges the two.
//!
//! # Modules
//!
//! - \[`transform`\]: shift, rotate, time-shift and matrix transforms.
//! - \[`kinematics`\]: forward map and Newton-Raphson inverse.
//! - \[`synthetic`\]: deterministic trajectories and noise (tests/planning).
//!
//! # Example
//!
//! ```no_run
//! use gantry_calib_core::{
//!     kinematics, AlignmentParams, CalibrationParams, InverseOptions, PositionSeries,
//!     TrackSelection, Vec3,
//! };
//!
//! let series = PositionSeries::single(vec![0.0, 1.0], vec![Vec3::zeros(); 2]).unwrap();
//! let aligned = AlignmentParams::default()
//!     .pipeline("xyz", TrackSelection::All)
//!     .apply(&series)
//!     .unwrap();
//! assert_eq!(aligned.len(), 2);
//!
//! let params = CalibrationParams::identity();
//! let q = kinematics::inverse(&params, &Vec3::new(1.0, 2.0, 3.0), None, None, &InverseOptions::default());
//! assert!(q.converged());
//! ```

mod bad_frames;
mod bounds;
mod capture;
mod error;
mod interp;
pub mod kinematics;
mod math;
mod metrics;
mod params;
mod series;
pub mod serde_undefined;
/// Deterministic synthetic data generation helpers.
pub mod synthetic;
pub mod transform;

pub use bad_frames::*;
pub use bounds::*;
pub use capture::*;
pub use error::*;
pub use interp::*;
pub use kinematics::{InverseOptions, InverseSolution, InverseStatus};
pub use math::*;
pub use metrics::*;
pub use params::*;
pub use series::*;
pub use transform::{Axis, Transform, TransformPipeline, track_mean};
