//! Deterministic synthetic data generation helpers.
//!
//! Building blocks for constructing synthetic calibration problems used in
//! tests and for planning measurement runs:
//! - boustrophedon ("snake") waypoint paths covering a rectangle,
//! - constant-speed sampling of waypoint paths into position series,
//! - deterministic pseudo-random position noise.
//!
//! # Example
//!
//! ```no_run
//! use gantry_calib_core::synthetic::trajectory::{sample_path, snake_path, SnakeDirection};
//!
//! let xy = snake_path((300.0, 300.0), (5000.0, 4900.0), 4, SnakeDirection::Horizontal).unwrap();
//! let waypoints: Vec<_> = xy
//!     .iter()
//!     .map(|&(x, y)| nalgebra::Vector3::new(x, y, -1000.0))
//!     .collect();
//! let series = sample_path(&waypoints, 8000.0 / 60.0, 30.0, 0.0).unwrap();
//! assert!(!series.is_empty());
//! ```

pub mod noise;
pub mod trajectory;
