//! Derivative-free solvers for gantry alignment, calibration and
//! feasibility checks.
//!
//! Solvers are written against the [`Minimizer`] capability; [`Powell`] is
//! the bundled implementation (bounded Powell direction search with Brent
//! line minimization).
//!
//! # Example
//!
//! ```no_run
//! use gantry_calib_core::{AlignmentParams, PositionSeries, Vec3};
//! use gantry_calib_optim::problems::alignment::*;
//! use gantry_calib_optim::Powell;
//!
//! let time = vec![0.0, 1.0, 2.0];
//! let points = vec![Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0)];
//! let reference = PositionSeries::single(time, points).unwrap();
//! let moving = reference.clone();
//!
//! let dataset = AlignmentDataset::from_tracks(&reference, "xyz", &moving, "xyz").unwrap();
//! let result = optimize_alignment(
//!     &dataset,
//!     Some(&AlignmentParams::default()),
//!     &AlignmentSolveOptions::default(),
//!     &Powell::default(),
//! )
//! .unwrap();
//! println!("final mean distance {}", result.final_cost);
//! ```

mod error;
pub mod feasibility;
mod line_search;
mod minimizer;
pub mod powell;
pub mod problems;

pub use error::OptimError;
pub use minimizer::*;
pub use powell::{Powell, PowellOptions};
