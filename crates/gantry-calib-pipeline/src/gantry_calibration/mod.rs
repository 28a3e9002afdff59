//! Gantry vs. motion-capture calibration.
//!
//! # Pipeline
//!
//! 1. **Synchronize**: resample the gantry log onto the capture clock.
//! 2. **Align**: fit translation, small rotations and a time offset that
//!    bring the rigid body onto the gantry path, then move every capture
//!    track with them.
//! 3. **Mask bad frames**: blank the known-bad sample ranges.
//! 4. **Calibrate**: fit `p·A + p²·B + C` mapping commanded to measured
//!    positions.
//! 5. **Finalize**: error statistics before and after calibration.
//!
//! Fitted parameters go through a [`ParamCache`](crate::cache::ParamCache);
//! a later run reuses them unless the config asks to recompute.
//!
//! ```no_run
//! use gantry_calib_pipeline::cache::JsonFileCache;
//! use gantry_calib_pipeline::gantry_calibration::{
//!     GantryCalibrationInput, GantryCalibrationProblem, run_calibration,
//! };
//! use gantry_calib_pipeline::session::CalibrationSession;
//! # fn main() -> anyhow::Result<()> {
//! let input = GantryCalibrationInput::from_files("take_optitrack.csv", "take_gantry.csv", None)?;
//! let mut session = CalibrationSession::<GantryCalibrationProblem>::with_input(input)?;
//! run_calibration(&mut session, &mut JsonFileCache::new("."))?;
//! println!("{:?}", session.export()?.kinematics_config);
//! # Ok(())
//! # }
//! ```

mod problem;
mod state;
mod steps;

pub use problem::{
    GantryCalibrationConfig, GantryCalibrationExport, GantryCalibrationInput,
    GantryCalibrationOutput, GantryCalibrationProblem,
};
pub use state::GantryCalibrationState;
pub use steps::{
    run_calibration, step_align, step_calibrate, step_finalize, step_mask_bad_frames,
    step_synchronize,
};
