//! Problem builders for the two parameter fits.

pub mod alignment;
pub mod calibration;
