//! Machine-control configuration for the fitted model.
//!
//! The controller's `calibxyzkins` component works with column vectors, so
//! `A`, `B` and `C` are written transposed.

use std::fmt::Write as _;

use gantry_calib_core::{CalibrationParams, Real};

const COORDS: [char; 3] = ['x', 'y', 'z'];

/// `setp` lines for every model coefficient, grouped by matrix.
pub fn kinematics_config(params: &CalibrationParams) -> String {
    let a = params.a().transpose();
    let b = params.b().transpose();
    let c = params.c();

    let mut out = String::new();
    for (i, (title, name, m)) in [("A", "calib-a", a), ("B", "calib-b", b)].into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "# Calibration matrix {title}");
        for (r, rc) in COORDS.iter().enumerate() {
            for (col, cc) in COORDS.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "setp calibxyzkins.{name}.{rc}{cc} {}",
                    format_general(m[(r, col)], 10)
                );
            }
        }
    }
    out.push('\n');
    out.push_str("# Calibration vector C\n");
    for (r, rc) in COORDS.iter().enumerate() {
        let _ = writeln!(out, "setp calibxyzkins.calib-c.{rc} {}", format_general(c[r], 10));
    }
    out
}

/// `%g`-style formatting with `precision` significant digits.
pub fn format_general(v: Real, precision: usize) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, v);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= precision as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", strip_zeros(mantissa), exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        strip_zeros(&format!("{v:.decimals$}")).to_string()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
