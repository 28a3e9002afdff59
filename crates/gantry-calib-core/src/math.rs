//! Linear algebra type aliases and small numeric helpers.
//!
//! Positions are carried as column vectors ([`Vec3`]) in code, but the
//! calibration model is written in row-vector convention (`p·A`). The helpers
//! here keep that translation in one place.

use nalgebra::{Matrix3, Vector3};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;

/// Undefined value used for missing or masked samples.
pub const UNDEFINED: Real = Real::NAN;

/// A position whose every component is undefined.
pub fn undefined_vec3() -> Vec3 {
    Vec3::from_element(UNDEFINED)
}

/// `true` if any component is undefined.
pub fn has_undefined(v: &Vec3) -> bool {
    v.iter().any(|c| c.is_nan())
}

/// Row-vector product `p·M`, returned as a column vector.
pub fn row_mul(p: &Vec3, m: &Mat3) -> Vec3 {
    m.transpose() * p
}

/// Element-wise square of a vector.
pub fn squared(p: &Vec3) -> Vec3 {
    p.component_mul(p)
}

/// Matrix 1-norm (maximum absolute column sum).
pub fn norm_1(m: &Mat3) -> Real {
    (0..3)
        .map(|c| m.column(c).iter().map(|v| v.abs()).sum::<Real>())
        .fold(0.0, Real::max)
}

/// Matrix infinity-norm (maximum absolute row sum).
pub fn norm_inf(m: &Mat3) -> Real {
    (0..3)
        .map(|r| m.row(r).iter().map(|v| v.abs()).sum::<Real>())
        .fold(0.0, Real::max)
}

/// Mean of the defined values in `values`, or undefined if there are none.
pub fn nan_mean<I>(values: I) -> Real
where
    I: IntoIterator<Item = Real>,
{
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        UNDEFINED
    } else {
        sum / count as Real
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_mul_matches_row_vector_convention() {
        let m = Mat3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        let p = Vec3::new(1.0, 0.0, 0.0);
        // [1,0,0]·M selects the first row of M.
        assert_eq!(row_mul(&p, &m), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn matrix_norms() {
        let m = Mat3::new(1.0, -2.0, 0.0, 0.0, 3.0, 0.0, 0.5, 0.0, -1.0);
        assert_eq!(norm_1(&m), 5.0);
        assert_eq!(norm_inf(&m), 3.0);
    }

    #[test]
    fn nan_mean_skips_undefined() {
        assert_eq!(nan_mean([1.0, UNDEFINED, 3.0]), 2.0);
        assert!(nan_mean([UNDEFINED, UNDEFINED]).is_nan());
        assert!(nan_mean(std::iter::empty()).is_nan());
    }
}
