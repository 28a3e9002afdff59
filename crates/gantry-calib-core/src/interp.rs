//! Linear resampling of sampled signals.
//!
//! Queries outside the source time extent yield [`UNDEFINED`]; nothing is
//! ever extrapolated. Undefined source samples propagate into every query
//! that interpolates across them.

use crate::math::{Real, UNDEFINED, Vec3, undefined_vec3};

/// Locate the bracketing segment of `t` in a sorted `times` slice.
///
/// Returns `(i, w)` such that the interpolated value is
/// `v[i] * (1 - w) + v[i + 1] * w`, or `None` if `t` is outside the extent.
fn bracket(times: &[Real], t: Real) -> Option<(usize, Real)> {
    let n = times.len();
    if n == 0 || t.is_nan() || t < times[0] || t > times[n - 1] {
        return None;
    }
    if n == 1 {
        return Some((0, 0.0));
    }
    // first index with times[idx] > t
    let idx = times.partition_point(|&x| x <= t);
    if idx >= n {
        return Some((n - 2, 1.0));
    }
    let i = idx.saturating_sub(1);
    let (t0, t1) = (times[i], times[i + 1]);
    let span = t1 - t0;
    let w = if span > 0.0 { (t - t0) / span } else { 0.0 };
    Some((i, w))
}

fn lerp(a: Real, b: Real, w: Real) -> Real {
    if w == 0.0 {
        a
    } else if w == 1.0 {
        b
    } else {
        a + (b - a) * w
    }
}

/// Interpolate a scalar signal at time `t`.
pub fn interp_scalar(times: &[Real], values: &[Real], t: Real) -> Real {
    match bracket(times, t) {
        Some((i, w)) if i + 1 < values.len() => lerp(values[i], values[i + 1], w),
        Some((i, _)) => values.get(i).copied().unwrap_or(UNDEFINED),
        None => UNDEFINED,
    }
}

/// Interpolate a position signal at time `t`.
pub fn interp_vec3(times: &[Real], points: &[Vec3], t: Real) -> Vec3 {
    match bracket(times, t) {
        Some((i, w)) if i + 1 < points.len() => {
            let (a, b) = (&points[i], &points[i + 1]);
            Vec3::new(lerp(a.x, b.x, w), lerp(a.y, b.y, w), lerp(a.z, b.z, w))
        }
        Some((i, _)) => points.get(i).copied().unwrap_or_else(undefined_vec3),
        None => undefined_vec3(),
    }
}

/// Resample a position signal at each of `query` times.
pub fn resample_vec3(times: &[Real], points: &[Vec3], query: &[Real]) -> Vec<Vec3> {
    query
        .iter()
        .map(|&t| interp_vec3(times, points, t))
        .collect()
}

/// Fill interior gaps of a scalar column by linear interpolation over the
/// sample index. Leading and trailing gaps stay undefined.
pub fn fill_inside(values: &[Real]) -> Vec<Real> {
    let defined: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, _)| i)
        .collect();
    let mut out = values.to_vec();
    for pair in defined.windows(2) {
        let (i0, i1) = (pair[0], pair[1]);
        if i1 - i0 < 2 {
            continue;
        }
        let (v0, v1) = (values[i0], values[i1]);
        for (k, slot) in out.iter_mut().enumerate().take(i1).skip(i0 + 1) {
            let w = (k - i0) as Real / (i1 - i0) as Real;
            *slot = v0 + (v1 - v0) * w;
        }
    }
    out
}

/// [`fill_inside`] applied to each coordinate of a position column.
pub fn fill_inside_vec3(points: &[Vec3]) -> Vec<Vec3> {
    let axis = |k: usize| fill_inside(&points.iter().map(|p| p[k]).collect::<Vec<_>>());
    let (xs, ys, zs) = (axis(0), axis(1), axis(2));
    (0..points.len())
        .map(|i| Vec3::new(xs[i], ys[i], zs[i]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_between_samples() {
        let t = [0.0, 1.0, 3.0];
        let v = [0.0, 10.0, 30.0];
        assert_eq!(interp_scalar(&t, &v, 0.5), 5.0);
        assert_eq!(interp_scalar(&t, &v, 2.0), 20.0);
        assert_eq!(interp_scalar(&t, &v, 3.0), 30.0);
        assert_eq!(interp_scalar(&t, &v, 0.0), 0.0);
    }

    #[test]
    fn out_of_range_is_undefined() {
        let t = [1.0, 2.0];
        let v = [5.0, 6.0];
        assert!(interp_scalar(&t, &v, 0.999).is_nan());
        assert!(interp_scalar(&t, &v, 2.001).is_nan());
        assert!(interp_scalar(&[], &[], 0.0).is_nan());
    }

    #[test]
    fn undefined_samples_propagate() {
        let t = [0.0, 1.0, 2.0];
        let v = [0.0, UNDEFINED, 2.0];
        assert!(interp_scalar(&t, &v, 0.5).is_nan());
        assert!(interp_scalar(&t, &v, 1.5).is_nan());
        assert_eq!(interp_scalar(&t, &v, 2.0), 2.0);
    }

    #[test]
    fn resamples_positions() {
        let t = [0.0, 2.0];
        let p = [Vec3::zeros(), Vec3::new(2.0, 4.0, -2.0)];
        let out = resample_vec3(&t, &p, &[1.0, 3.0]);
        assert_eq!(out[0], Vec3::new(1.0, 2.0, -1.0));
        assert!(out[1].x.is_nan());
    }

    #[test]
    fn fill_inside_leaves_edges() {
        let v = [UNDEFINED, 1.0, UNDEFINED, UNDEFINED, 4.0, UNDEFINED];
        let out = fill_inside(&v);
        assert!(out[0].is_nan());
        assert_eq!(&out[1..5], &[1.0, 2.0, 3.0, 4.0]);
        assert!(out[5].is_nan());
    }
}
