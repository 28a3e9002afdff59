//! One-dimensional minimizers used along Powell search directions.
//!
//! [`brent`] works on an open line and brackets the minimum first;
//! [`bounded_brent`] searches a closed interval and never leaves it.

use gantry_calib_core::Real;

const GOLD: Real = 1.618_034;
const CGOLD: Real = 0.381_966_0;
const TINY: Real = 1e-21;
const GROW_LIMIT: Real = 110.0;
const BRACKET_MAX_ITER: usize = 1000;
const BRENT_MAX_ITER: usize = 500;
const MINTOL: Real = 1.0e-11;

/// Result of a scalar search: the minimizing step and its value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LineMin {
    pub alpha: Real,
    pub fval: Real,
}

/// Three points `a, b, c` with `f(b) <= f(a)` and `f(b) <= f(c)`.
#[derive(Debug, Clone, Copy)]
struct Bracket {
    xa: Real,
    xb: Real,
    xc: Real,
    fb: Real,
}

/// Downhill bracket search starting from `[xa, xb]`, with parabolic
/// extrapolation limited to `GROW_LIMIT` times the current step.
fn bracket(f: &mut dyn FnMut(Real) -> Real, mut xa: Real, mut xb: Real) -> Bracket {
    let mut fa = f(xa);
    let mut fb = f(xb);
    if fa < fb {
        std::mem::swap(&mut xa, &mut xb);
        std::mem::swap(&mut fa, &mut fb);
    }
    let mut xc = xb + GOLD * (xb - xa);
    let mut fc = f(xc);

    let mut iter = 0;
    while fc < fb && iter < BRACKET_MAX_ITER {
        iter += 1;
        let tmp1 = (xb - xa) * (fb - fc);
        let tmp2 = (xb - xc) * (fb - fa);
        let val = tmp2 - tmp1;
        let denom = if val.abs() < TINY { 2.0 * TINY } else { 2.0 * val };
        let mut w = xb - ((xb - xc) * tmp2 - (xb - xa) * tmp1) / denom;
        let wlim = xb + GROW_LIMIT * (xc - xb);
        let mut fw;

        if (w - xc) * (xb - w) > 0.0 {
            // parabolic step between b and c
            fw = f(w);
            if fw < fc {
                return Bracket {
                    xa: xb,
                    xb: w,
                    xc,
                    fb: fw,
                };
            } else if fw > fb {
                return Bracket { xa, xb, xc: w, fb };
            }
            w = xc + GOLD * (xc - xb);
            fw = f(w);
        } else if (w - wlim) * (wlim - xc) >= 0.0 {
            w = wlim;
            fw = f(w);
        } else if (w - wlim) * (xc - w) > 0.0 {
            fw = f(w);
            if fw < fc {
                xb = xc;
                xc = w;
                w = xc + GOLD * (xc - xb);
                fb = fc;
                fc = fw;
                fw = f(w);
            }
        } else {
            w = xc + GOLD * (xc - xb);
            fw = f(w);
        }
        xa = xb;
        xb = xc;
        xc = w;
        fa = fb;
        fb = fc;
        fc = fw;
    }

    Bracket { xa, xb, xc, fb }
}

/// Brent's method on an unbounded line, bracketing from `[0, 1]`.
///
/// `tol` is the relative tolerance on the step.
pub(crate) fn brent(f: &mut dyn FnMut(Real) -> Real, tol: Real) -> LineMin {
    let br = bracket(f, 0.0, 1.0);

    let (mut a, mut b) = if br.xa < br.xc {
        (br.xa, br.xc)
    } else {
        (br.xc, br.xa)
    };
    let (mut x, mut w, mut v) = (br.xb, br.xb, br.xb);
    let (mut fx, mut fw, mut fv) = (br.fb, br.fb, br.fb);
    let mut deltax: Real = 0.0;
    let mut rat: Real = 0.0;

    for _ in 0..BRENT_MAX_ITER {
        let tol1 = tol * x.abs() + MINTOL;
        let tol2 = 2.0 * tol1;
        let xmid = 0.5 * (a + b);
        if (x - xmid).abs() < tol2 - 0.5 * (b - a) {
            break;
        }

        if deltax.abs() <= tol1 {
            deltax = if x >= xmid { a - x } else { b - x };
            rat = CGOLD * deltax;
        } else {
            let tmp1 = (x - w) * (fx - fv);
            let mut tmp2 = (x - v) * (fx - fw);
            let mut p = (x - v) * tmp2 - (x - w) * tmp1;
            tmp2 = 2.0 * (tmp2 - tmp1);
            if tmp2 > 0.0 {
                p = -p;
            }
            tmp2 = tmp2.abs();
            let dx_temp = deltax;
            deltax = rat;
            if p > tmp2 * (a - x) && p < tmp2 * (b - x) && p.abs() < (0.5 * tmp2 * dx_temp).abs() {
                rat = p / tmp2;
                let u = x + rat;
                if (u - a) < tol2 || (b - u) < tol2 {
                    rat = if xmid - x >= 0.0 { tol1 } else { -tol1 };
                }
            } else {
                deltax = if x >= xmid { a - x } else { b - x };
                rat = CGOLD * deltax;
            }
        }

        let u = if rat.abs() < tol1 {
            if rat >= 0.0 { x + tol1 } else { x - tol1 }
        } else {
            x + rat
        };
        let fu = f(u);

        if fu > fx {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                w = u;
                fv = fw;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        } else {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            w = x;
            x = u;
            fv = fw;
            fw = fx;
            fx = fu;
        }
    }

    LineMin { alpha: x, fval: fx }
}

/// Bounded Brent search (golden section with parabolic steps) on
/// `[lower, upper]`. `xatol` is the absolute tolerance on the step.
pub(crate) fn bounded_brent(
    f: &mut dyn FnMut(Real) -> Real,
    lower: Real,
    upper: Real,
    xatol: Real,
    max_evals: usize,
) -> LineMin {
    let sqrt_eps = Real::EPSILON.sqrt();
    let golden_mean = 0.5 * (3.0 - (5.0 as Real).sqrt());

    let (mut a, mut b) = (lower, upper);
    let mut fulc = a + golden_mean * (b - a);
    let mut nfc = fulc;
    let mut xf = fulc;
    let mut rat: Real = 0.0;
    let mut e: Real = 0.0;
    let mut fx = f(xf);
    let mut evals = 1;
    let mut ffulc = fx;
    let mut fnfc = fx;
    let mut xm = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
    let mut tol2 = 2.0 * tol1;

    while (xf - xm).abs() > tol2 - 0.5 * (b - a) {
        let mut golden = true;
        if e.abs() > tol1 {
            golden = false;
            let mut r = (xf - nfc) * (fx - ffulc);
            let mut q = (xf - fulc) * (fx - fnfc);
            let mut p = (xf - fulc) * q - (xf - nfc) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            r = e;
            e = rat;

            if p.abs() < (0.5 * q * r).abs() && p > q * (a - xf) && p < q * (b - xf) {
                rat = p / q;
                let x = xf + rat;
                if (x - a) < tol2 || (b - x) < tol2 {
                    rat = tol1 * sign_or_one(xm - xf);
                }
            } else {
                golden = true;
            }
        }
        if golden {
            e = if xf >= xm { a - xf } else { b - xf };
            rat = golden_mean * e;
        }

        let x = xf + sign_or_one(rat) * rat.abs().max(tol1);
        let fu = f(x);
        evals += 1;

        if fu <= fx {
            if x >= xf {
                a = xf;
            } else {
                b = xf;
            }
            fulc = nfc;
            ffulc = fnfc;
            nfc = xf;
            fnfc = fx;
            xf = x;
            fx = fu;
        } else {
            if x < xf {
                a = x;
            } else {
                b = x;
            }
            if fu <= fnfc || nfc == xf {
                fulc = nfc;
                ffulc = fnfc;
                nfc = x;
                fnfc = fu;
            } else if fu <= ffulc || fulc == xf || fulc == nfc {
                fulc = x;
                ffulc = fu;
            }
        }

        xm = 0.5 * (a + b);
        tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
        tol2 = 2.0 * tol1;
        if evals >= max_evals {
            break;
        }
    }

    LineMin { alpha: xf, fval: fx }
}

/// `sign(v)`, with zero mapped to `+1`.
fn sign_or_one(v: Real) -> Real {
    if v < 0.0 { -1.0 } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn brent_finds_parabola_minimum() {
        let mut evals = 0;
        let mut f = |a: Real| {
            evals += 1;
            (a - 3.7).powi(2) + 1.0
        };
        let m = brent(&mut f, 1e-7);
        assert_abs_diff_eq!(m.alpha, 3.7, epsilon = 1e-6);
        assert_abs_diff_eq!(m.fval, 1.0, epsilon = 1e-12);
        assert!(evals < 50);
    }

    #[test]
    fn brent_brackets_downhill_on_negative_side() {
        let mut f = |a: Real| (a + 12.0).powi(2);
        let m = brent(&mut f, 1e-7);
        assert_abs_diff_eq!(m.alpha, -12.0, epsilon = 1e-5);
    }

    #[test]
    fn bounded_brent_stays_in_interval() {
        let mut f = |a: Real| (a - 5.0).powi(2);
        let m = bounded_brent(&mut f, -1.0, 2.0, 1e-9, 500);
        assert!(m.alpha <= 2.0 && m.alpha >= -1.0);
        assert_abs_diff_eq!(m.alpha, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn bounded_brent_interior_minimum() {
        let mut f = |a: Real| (a - 0.25).powi(2) - 2.0;
        let m = bounded_brent(&mut f, -1.0, 1.0, 1e-9, 500);
        assert_abs_diff_eq!(m.alpha, 0.25, epsilon = 1e-7);
        assert_abs_diff_eq!(m.fval, -2.0, epsilon = 1e-12);
    }
}
