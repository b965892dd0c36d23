//! Cyclic coordinate descent (CCD).
//!
//! Each coordinate is moved to the exact minimiser of the loss restricted to
//! that coordinate before the sweep moves on.
//!
//! KL / Poisson loss, for one column `x` of the refined factor:
//!
//! ```text
//! f(x) = Σ_k u_k x_k − Σ_i w_i log(Σ_k L_ik x_k),   x ≥ 0
//! ```
//!
//! with `u` the column sums of `L` over all rows, so rows with `w_i = 0` can
//! be left out of `L`. The 1-D problem has no closed form; it is solved by
//! safeguarded Newton iterations until the coordinate satisfies its KKT
//! conditions (Hsieh & Dhillon 2011).
//!
//! Least-squares loss: the 1-D problem is quadratic and the single projected
//! Newton step `x_k − (G x − Wᵀv)_k / G_kk` is exact.

use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix2};
use sprs::CsMat;

use super::{check_update_shapes, projected_newton};
use crate::error::{check_floor, check_len, Result};
use crate::matrix::{as_csc, column_support};
use crate::parallel::{update_lanes, update_lanes_parallel};

/// Upper bound on inner iterations spent on a single coordinate
const MAX_INNER_STEPS: usize = 100;
/// Relative size of `|u_k − s_k|` at which a coordinate counts as minimised
const KKT_TOL: f64 = 1e-12;

/// `numiter` cyclic CCD sweeps on the KL loss, `u = colsum(l)`.
///
/// `l` is n×k, `w` has length n, `x0` has length k.
pub fn ccd_kl_update(
    l: &Array2<f64>,
    w: &Array1<f64>,
    x0: &Array1<f64>,
    numiter: usize,
    e: f64,
) -> Result<Array1<f64>> {
    let u = l.sum_axis(Axis(0));
    ccd_kl_update2(l, &u, w, x0, numiter, e)
}

/// [`ccd_kl_update`] with the column sums `u` supplied by the caller, for
/// when `l` holds only the rows with non-zero `w`.
pub fn ccd_kl_update2(
    l: &Array2<f64>,
    u: &Array1<f64>,
    w: &Array1<f64>,
    x0: &Array1<f64>,
    numiter: usize,
    e: f64,
) -> Result<Array1<f64>> {
    check_floor(e)?;
    check_len("ccd_kl_update: w", l.nrows(), w.len())?;
    check_len("ccd_kl_update: u", l.ncols(), u.len())?;
    check_len("ccd_kl_update: x0", l.ncols(), x0.len())?;
    Ok(ccd_kl_solve(
        l.view(),
        u.view(),
        w.view(),
        x0.to_owned(),
        numiter,
        e,
    ))
}

pub(crate) fn ccd_kl_solve(
    l: ArrayView2<f64>,
    u: ArrayView1<f64>,
    w: ArrayView1<f64>,
    mut x: Array1<f64>,
    numiter: usize,
    e: f64,
) -> Array1<f64> {
    let mut r = l.dot(&x);
    for _ in 0..numiter {
        for k in 0..x.len() {
            x[k] = minimise_coordinate(l.column(k), u[k], w, &mut r, x[k], e);
        }
    }
    x
}

/// Exact minimiser of the loss along coordinate `k`, keeping `r = L x` in
/// step with the coordinate.
///
/// Stationarity is `s(t) = Σ_i w_i l_i / r_i(t) = u_k`. The root is
/// bracketed by `[0, Σ_{l_i > 0} w_i / u_k]` and found by Newton steps on
/// `1/s(t) − 1/u_k`, which is concave in `t` and nearly linear far from the
/// root. A step leaving the bracket falls back to `t = 0` (once) or
/// bisection.
fn minimise_coordinate(
    lk: ArrayView1<f64>,
    uk: f64,
    w: ArrayView1<f64>,
    r: &mut Array1<f64>,
    xk: f64,
    e: f64,
) -> f64 {
    if uk <= 0.0 {
        return xk;
    }
    let support: f64 = lk
        .iter()
        .zip(w.iter())
        .filter(|&(&lik, &wi)| lik > 0.0 && wi > 0.0)
        .map(|(_, &wi)| wi)
        .sum();
    if support == 0.0 {
        // only the linear term is left, minimised at zero
        r.scaled_add(-xk, &lk);
        return 0.0;
    }

    let mut lo = 0.0;
    let mut hi = support / uk;
    let mut t = xk.min(hi);
    if t != xk {
        r.scaled_add(t - xk, &lk);
    }
    let mut zero_checked = false;

    for _ in 0..MAX_INNER_STEPS {
        let mut s = 0.0;
        let mut h = 0.0;
        for ((&lik, &wi), &ri) in lk.iter().zip(w.iter()).zip(r.iter()) {
            if wi == 0.0 || lik == 0.0 {
                continue;
            }
            let q = wi * lik / ri.max(e);
            s += q;
            h += q * lik / ri.max(e);
        }
        if t == 0.0 {
            zero_checked = true;
            if s <= uk {
                break;
            }
        }
        if (s - uk).abs() <= KKT_TOL * (s + uk) {
            break;
        }
        if s > uk {
            lo = t;
        } else {
            hi = t;
        }
        if hi - lo <= f64::EPSILON * hi {
            break;
        }

        let mut next = if h > 0.0 {
            t + (s - uk) * s / (uk * h)
        } else {
            f64::NAN
        };
        if !(next > lo && next <= hi) {
            next = if lo == 0.0 && !zero_checked {
                0.0
            } else {
                0.5 * (lo + hi)
            };
        }
        r.scaled_add(next - t, &lk);
        t = next;
    }
    t
}

/// One CCD sweep on the least-squares loss given `G = WᵀW` and `Wᵀv`.
pub(crate) fn ccd_ls_solve(
    gram: ArrayView2<f64>,
    wtv: ArrayView1<f64>,
    mut x: Array1<f64>,
    e: f64,
) -> Array1<f64> {
    let mut g = gram.dot(&x) - &wtv;
    for k in 0..x.len() {
        let next = projected_newton(x[k], g[k], gram[[k, k]], e);
        let step = next - x[k];
        if step != 0.0 {
            g.scaled_add(step, &gram.column(k));
            x[k] = next;
        }
    }
    x
}

/// Refine columns `j` of `h` (k×m) by one CCD sweep on the KL loss of
/// `v ≈ w·h`, with `v` dense n×m and `w` n×k.
pub fn ccd_update_factors<S: Data<Elem = f64>>(
    v: &ArrayBase<S, Ix2>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    e: f64,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes("ccd_update_factors", v.dim(), w, h, j)?;
    log::debug!("ccd_update_factors: {} columns, rank {}", j.len(), w.ncols());

    let u = w.sum_axis(Axis(0));
    Ok(update_lanes(h, Axis(1), j, |c| {
        ccd_kl_solve(w.view(), u.view(), v.column(c), h.column(c).to_owned(), 1, e)
    }))
}

/// Sparse counterpart of [`ccd_update_factors`]: each column only visits
/// the rows of `w` where `v` has stored entries.
pub fn ccd_update_factors_sparse(
    v: &CsMat<f64>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    e: f64,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes("ccd_update_factors_sparse", (v.rows(), v.cols()), w, h, j)?;
    log::debug!(
        "ccd_update_factors_sparse: {} columns, nnz {}",
        j.len(),
        v.nnz()
    );

    let v = as_csc(v);
    let u = w.sum_axis(Axis(0));
    Ok(update_lanes(h, Axis(1), j, |c| {
        let (rows, vals) = column_support(&v, c);
        let ws = w.select(Axis(0), &rows);
        ccd_kl_solve(ws.view(), u.view(), vals.view(), h.column(c).to_owned(), 1, e)
    }))
}

/// [`ccd_update_factors`] with the columns split across `num_threads` workers.
pub fn ccd_update_factors_parallel<S: Data<Elem = f64> + Sync>(
    v: &ArrayBase<S, Ix2>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    e: f64,
    num_threads: usize,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes("ccd_update_factors_parallel", v.dim(), w, h, j)?;
    log::debug!(
        "ccd_update_factors_parallel: {} columns on {} threads",
        j.len(),
        num_threads
    );

    let u = w.sum_axis(Axis(0));
    update_lanes_parallel(h, Axis(1), j, num_threads, |c| {
        ccd_kl_solve(w.view(), u.view(), v.column(c), h.column(c).to_owned(), 1, e)
    })
}

/// [`ccd_update_factors_sparse`] with the columns split across workers.
pub fn ccd_update_factors_sparse_parallel(
    v: &CsMat<f64>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    e: f64,
    num_threads: usize,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes(
        "ccd_update_factors_sparse_parallel",
        (v.rows(), v.cols()),
        w,
        h,
        j,
    )?;
    log::debug!(
        "ccd_update_factors_sparse_parallel: {} columns on {} threads",
        j.len(),
        num_threads
    );

    let v = as_csc(v);
    let u = w.sum_axis(Axis(0));
    update_lanes_parallel(h, Axis(1), j, num_threads, |c| {
        let (rows, vals) = column_support(&v, c);
        let ws = w.select(Axis(0), &rows);
        ccd_kl_solve(ws.view(), u.view(), vals.view(), h.column(c).to_owned(), 1, e)
    })
}

/// Refine columns `j` of `h` by one exact CCD sweep on `‖v − w·h‖²`.
pub fn ccd_ls_update_factors<S: Data<Elem = f64>>(
    v: &ArrayBase<S, Ix2>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    e: f64,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes("ccd_ls_update_factors", v.dim(), w, h, j)?;

    let gram = w.t().dot(w);
    Ok(update_lanes(h, Axis(1), j, |c| {
        let wtv = w.t().dot(&v.column(c));
        ccd_ls_solve(gram.view(), wtv.view(), h.column(c).to_owned(), e)
    }))
}

/// Sparse counterpart of [`ccd_ls_update_factors`]; `wᵀv` is accumulated
/// over the stored entries only.
pub fn ccd_ls_update_factors_sparse(
    v: &CsMat<f64>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    e: f64,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes("ccd_ls_update_factors_sparse", (v.rows(), v.cols()), w, h, j)?;

    let v = as_csc(v);
    let gram = w.t().dot(w);
    Ok(update_lanes(h, Axis(1), j, |c| {
        let wtv = sparse_wtv(&v, w, c);
        ccd_ls_solve(gram.view(), wtv.view(), h.column(c).to_owned(), e)
    }))
}

pub fn ccd_ls_update_factors_parallel<S: Data<Elem = f64> + Sync>(
    v: &ArrayBase<S, Ix2>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    e: f64,
    num_threads: usize,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes("ccd_ls_update_factors_parallel", v.dim(), w, h, j)?;

    let gram = w.t().dot(w);
    update_lanes_parallel(h, Axis(1), j, num_threads, |c| {
        let wtv = w.t().dot(&v.column(c));
        ccd_ls_solve(gram.view(), wtv.view(), h.column(c).to_owned(), e)
    })
}

pub fn ccd_ls_update_factors_sparse_parallel(
    v: &CsMat<f64>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    e: f64,
    num_threads: usize,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes(
        "ccd_ls_update_factors_sparse_parallel",
        (v.rows(), v.cols()),
        w,
        h,
        j,
    )?;

    let v = as_csc(v);
    let gram = w.t().dot(w);
    update_lanes_parallel(h, Axis(1), j, num_threads, |c| {
        let wtv = sparse_wtv(&v, w, c);
        ccd_ls_solve(gram.view(), wtv.view(), h.column(c).to_owned(), e)
    })
}

fn sparse_wtv(v: &CsMat<f64>, w: &Array2<f64>, c: usize) -> Array1<f64> {
    let mut wtv = Array1::zeros(w.ncols());
    if let Some(col) = v.outer_view(c) {
        for (i, &x) in col.iter() {
            wtv.scaled_add(x, &w.row(i));
        }
    }
    wtv
}
