//! EM updates for Poisson NMF.
//!
//! With `x ≈ l fᵀ` (`x` n×m, `l` n×k, `f` m×k), row `c` of `f` is the
//! vector of Poisson rates for column `c` of `x`, so refining it is a
//! [`poismixem`](crate::em::poismixem) problem with `l` as the likelihood
//! matrix. The column normalisation of `l` and its column sums are shared
//! by all rows and computed once per call.

use ndarray::{Array2, ArrayBase, Axis, Data, Ix2};
use sprs::CsMat;

use crate::em::mixem::poismixem_solve;
use crate::error::{check_dims, check_indices, Result};
use crate::matrix::{as_csc, column_support};
use crate::normalization::{col_sums, normalize_cols};
use crate::parallel::{update_lanes, update_lanes_parallel};

fn check_pnmf_shapes(
    context: &'static str,
    (n, m): (usize, usize),
    f: &Array2<f64>,
    l: &Array2<f64>,
    j: &[usize],
) -> Result<()> {
    let k = l.ncols();
    check_dims(context, (n, k), l.dim())?;
    check_dims(context, (m, k), f.dim())?;
    check_indices(context, j, m, true)
}

/// Refine rows `j` of `f` by `numiter` EM passes each, for dense `x`.
pub fn pnmfem_update_factors<S: Data<Elem = f64>>(
    x: &ArrayBase<S, Ix2>,
    f: &Array2<f64>,
    l: &Array2<f64>,
    j: &[usize],
    numiter: usize,
) -> Result<Array2<f64>> {
    check_pnmf_shapes("pnmfem_update_factors", x.dim(), f, l, j)?;
    log::debug!(
        "pnmfem_update_factors: {} rows, {} EM passes",
        j.len(),
        numiter
    );

    let l1 = normalize_cols(l);
    let u = col_sums(l);
    Ok(update_lanes(f, Axis(0), j, |c| {
        poismixem_solve(l1.view(), u.view(), x.column(c), f.row(c), numiter)
    }))
}

/// Sparse counterpart of [`pnmfem_update_factors`]: each row of `f` only
/// visits the rows of `l` where column `c` of `x` has stored entries.
pub fn pnmfem_update_factors_sparse(
    x: &CsMat<f64>,
    f: &Array2<f64>,
    l: &Array2<f64>,
    j: &[usize],
    numiter: usize,
) -> Result<Array2<f64>> {
    check_pnmf_shapes("pnmfem_update_factors_sparse", (x.rows(), x.cols()), f, l, j)?;
    log::debug!(
        "pnmfem_update_factors_sparse: {} rows, nnz {}",
        j.len(),
        x.nnz()
    );

    let x = as_csc(x);
    let l1 = normalize_cols(l);
    let u = col_sums(l);
    Ok(update_lanes(f, Axis(0), j, |c| {
        let (rows, vals) = column_support(&x, c);
        let l1c = l1.select(Axis(0), &rows);
        poismixem_solve(l1c.view(), u.view(), vals.view(), f.row(c), numiter)
    }))
}

pub fn pnmfem_update_factors_parallel<S: Data<Elem = f64> + Sync>(
    x: &ArrayBase<S, Ix2>,
    f: &Array2<f64>,
    l: &Array2<f64>,
    j: &[usize],
    numiter: usize,
    num_threads: usize,
) -> Result<Array2<f64>> {
    check_pnmf_shapes("pnmfem_update_factors_parallel", x.dim(), f, l, j)?;
    log::debug!(
        "pnmfem_update_factors_parallel: {} rows on {} threads",
        j.len(),
        num_threads
    );

    let l1 = normalize_cols(l);
    let u = col_sums(l);
    update_lanes_parallel(f, Axis(0), j, num_threads, |c| {
        poismixem_solve(l1.view(), u.view(), x.column(c), f.row(c), numiter)
    })
}

pub fn pnmfem_update_factors_sparse_parallel(
    x: &CsMat<f64>,
    f: &Array2<f64>,
    l: &Array2<f64>,
    j: &[usize],
    numiter: usize,
    num_threads: usize,
) -> Result<Array2<f64>> {
    check_pnmf_shapes(
        "pnmfem_update_factors_sparse_parallel",
        (x.rows(), x.cols()),
        f,
        l,
        j,
    )?;

    let x = as_csc(x);
    let l1 = normalize_cols(l);
    let u = col_sums(l);
    update_lanes_parallel(f, Axis(0), j, num_threads, |c| {
        let (rows, vals) = column_support(&x, c);
        let l1c = l1.select(Axis(0), &rows);
        poismixem_solve(l1c.view(), u.view(), vals.view(), f.row(c), numiter)
    })
}
