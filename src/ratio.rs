//! `x / (AᵀB)` evaluated only on the support of a sparse matrix.

use ndarray::{Array1, Array2};
use sprs::{CsMat, TriMat};

use crate::error::{check_floor, check_indices, check_len, NmfError, Result};
use crate::matrix::to_triplets;

/// For each triple `(i[t], j[t], x[t])` returns
/// `x[t] / max(dot(a[:, i[t]], b[:, j[t]]), e)`.
///
/// `a` is k×n and `b` is k×m, so the denominator is entry `(i, j)` of
/// `crossprod(a, b) = aᵀb`. Only the requested entries are formed; the
/// output is aligned with the input triples and does not depend on their
/// order.
pub fn x_over_crossprod(
    i: &[usize],
    j: &[usize],
    x: &[f64],
    a: &Array2<f64>,
    b: &Array2<f64>,
    e: f64,
) -> Result<Array1<f64>> {
    check_floor(e)?;
    check_len("x_over_crossprod: j", i.len(), j.len())?;
    check_len("x_over_crossprod: x", i.len(), x.len())?;
    if a.nrows() != b.nrows() {
        return Err(NmfError::DimensionMismatch {
            context: "x_over_crossprod: B",
            expected: (a.nrows(), b.ncols()),
            found: b.dim(),
        });
    }
    check_indices("x_over_crossprod: i", i, a.ncols(), false)?;
    check_indices("x_over_crossprod: j", j, b.ncols(), false)?;

    let y = i
        .iter()
        .zip(j)
        .zip(x)
        .map(|((&it, &jt), &xt)| {
            let d = a.column(it).dot(&b.column(jt));
            xt / d.max(e)
        })
        .collect();
    Ok(y)
}

/// Same ratio returned as a sparse matrix with the structure of `x`.
///
/// `x` is n×m, `a` is k×n and `b` is k×m.
pub fn x_over_crossprod_sparse(
    x: &CsMat<f64>,
    a: &Array2<f64>,
    b: &Array2<f64>,
    e: f64,
) -> Result<CsMat<f64>> {
    if a.ncols() != x.rows() || b.ncols() != x.cols() {
        return Err(NmfError::DimensionMismatch {
            context: "x_over_crossprod_sparse",
            expected: (x.rows(), x.cols()),
            found: (a.ncols(), b.ncols()),
        });
    }
    let (rows, cols, vals) = to_triplets(x);
    let y = x_over_crossprod(&rows, &cols, &vals, a, b, e)?;

    let mut tri = TriMat::with_capacity((x.rows(), x.cols()), rows.len());
    for ((&i, &j), &v) in rows.iter().zip(&cols).zip(y.iter()) {
        tri.add_triplet(i, j, v);
    }
    Ok(tri.to_csc())
}
