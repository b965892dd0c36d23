use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayViewMut1, Data, Ix2};
use sprs::CsMat;

use crate::error::{check_dims, Result};
use crate::matrix::as_csc;

/// Success/failure counts of each feature under each topic, both m×k.
#[derive(Debug, Clone)]
pub struct BinomStats {
    /// counts of feature `j` allocated to topic `k`
    pub a: Array2<f64>,
    /// the remaining counts of feature `j`
    pub b: Array2<f64>,
}

/// Allocate each count `x_ij` across topics in proportion to `l_ik f_jk`.
///
/// `x` is n×m, `f` m×k and `l` n×k. Rows whose expected rate
/// `Σ_k l_ik f_jk` is zero get no allocation, but their counts are still
/// included in the failures.
pub fn binom_stats<S: Data<Elem = f64>>(
    x: &ArrayBase<S, Ix2>,
    f: &Array2<f64>,
    l: &Array2<f64>,
) -> Result<BinomStats> {
    let (n, m) = x.dim();
    let k = l.ncols();
    check_dims("binom_stats: L", (n, k), l.dim())?;
    check_dims("binom_stats: F", (m, k), f.dim())?;

    let mut a = Array2::zeros((m, k));
    let mut totals = Array1::zeros(m);
    for j in 0..m {
        let fj = f.row(j);
        let mut aj = a.row_mut(j);
        for (i, &xij) in x.column(j).iter().enumerate() {
            if xij == 0.0 {
                continue;
            }
            totals[j] += xij;
            allocate(&mut aj, xij, l.row(i), fj);
        }
    }
    Ok(finish(a, &totals))
}

/// [`binom_stats`] for sparse counts; only stored entries are visited.
pub fn binom_stats_sparse(
    x: &CsMat<f64>,
    f: &Array2<f64>,
    l: &Array2<f64>,
) -> Result<BinomStats> {
    let (n, m) = (x.rows(), x.cols());
    let k = l.ncols();
    check_dims("binom_stats_sparse: L", (n, k), l.dim())?;
    check_dims("binom_stats_sparse: F", (m, k), f.dim())?;

    let x = as_csc(x);
    let mut a = Array2::zeros((m, k));
    let mut totals = Array1::zeros(m);
    for (j, col) in x.outer_iterator().enumerate() {
        let fj = f.row(j);
        let mut aj = a.row_mut(j);
        for (i, &xij) in col.iter() {
            totals[j] += xij;
            allocate(&mut aj, xij, l.row(i), fj);
        }
    }
    Ok(finish(a, &totals))
}

fn allocate(
    aj: &mut ArrayViewMut1<f64>,
    xij: f64,
    li: ArrayView1<f64>,
    fj: ArrayView1<f64>,
) {
    let d = li.dot(&fj);
    if d <= 0.0 {
        return;
    }
    let scale = xij / d;
    for ((a, &lik), &fjk) in aj.iter_mut().zip(li.iter()).zip(fj.iter()) {
        *a += scale * lik * fjk;
    }
}

fn finish(a: Array2<f64>, totals: &Array1<f64>) -> BinomStats {
    let mut b = a.clone();
    for (mut row, &t) in b.rows_mut().into_iter().zip(totals.iter()) {
        row.mapv_inplace(|v| (t - v).max(0.0));
    }
    BinomStats { a, b }
}
