//! Multiplicative KL updates (Lee & Seung 2001).
//!
//! For the selected columns `J` of `h`:
//!
//! ```text
//! h[:, J] ← h[:, J] ∘ (wᵀ (v[:, J] / (w h[:, J]))) / colsum(w)
//! ```

use ndarray::{Array2, ArrayBase, Axis, Data, Ix2, Zip};
use sprs::CsMat;

use super::check_update_shapes;
use crate::error::{check_floor, Result};
use crate::matrix::{as_csc, column_support};
use crate::ratio::x_over_crossprod;

/// One multiplicative step on columns `j` of `h` (k×m) for dense `v` (n×m).
pub fn betanmf_update_factors<S: Data<Elem = f64>>(
    v: &ArrayBase<S, Ix2>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    e: f64,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes("betanmf_update_factors", v.dim(), w, h, j)?;
    log::debug!("betanmf_update_factors: {} columns", j.len());

    let hj = h.select(Axis(1), j);
    let wh = w.dot(&hj);
    let mut ratio = v.select(Axis(1), j);
    Zip::from(&mut ratio).and(&wh).for_each(|r, &d| {
        *r /= d.max(e);
    });
    let numer = w.t().dot(&ratio);
    Ok(scatter_update(h, &hj, &numer, w, j, e))
}

/// Sparse counterpart of [`betanmf_update_factors`]; the ratio is only
/// formed on the stored entries of the selected columns.
pub fn betanmf_update_factors_sparse(
    v: &CsMat<f64>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    e: f64,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes(
        "betanmf_update_factors_sparse",
        (v.rows(), v.cols()),
        w,
        h,
        j,
    )?;

    let v = as_csc(v);
    let hj = h.select(Axis(1), j);

    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut vals = Vec::new();
    for (t, &c) in j.iter().enumerate() {
        let (r, x) = column_support(&v, c);
        cols.extend(std::iter::repeat(t).take(r.len()));
        rows.extend(r);
        vals.extend(x.iter().copied());
    }
    log::debug!(
        "betanmf_update_factors_sparse: {} columns, {} entries",
        j.len(),
        vals.len()
    );

    let wt = w.t().to_owned();
    let ratio = x_over_crossprod(&rows, &cols, &vals, &wt, &hj, e)?;

    let mut numer = Array2::zeros(hj.dim());
    for ((&i, &t), &r) in rows.iter().zip(&cols).zip(ratio.iter()) {
        numer.column_mut(t).scaled_add(r, &w.row(i));
    }
    Ok(scatter_update(h, &hj, &numer, w, j, e))
}

fn scatter_update(
    h: &Array2<f64>,
    hj: &Array2<f64>,
    numer: &Array2<f64>,
    w: &Array2<f64>,
    j: &[usize],
    e: f64,
) -> Array2<f64> {
    let u = w.sum_axis(Axis(0));
    let mut out = h.clone();
    for (t, &c) in j.iter().enumerate() {
        Zip::from(out.column_mut(c))
            .and(hj.column(t))
            .and(numer.column(t))
            .and(&u)
            .for_each(|o, &hk, &nk, &uk| {
                *o = hk * nk / uk.max(e);
            });
    }
    out
}
