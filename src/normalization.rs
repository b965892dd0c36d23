use ndarray::{Array1, Array2, Axis};

/// Scale each column of `l` to sum to one.
///
/// Columns whose sum is (numerically) zero are left as zeros.
pub fn normalize_cols(l: &Array2<f64>) -> Array2<f64> {
    let sums = l.sum_axis(Axis(0));
    let mut out = l.clone();
    for (j, &cs) in sums.iter().enumerate() {
        let inv = if cs.abs() < 1e-30 { 0.0 } else { 1.0 / cs };
        out.column_mut(j).mapv_inplace(|v| v * inv);
    }
    out
}

/// Scale each row of `p` in place to sum to one; all-zero rows stay zero.
pub fn normalize_rows_mut(p: &mut Array2<f64>) {
    for mut row in p.rows_mut() {
        let rs = row.sum();
        let inv = if rs > 0.0 { 1.0 / rs } else { 0.0 };
        row.mapv_inplace(|v| v * inv);
    }
}

/// Column sums of `l`, the exposure vector paired with [`normalize_cols`].
pub fn col_sums(l: &Array2<f64>) -> Array1<f64> {
    l.sum_axis(Axis(0))
}
