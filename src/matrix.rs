//! Data matrix representations accepted by the kernels.
//!
//! Dense data arrives as an `ndarray` view, sparse data as an `sprs` matrix.
//! Kernels walk the data one column at a time, so sparse inputs are used in
//! compressed sparse column (CSC) form.

use std::borrow::Cow;

use ndarray::{Array1, Array2, ArrayView2};
use sprs::CsMat;

/// Count data in either representation
#[derive(Debug, Clone, Copy)]
pub enum CountMatrix<'a> {
    Dense(ArrayView2<'a, f64>),
    Sparse(&'a CsMat<f64>),
}

impl<'a> CountMatrix<'a> {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            CountMatrix::Dense(x) => x.dim(),
            CountMatrix::Sparse(x) => (x.rows(), x.cols()),
        }
    }

    pub fn nrows(&self) -> usize {
        self.shape().0
    }

    pub fn ncols(&self) -> usize {
        self.shape().1
    }

    /// Number of stored entries (all entries for dense data)
    pub fn nnz(&self) -> usize {
        match self {
            CountMatrix::Dense(x) => x.len(),
            CountMatrix::Sparse(x) => x.nnz(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, CountMatrix::Sparse(_))
    }
}

impl<'a> From<&'a Array2<f64>> for CountMatrix<'a> {
    fn from(x: &'a Array2<f64>) -> Self {
        CountMatrix::Dense(x.view())
    }
}

impl<'a> From<ArrayView2<'a, f64>> for CountMatrix<'a> {
    fn from(x: ArrayView2<'a, f64>) -> Self {
        CountMatrix::Dense(x)
    }
}

impl<'a> From<&'a CsMat<f64>> for CountMatrix<'a> {
    fn from(x: &'a CsMat<f64>) -> Self {
        CountMatrix::Sparse(x)
    }
}

/// Borrow `x` when it is already CSC, otherwise convert once.
pub fn as_csc(x: &CsMat<f64>) -> Cow<'_, CsMat<f64>> {
    if x.is_csc() {
        Cow::Borrowed(x)
    } else {
        Cow::Owned(x.to_csc())
    }
}

/// Row indices and values stored in column `j` of a CSC matrix.
pub(crate) fn column_support(x: &CsMat<f64>, j: usize) -> (Vec<usize>, Array1<f64>) {
    match x.outer_view(j) {
        Some(col) => (
            col.indices().to_vec(),
            Array1::from(col.data().to_vec()),
        ),
        None => (Vec::new(), Array1::zeros(0)),
    }
}

/// Coordinate triples `(i, j, x)` of the stored entries, in storage order.
pub fn to_triplets(x: &CsMat<f64>) -> (Vec<usize>, Vec<usize>, Vec<f64>) {
    let nnz = x.nnz();
    let mut rows = Vec::with_capacity(nnz);
    let mut cols = Vec::with_capacity(nnz);
    let mut vals = Vec::with_capacity(nnz);
    for (&v, (i, j)) in x.iter() {
        rows.push(i);
        cols.push(j);
        vals.push(v);
    }
    (rows, cols, vals)
}

/// Column sums of the stored entries, without densifying.
pub fn sparse_col_sums(x: &CsMat<f64>) -> Array1<f64> {
    let mut sums = Array1::zeros(x.cols());
    for (&v, (_, j)) in x.iter() {
        sums[j] += v;
    }
    sums
}
