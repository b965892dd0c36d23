//! Per-column loss of a factorization `X ≈ A·B`.
//!
//! The sparse evaluator never touches the zero entries of `X`. The Poisson
//! loss splits as
//!
//! ```text
//! Σ_i [x log(x/m) − x + m] = Σ_i m_i + Σ_{x_ij > 0} [x log(x/m) − x]
//! ```
//!
//! and `Σ_i m_i = colsum(A)·B[:, j]`. The Frobenius loss splits as
//!
//! ```text
//! Σ_i (x − m)² = B[:, j]ᵀ (AᵀA) B[:, j] + Σ_{x_ij ≠ 0} (x² − 2 x m)
//! ```

use ndarray::{Array1, Array2, ArrayBase, ArrayView1, Axis, Data, Ix2};
use serde::{Deserialize, Serialize};
use sprs::CsMat;

use crate::error::{check_dims, check_floor, Result};
use crate::matrix::{as_csc, CountMatrix};

/// Elementwise divergence between the data and the factor product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Loss {
    /// Squared error
    Frobenius,
    /// Generalized KL divergence (Poisson deviance up to a factor of 2)
    Poisson,
    /// Multinomial negative log-likelihood, up to a constant
    Multinom,
}

fn check_cost_shapes(
    context: &'static str,
    (n, m): (usize, usize),
    a: &Array2<f64>,
    b: &Array2<f64>,
) -> Result<()> {
    let k = a.ncols();
    check_dims(context, (n, k), a.dim())?;
    check_dims(context, (k, m), b.dim())
}

#[inline]
fn poisson_term(x: f64, m: f64, e: f64) -> f64 {
    x * (x / (m + e)).ln() - x
}

/// Loss of each column of dense `x` (n×m) against `a·b` (n×k times k×m).
pub fn cost<S: Data<Elem = f64>>(
    x: &ArrayBase<S, Ix2>,
    a: &Array2<f64>,
    b: &Array2<f64>,
    e: f64,
    loss: Loss,
) -> Result<Array1<f64>> {
    check_floor(e)?;
    check_cost_shapes("cost", x.dim(), a, b)?;

    let ab = a.dot(b);
    let f = x
        .axis_iter(Axis(1))
        .zip(ab.axis_iter(Axis(1)))
        .map(|(xj, mj)| match loss {
            Loss::Frobenius => xj
                .iter()
                .zip(mj.iter())
                .map(|(&x, &m)| (x - m) * (x - m))
                .sum::<f64>(),
            Loss::Poisson => {
                let explicit: f64 = xj
                    .iter()
                    .zip(mj.iter())
                    .filter(|(&x, _)| x > 0.0)
                    .map(|(&x, &m)| poisson_term(x, m, e))
                    .sum();
                mj.sum() + explicit
            }
            Loss::Multinom => -xj
                .iter()
                .zip(mj.iter())
                .filter(|(&x, _)| x > 0.0)
                .map(|(&x, &m)| x * (m + e).ln())
                .sum::<f64>(),
        })
        .collect();
    Ok(f)
}

/// Sparse counterpart of [`cost`]; cost is O(nnz·k + m·k²).
pub fn cost_sparse(
    x: &CsMat<f64>,
    a: &Array2<f64>,
    b: &Array2<f64>,
    e: f64,
    loss: Loss,
) -> Result<Array1<f64>> {
    check_floor(e)?;
    check_cost_shapes("cost_sparse", (x.rows(), x.cols()), a, b)?;

    let x = as_csc(x);
    let m = x.cols();
    let a_sums = a.sum_axis(Axis(0));
    let gram = match loss {
        Loss::Frobenius => Some(a.t().dot(a)),
        _ => None,
    };

    let mut f = Array1::zeros(m);
    for j in 0..m {
        let bj = b.column(j);
        let fitted = |i: usize| a.row(i).dot(&bj);
        let col = x.outer_view(j);
        let entries = col.iter().flat_map(|c| c.iter());

        f[j] = match loss {
            Loss::Frobenius => {
                let implicit = quadratic_form(gram.as_ref(), bj);
                let explicit: f64 = entries
                    .map(|(i, &x)| x * x - 2.0 * x * fitted(i))
                    .sum();
                implicit + explicit
            }
            Loss::Poisson => {
                let explicit: f64 = entries
                    .filter(|(_, &x)| x > 0.0)
                    .map(|(i, &x)| poisson_term(x, fitted(i), e))
                    .sum();
                a_sums.dot(&bj) + explicit
            }
            Loss::Multinom => -entries
                .filter(|(_, &x)| x > 0.0)
                .map(|(i, &x)| x * (fitted(i) + e).ln())
                .sum::<f64>(),
        };
    }
    Ok(f)
}

fn quadratic_form(gram: Option<&Array2<f64>>, v: ArrayView1<f64>) -> f64 {
    gram.map_or(0.0, |g| v.dot(&g.dot(&v)))
}

/// Dispatch on the data representation.
pub fn evaluate_cost(
    x: CountMatrix<'_>,
    a: &Array2<f64>,
    b: &Array2<f64>,
    e: f64,
    loss: Loss,
) -> Result<Array1<f64>> {
    match x {
        CountMatrix::Dense(x) => cost(&x, a, b, e, loss),
        CountMatrix::Sparse(x) => cost_sparse(x, a, b, e, loss),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_close, make_count_matrix, seeded_factors};
    use ndarray::array;

    #[test]
    fn test_frobenius_by_hand() {
        let x = array![[1.0, 0.0], [2.0, 3.0]];
        let a = array![[1.0], [1.0]];
        let b = array![[1.0, 1.0]];
        let f = cost(&x, &a, &b, 0.0, Loss::Frobenius).unwrap();
        assert_eq!(f, array![1.0, 5.0]);
    }

    #[test]
    fn test_poisson_zero_counts_contribute_fitted_value() {
        let x = array![[0.0], [0.0]];
        let a = array![[2.0], [0.5]];
        let b = array![[1.0]];
        let f = cost(&x, &a, &b, 1e-15, Loss::Poisson).unwrap();
        assert_close(f[0], 2.5, 1e-12);
    }

    #[test]
    fn test_poisson_zero_at_exact_fit() {
        let a = array![[1.0, 2.0], [0.5, 1.0], [3.0, 0.0]];
        let b = array![[1.0, 2.0, 0.5], [2.0, 0.0, 1.0]];
        let x = a.dot(&b);
        let f = cost(&x, &a, &b, 0.0, Loss::Poisson).unwrap();
        for &v in f.iter() {
            assert!(v.abs() < 1e-12, "exact fit should have zero loss: {}", v);
        }
    }

    #[test]
    fn test_dense_and_sparse_agree() {
        let x = make_count_matrix();
        let (a, b) = seeded_factors(x.nrows(), x.ncols(), 3, 7);
        let xs = CsMat::csc_from_dense(x.view(), 0.0);

        for loss in [Loss::Frobenius, Loss::Poisson, Loss::Multinom] {
            let dense = cost(&x, &a, &b, 1e-15, loss).unwrap();
            let sparse = cost_sparse(&xs, &a, &b, 1e-15, loss).unwrap();
            for (d, s) in dense.iter().zip(sparse.iter()) {
                assert_close(*d, *s, 1e-9);
            }
        }
    }

    #[test]
    fn test_sparse_accepts_csr() {
        let x = make_count_matrix();
        let (a, b) = seeded_factors(x.nrows(), x.ncols(), 2, 3);
        let csc = CsMat::csc_from_dense(x.view(), 0.0);
        let csr = csc.to_csr();
        let f1 = cost_sparse(&csc, &a, &b, 1e-15, Loss::Poisson).unwrap();
        let f2 = cost_sparse(&csr, &a, &b, 1e-15, Loss::Poisson).unwrap();
        assert_eq!(f1, f2);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let x = Array2::<f64>::zeros((4, 3));
        let a = Array2::<f64>::ones((4, 2));
        let b = Array2::<f64>::ones((2, 4));
        assert!(cost(&x, &a, &b, 1e-15, Loss::Poisson).is_err());
        let a = Array2::<f64>::ones((3, 2));
        let b = Array2::<f64>::ones((2, 3));
        assert!(cost(&x, &a, &b, 1e-15, Loss::Poisson).is_err());
    }
}
