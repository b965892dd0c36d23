//! EM for mixture proportions.
//!
//! [`mixem`] maximises the weighted mixture log-likelihood
//!
//! ```text
//! Σ_i w_i log(Σ_k L_ik x_k),   x on the simplex
//! ```
//!
//! and the `poismixem*` family maximises the Poisson objective
//!
//! ```text
//! Σ_i w_i log(Σ_k L_ik x_k) − Σ_k u_k x_k,   x ≥ 0,  u = colsum(L)
//! ```
//!
//! by mapping it onto the simplex problem: with `L1 = L / u` (column
//! normalised) and `y = x ∘ u / Σ(x ∘ u)`, the optimum is
//! `x = y · Σw / u`.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{check_indices, check_len, Result};
use crate::normalization::{col_sums, normalize_cols, normalize_rows_mut};

/// `numiter` EM passes for the mixture weights `x` (length k) given the
/// component likelihoods `l` (n×k) and observation weights `w` (length n).
pub fn mixem(
    l: &Array2<f64>,
    w: &Array1<f64>,
    x0: &Array1<f64>,
    numiter: usize,
) -> Result<Array1<f64>> {
    check_len("mixem: w", l.nrows(), w.len())?;
    check_len("mixem: x0", l.ncols(), x0.len())?;
    Ok(mixem_solve(l.view(), w.view(), x0.to_owned(), numiter))
}

pub(crate) fn mixem_solve(
    l: ArrayView2<f64>,
    w: ArrayView1<f64>,
    mut x: Array1<f64>,
    numiter: usize,
) -> Array1<f64> {
    let sw = w.sum();
    if sw <= 0.0 {
        return x;
    }
    for _ in 0..numiter {
        // E-step: responsibilities; rows with zero likelihood stay zero
        let mut p = &l * &x;
        normalize_rows_mut(&mut p);
        // M-step
        x = p.t().dot(&w) / sw;
    }
    x
}

/// Fit Poisson rates `x ≥ 0` for counts `w` under `w_i ~ Poisson(Σ_k L_ik x_k)`.
pub fn poismixem(
    l: &Array2<f64>,
    w: &Array1<f64>,
    x0: &Array1<f64>,
    numiter: usize,
) -> Result<Array1<f64>> {
    check_len("poismixem: w", l.nrows(), w.len())?;
    check_len("poismixem: x0", l.ncols(), x0.len())?;
    let u = col_sums(l);
    let l1 = normalize_cols(l);
    Ok(poismixem_solve(
        l1.view(),
        u.view(),
        w.view(),
        x0.view(),
        numiter,
    ))
}

/// [`poismixem`] for a column-normalised `l1` with the column sums `u`
/// supplied separately.
pub fn poismixem2(
    l1: &Array2<f64>,
    w: &Array1<f64>,
    u: &Array1<f64>,
    x0: &Array1<f64>,
    numiter: usize,
) -> Result<Array1<f64>> {
    check_len("poismixem2: w", l1.nrows(), w.len())?;
    check_len("poismixem2: u", l1.ncols(), u.len())?;
    check_len("poismixem2: x0", l1.ncols(), x0.len())?;
    Ok(poismixem_solve(
        l1.view(),
        u.view(),
        w.view(),
        x0.view(),
        numiter,
    ))
}

/// [`poismixem2`] restricted to the rows `i` of `l1`; `w[t]` is the count
/// observed for row `i[t]`. Rows outside `i` are treated as zero counts, so
/// `u` must still be the column sums over all rows.
pub fn poismixem3(
    l1: &Array2<f64>,
    w: &Array1<f64>,
    u: &Array1<f64>,
    i: &[usize],
    x0: &Array1<f64>,
    numiter: usize,
) -> Result<Array1<f64>> {
    check_len("poismixem3: w", i.len(), w.len())?;
    check_len("poismixem3: u", l1.ncols(), u.len())?;
    check_len("poismixem3: x0", l1.ncols(), x0.len())?;
    check_indices("poismixem3: i", i, l1.nrows(), false)?;
    let rows = l1.select(Axis(0), i);
    Ok(poismixem_solve(
        rows.view(),
        u.view(),
        w.view(),
        x0.view(),
        numiter,
    ))
}

pub(crate) fn poismixem_solve(
    l1: ArrayView2<f64>,
    u: ArrayView1<f64>,
    w: ArrayView1<f64>,
    x0: ArrayView1<f64>,
    numiter: usize,
) -> Array1<f64> {
    let mut y = &x0 * &u;
    let sy = y.sum();
    if sy > 0.0 {
        y /= sy;
    }
    let y = mixem_solve(l1, w, y, numiter);
    let sw = w.sum();
    y.iter()
        .zip(u.iter())
        .map(|(&yk, &uk)| if uk > 0.0 { yk * sw / uk } else { 0.0 })
        .collect()
}

/// `Σ_i w_i log(Σ_k L_ik x_k)`, skipping rows with zero weight.
pub fn mixture_loglik(l: &Array2<f64>, w: &Array1<f64>, x: &Array1<f64>) -> Result<f64> {
    check_len("mixture_loglik: w", l.nrows(), w.len())?;
    check_len("mixture_loglik: x", l.ncols(), x.len())?;
    Ok(l
        .dot(x)
        .iter()
        .zip(w.iter())
        .filter(|&(_, &wi)| wi != 0.0)
        .map(|(&p, &wi)| wi * p.ln())
        .sum())
}

/// The objective maximised by [`poismixem`]:
/// `Σ_i w_i log(Σ_k L_ik x_k) − Σ_k u_k x_k`.
pub fn poisson_mixture_objective(
    l: &Array2<f64>,
    w: &Array1<f64>,
    x: &Array1<f64>,
) -> Result<f64> {
    let ll = mixture_loglik(l, w, x)?;
    Ok(ll - col_sums(l).dot(x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_close, seeded_factors};
    use ndarray::array;

    fn fixture() -> (Array2<f64>, Array1<f64>) {
        let (l, _) = seeded_factors(12, 1, 3, 17);
        let w = array![3.0, 0.0, 1.0, 5.0, 2.0, 0.0, 4.0, 1.0, 1.0, 0.0, 6.0, 2.0];
        (l, w)
    }

    #[test]
    fn test_mixem_monotone_and_on_simplex() {
        let (l, w) = fixture();
        let mut x = array![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];
        let mut prev = mixture_loglik(&l, &w, &x).unwrap();
        for _ in 0..20 {
            x = mixem(&l, &w, &x, 1).unwrap();
            let ll = mixture_loglik(&l, &w, &x).unwrap();
            assert!(ll >= prev - 1e-12, "loglik went down: {} -> {}", prev, ll);
            assert_close(x.sum(), 1.0, 1e-12);
            assert!(x.iter().all(|&v| v >= 0.0));
            prev = ll;
        }
    }

    #[test]
    fn test_mixem_iteration_count_is_exact() {
        let (l, w) = fixture();
        let x0 = array![0.2, 0.3, 0.5];
        assert_eq!(mixem(&l, &w, &x0, 0).unwrap(), x0);
        let twice = mixem(&l, &w, &mixem(&l, &w, &x0, 1).unwrap(), 1).unwrap();
        let direct = mixem(&l, &w, &x0, 2).unwrap();
        for k in 0..3 {
            assert_close(twice[k], direct[k], 1e-14);
        }
    }

    #[test]
    fn test_mixem_zero_weights_return_input() {
        let (l, _) = fixture();
        let x0 = array![0.2, 0.3, 0.5];
        assert_eq!(mixem(&l, &Array1::zeros(12), &x0, 5).unwrap(), x0);
    }

    #[test]
    fn test_mixem_skips_zero_likelihood_rows() {
        let l = array![[1.0, 0.0], [0.0, 0.0], [0.0, 1.0]];
        let w = array![1.0, 2.0, 1.0];
        let x = mixem(&l, &w, &array![0.5, 0.5], 1).unwrap();
        assert_eq!(x, array![0.25, 0.25]);
    }

    #[test]
    fn test_poismixem_monotone() {
        let (l, w) = fixture();
        let mut x = array![1.0, 1.0, 1.0];
        let mut prev = poisson_mixture_objective(&l, &w, &x).unwrap();
        for _ in 0..20 {
            x = poismixem(&l, &w, &x, 1).unwrap();
            let obj = poisson_mixture_objective(&l, &w, &x).unwrap();
            assert!(obj >= prev - 1e-10, "objective went down: {} -> {}", prev, obj);
            prev = obj;
        }
        // at a fixed point the expected total count equals the observed one
        let u = col_sums(&l);
        assert_close(u.dot(&x), w.sum(), 1e-10);
    }

    #[test]
    fn test_poismixem_variants_agree() {
        let (l, w) = fixture();
        let x0 = array![0.5, 1.0, 2.0];
        let u = col_sums(&l);
        let l1 = normalize_cols(&l);

        let a = poismixem(&l, &w, &x0, 7).unwrap();
        let b = poismixem2(&l1, &w, &u, &x0, 7).unwrap();
        assert_eq!(a, b);

        let rows: Vec<usize> = (0..w.len()).filter(|&r| w[r] > 0.0).collect();
        let wr = w.select(Axis(0), &rows);
        let c = poismixem3(&l1, &wr, &u, &rows, &x0, 7).unwrap();
        for k in 0..3 {
            assert_close(a[k], c[k], 1e-12);
        }
    }

    #[test]
    fn test_poismixem_zero_exposure_component() {
        let l = array![[1.0, 0.0], [2.0, 0.0]];
        let x = poismixem(&l, &array![3.0, 3.0], &array![1.0, 1.0], 10).unwrap();
        assert_eq!(x[1], 0.0);
        assert_close(x[0], 2.0, 1e-12);
    }

    #[test]
    fn test_poismixem3_rejects_bad_rows() {
        let (l, _) = fixture();
        let u = col_sums(&l);
        let x0 = array![1.0, 1.0, 1.0];
        assert!(poismixem3(&l, &array![1.0], &u, &[12], &x0, 1).is_err());
        assert!(poismixem3(&l, &array![1.0, 2.0], &u, &[0], &x0, 1).is_err());
    }
}
