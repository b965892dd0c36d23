//! Two-rate univariate Poisson models fitted by EM.
//!
//! Each observation is a count `x_i` with size factor `s_i` and membership
//! `q_i ∈ [0, 1]`:
//!
//! ```text
//! x_i ~ Poisson(s_i · ((1 − q_i) f0 + q_i f1))
//! ```
//!
//! The count is split into a latent background part (rate `f0`) and a
//! foreground part (rate `f1`); the E-step computes the expected
//! foreground count and the M-step has a closed form.

use std::borrow::Cow;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use sprs::CsMat;
use statrs::function::gamma::ln_gamma;

use crate::error::{check_dims, check_floor, check_len, Result};
use crate::matrix::{as_csc, column_support, sparse_col_sums, CountMatrix};

/// Fitted rates and the log-likelihood at those rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoissonFit {
    pub f0: f64,
    pub f1: f64,
    pub loglik: f64,
}

/// Per (feature, topic) fits from [`fit_univar_poisson_models_em`]; each
/// matrix is m×k.
#[derive(Debug, Clone)]
pub struct UnivarPoissonFits {
    pub f0: Array2<f64>,
    pub f1: Array2<f64>,
    pub loglik: Array2<f64>,
}

/// Run exactly `numiter` EM iterations from `(f0, f1)`.
///
/// Both rates are kept at or above `e`, and so are the denominators of the
/// updates, so a group with no exposure (`Σ s_i q_i = 0`) falls back to the
/// floor instead of producing NaN.
pub fn fit_poisson_em(
    x: &Array1<f64>,
    s: &Array1<f64>,
    q: &Array1<f64>,
    f0: f64,
    f1: f64,
    e: f64,
    numiter: usize,
) -> Result<PoissonFit> {
    check_floor(e)?;
    check_len("fit_poisson_em: s", x.len(), s.len())?;
    check_len("fit_poisson_em: q", x.len(), q.len())?;
    let (fit, _) = poisson_em_solve(x.view(), s.view(), q.view(), f0, f1, e, numiter);
    Ok(fit)
}

/// Returns the fit and `max(|Δf0|, |Δf1|)` of the last iteration (zero when
/// `numiter == 0`).

fn poisson_em_solve(
    x: ArrayView1<f64>,
    s: ArrayView1<f64>,
    q: ArrayView1<f64>,
    f0: f64,
    f1: f64,
    e: f64,
    numiter: usize,
) -> (PoissonFit, f64) {
    let mut f0 = f0.max(e);
    let mut f1 = f1.max(e);

    // exposures of the two components do not change across iterations
    let a: f64 = s.iter().zip(q.iter()).map(|(&si, &qi)| si * (1.0 - qi)).sum();
    let b: f64 = s.iter().zip(q.iter()).map(|(&si, &qi)| si * qi).sum();
    let total = x.sum();
    let mut change = 0.0;

    for _ in 0..numiter {
        let z: f64 = x
            .iter()
            .zip(q.iter())
            .filter(|&(&xi, _)| xi != 0.0)
            .map(|(&xi, &qi)| xi * qi * f1 / ((1.0 - qi) * f0 + qi * f1).max(e))
            .sum();
        let next0 = ((total - z) / a.max(e)).max(e);
        let next1 = (z / b.max(e)).max(e);
        change = (next0 - f0).abs().max((next1 - f1).abs());
        f0 = next0;
        f1 = next1;
    }

    let fit = PoissonFit {
        f0,
        f1,
        loglik: loglik_inner(x, s, q, f0, f1, e),
    };
    (fit, change)
}

/// Poisson log-likelihood `Σ x ln(μ + e) − μ − ln Γ(x + 1)` with
/// `μ_i = s_i((1 − q_i) f0 + q_i f1)`.
pub fn poisson_loglik(
    x: &Array1<f64>,
    s: &Array1<f64>,
    q: &Array1<f64>,
    f0: f64,
    f1: f64,
    e: f64,
) -> Result<f64> {
    check_len("poisson_loglik: s", x.len(), s.len())?;
    check_len("poisson_loglik: q", x.len(), q.len())?;
    Ok(loglik_inner(x.view(), s.view(), q.view(), f0, f1, e))
}

fn loglik_inner(
    x: ArrayView1<f64>,
    s: ArrayView1<f64>,
    q: ArrayView1<f64>,
    f0: f64,
    f1: f64,
    e: f64,
) -> f64 {
    x.iter()
        .zip(s.iter())
        .zip(q.iter())
        .map(|((&xi, &si), &qi)| {
            let mu = si * ((1.0 - qi) * f0 + qi * f1);
            xi * (mu + e).ln() - mu - ln_gamma(xi + 1.0)
        })
        .sum()
}

/// Fit one two-rate model per pair (column `j` of `x`, column `k` of `l`),
/// with `l[:, k]` as the membership `q`.
///
/// `x` is n×m, `l` n×k and `s` has length n. Each fit starts from
/// `f0 = f1 = Σ_i x_ij / Σ_i s_i`. Sparse data is converted to CSC once and
/// each column is expanded from its stored entries only.
///
/// With `verbose`, one `log::info!` line per column of `x` reports the range
/// of log-likelihoods over the k topics and the largest rate change in the
/// final EM iteration, which shows whether `numiter` was enough.
pub fn fit_univar_poisson_models_em(
    x: CountMatrix<'_>,
    l: &Array2<f64>,
    s: &Array1<f64>,
    e: f64,
    numiter: usize,
    verbose: bool,
) -> Result<UnivarPoissonFits> {
    check_floor(e)?;
    let (n, m) = x.shape();
    let k = l.ncols();
    check_dims("fit_univar_poisson_models_em: L", (n, k), l.dim())?;
    check_len("fit_univar_poisson_models_em: s", n, s.len())?;

    let mut fits = UnivarPoissonFits {
        f0: Array2::zeros((m, k)),
        f1: Array2::zeros((m, k)),
        loglik: Array2::zeros((m, k)),
    };
    let total_s = s.sum().max(e);
    let columns = FeatureColumns::new(x);
    let col_totals = columns.totals();

    for j in 0..m {
        let xj = columns.column(j);
        let init = col_totals[j] / total_s;

        let mut worst_change: f64 = 0.0;
        for t in 0..k {
            let (fit, change) =
                poisson_em_solve(xj.view(), s.view(), l.column(t), init, init, e, numiter);
            fits.f0[[j, t]] = fit.f0;
            fits.f1[[j, t]] = fit.f1;
            fits.loglik[[j, t]] = fit.loglik;
            worst_change = worst_change.max(change);
        }

        if verbose {
            let row = fits.loglik.row(j);
            let lo = row.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            log::info!(
                "fit_univar_poisson_models_em: feature {}/{}: loglik in [{:.4}, {:.4}], last EM change {:.3e}",
                j + 1,
                m,
                lo,
                hi,
                worst_change
            );
        }
    }
    Ok(fits)
}

/// Column access for the per-feature loop; sparse data is held in CSC form.
enum FeatureColumns<'a> {
    Dense(ArrayView2<'a, f64>),
    Sparse(Cow<'a, CsMat<f64>>),
}

impl<'a> FeatureColumns<'a> {
    fn new(x: CountMatrix<'a>) -> Self {
        match x {
            CountMatrix::Dense(v) => FeatureColumns::Dense(v),
            CountMatrix::Sparse(v) => FeatureColumns::Sparse(as_csc(v)),
        }
    }

    fn totals(&self) -> Array1<f64> {
        match self {
            FeatureColumns::Dense(v) => v.sum_axis(Axis(0)),
            FeatureColumns::Sparse(v) => sparse_col_sums(v),
        }
    }

    fn column(&self, j: usize) -> Array1<f64> {
        match self {
            FeatureColumns::Dense(v) => v.column(j).to_owned(),
            FeatureColumns::Sparse(v) => {
                let mut col = Array1::zeros(v.rows());
                let (rows, vals) = column_support(v, j);
                for (&i, &value) in rows.iter().zip(vals.iter()) {
                    col[i] += value;
                }
                col
            }
        }
    }
}
