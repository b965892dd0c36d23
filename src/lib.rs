//! Numerical kernels for Poisson non-negative matrix factorization and
//! multinomial topic models.
//!
//! Each kernel takes the current factors and the count data and returns a
//! refined copy of one factor, a cost vector or a set of fitted parameters.
//! Nothing is cached between calls, so an outer fitting loop can mix and
//! match kernels freely.
//!
//! * [`cost`]: Frobenius, Poisson and multinomial losses, dense or sparse
//! * [`ratio`]: `x / (AᵀB)` on the stored entries of a sparse matrix
//! * [`update`]: CCD, SCD, EM and multiplicative factor updates, with
//!   parallel variants and the [`FactorUpdater`] trait
//! * [`em`]: mixture EM, two-rate Poisson fits and binomial statistics

pub mod config;
pub mod cost;
pub mod em;
pub mod error;
pub mod matrix;
pub mod normalization;
pub mod parallel;
pub mod ratio;
pub mod update;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenience
pub use config::KernelConfig;
pub use cost::{cost, cost_sparse, evaluate_cost, Loss};
pub use em::{
    binom_stats, binom_stats_sparse, fit_poisson_em, fit_univar_poisson_models_em, mixem,
    mixture_loglik, poismixem, poismixem2, poismixem3, poisson_loglik, poisson_mixture_objective,
    BinomStats, PoissonFit, UnivarPoissonFits,
};
pub use error::{NmfError, Result};
pub use matrix::CountMatrix;
pub use ratio::{x_over_crossprod, x_over_crossprod_sparse};
pub use update::{
    betanmf_update_factors, betanmf_update_factors_sparse, ccd_kl_update, ccd_kl_update2,
    ccd_ls_update_factors, ccd_ls_update_factors_parallel, ccd_ls_update_factors_sparse,
    ccd_ls_update_factors_sparse_parallel, ccd_update_factors, ccd_update_factors_parallel,
    ccd_update_factors_sparse, ccd_update_factors_sparse_parallel, pnmfem_update_factors,
    pnmfem_update_factors_parallel, pnmfem_update_factors_sparse,
    pnmfem_update_factors_sparse_parallel, scd_kl_update, scd_kl_update2, scd_update_factors,
    scd_update_factors_parallel, scd_update_factors_sparse, scd_update_factors_sparse_parallel,
    BetaNmf, Ccd, CcdLeastSquares, FactorUpdater, PnmfEm, Scd,
};
