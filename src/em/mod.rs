//! Expectation-maximisation solvers.
//!
//! * [`mixem`]: mixture weights and their Poisson-rate reparameterisation
//! * [`poisson`]: two-rate univariate Poisson models
//! * [`binom`]: topic-allocated success/failure counts

pub mod binom;
pub mod mixem;
pub mod poisson;

pub use binom::{binom_stats, binom_stats_sparse, BinomStats};
pub use mixem::{
    mixem, mixture_loglik, poismixem, poismixem2, poismixem3, poisson_mixture_objective,
};
pub use poisson::{
    fit_poisson_em, fit_univar_poisson_models_em, poisson_loglik, PoissonFit, UnivarPoissonFits,
};
