//! Single-factor refinement kernels.
//!
//! Every kernel refines one factor while the other is held fixed and returns
//! the refined copy; the inputs are never modified.

pub mod betanmf;
pub mod ccd;
pub mod pnmfem;
pub mod scd;

use ndarray::Array2;

use crate::config::KernelConfig;
use crate::error::{check_dims, check_indices, Result};
use crate::matrix::CountMatrix;

pub use betanmf::{betanmf_update_factors, betanmf_update_factors_sparse};
pub use ccd::{
    ccd_kl_update, ccd_kl_update2, ccd_ls_update_factors, ccd_ls_update_factors_parallel,
    ccd_ls_update_factors_sparse, ccd_ls_update_factors_sparse_parallel, ccd_update_factors,
    ccd_update_factors_parallel, ccd_update_factors_sparse, ccd_update_factors_sparse_parallel,
};
pub use pnmfem::{
    pnmfem_update_factors, pnmfem_update_factors_parallel, pnmfem_update_factors_sparse,
    pnmfem_update_factors_sparse_parallel,
};
pub use scd::{
    scd_kl_update, scd_kl_update2, scd_update_factors, scd_update_factors_parallel,
    scd_update_factors_sparse, scd_update_factors_sparse_parallel,
};

/// Validate the `V ≈ W·H` layout shared by the column-wise kernels:
/// data n×m, fixed `w` n×k, refined `h` k×m, unique columns `j < m`.
pub(crate) fn check_update_shapes(
    context: &'static str,
    (n, m): (usize, usize),
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
) -> Result<()> {
    let k = w.ncols();
    check_dims(context, (n, k), w.dim())?;
    check_dims(context, (k, m), h.dim())?;
    check_indices(context, j, m, true)
}

/// One projected Newton step `max(x − g/h, 0)` with the curvature floored
/// at `e`. Without curvature the coordinate drops to zero when the
/// gradient is positive and is kept otherwise.
#[inline]
pub(crate) fn projected_newton(x: f64, g: f64, h: f64, e: f64) -> f64 {
    if h > 0.0 {
        (x - g / h.max(e)).max(0.0)
    } else if g > 0.0 {
        0.0
    } else {
        x
    }
}

/// Algorithm-specific refinement of the factor `h` (k×m) in `X ≈ W·H`.
pub trait FactorUpdater: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `h` with the columns `cols` refined against data `x` (n×m)
    /// and the fixed loadings `w` (n×k).
    fn update(
        &self,
        x: CountMatrix<'_>,
        w: &Array2<f64>,
        h: &Array2<f64>,
        cols: &[usize],
    ) -> Result<Array2<f64>>;
}

macro_rules! updater {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default)]
        pub struct $name {
            pub config: KernelConfig,
        }

        impl $name {
            pub fn with_config(config: KernelConfig) -> Self {
                Self { config }
            }
        }
    };
}

updater!(
    /// Cyclic coordinate descent on the KL (Poisson) loss, one sweep per call
    Ccd
);
updater!(
    /// Cyclic coordinate descent on the least-squares loss, one sweep per call
    CcdLeastSquares
);
updater!(
    /// Sequential coordinate descent on the KL loss, `numiter` steps per coordinate
    Scd
);
updater!(
    /// EM updates of the Poisson NMF, `numiter` passes per column
    PnmfEm
);
updater!(
    /// Multiplicative (Lee–Seung) KL updates, one step per call
    BetaNmf
);

impl FactorUpdater for Ccd {
    fn name(&self) -> &'static str {
        "ccd"
    }

    fn update(
        &self,
        x: CountMatrix<'_>,
        w: &Array2<f64>,
        h: &Array2<f64>,
        cols: &[usize],
    ) -> Result<Array2<f64>> {
        self.config.validate()?;
        let e = self.config.e;
        match (x, self.config.parallel_threads()) {
            (CountMatrix::Dense(v), None) => ccd_update_factors(&v, w, h, cols, e),
            (CountMatrix::Dense(v), Some(t)) => ccd_update_factors_parallel(&v, w, h, cols, e, t),
            (CountMatrix::Sparse(v), None) => ccd_update_factors_sparse(v, w, h, cols, e),
            (CountMatrix::Sparse(v), Some(t)) => {
                ccd_update_factors_sparse_parallel(v, w, h, cols, e, t)
            }
        }
    }
}

impl FactorUpdater for CcdLeastSquares {
    fn name(&self) -> &'static str {
        "ccd-ls"
    }

    fn update(
        &self,
        x: CountMatrix<'_>,
        w: &Array2<f64>,
        h: &Array2<f64>,
        cols: &[usize],
    ) -> Result<Array2<f64>> {
        self.config.validate()?;
        let e = self.config.e;
        match (x, self.config.parallel_threads()) {
            (CountMatrix::Dense(v), None) => ccd_ls_update_factors(&v, w, h, cols, e),
            (CountMatrix::Dense(v), Some(t)) => {
                ccd_ls_update_factors_parallel(&v, w, h, cols, e, t)
            }
            (CountMatrix::Sparse(v), None) => ccd_ls_update_factors_sparse(v, w, h, cols, e),
            (CountMatrix::Sparse(v), Some(t)) => {
                ccd_ls_update_factors_sparse_parallel(v, w, h, cols, e, t)
            }
        }
    }
}

impl FactorUpdater for Scd {
    fn name(&self) -> &'static str {
        "scd"
    }

    fn update(
        &self,
        x: CountMatrix<'_>,
        w: &Array2<f64>,
        h: &Array2<f64>,
        cols: &[usize],
    ) -> Result<Array2<f64>> {
        self.config.validate()?;
        let KernelConfig { e, numiter, .. } = self.config;
        match (x, self.config.parallel_threads()) {
            (CountMatrix::Dense(a), None) => scd_update_factors(&a, w, h, cols, numiter, e),
            (CountMatrix::Dense(a), Some(t)) => {
                scd_update_factors_parallel(&a, w, h, cols, numiter, e, t)
            }
            (CountMatrix::Sparse(a), None) => {
                scd_update_factors_sparse(a, w, h, cols, numiter, e)
            }
            (CountMatrix::Sparse(a), Some(t)) => {
                scd_update_factors_sparse_parallel(a, w, h, cols, numiter, e, t)
            }
        }
    }
}

impl FactorUpdater for PnmfEm {
    fn name(&self) -> &'static str {
        "pnmfem"
    }

    /// The EM kernels store the refined factor as m×k, so `h` is transposed
    /// on the way in and out.
    fn update(
        &self,
        x: CountMatrix<'_>,
        w: &Array2<f64>,
        h: &Array2<f64>,
        cols: &[usize],
    ) -> Result<Array2<f64>> {
        self.config.validate()?;
        let numiter = self.config.numiter;
        let f = h.t().to_owned();
        let f = match (x, self.config.parallel_threads()) {
            (CountMatrix::Dense(v), None) => pnmfem_update_factors(&v, &f, w, cols, numiter)?,
            (CountMatrix::Dense(v), Some(t)) => {
                pnmfem_update_factors_parallel(&v, &f, w, cols, numiter, t)?
            }
            (CountMatrix::Sparse(v), None) => {
                pnmfem_update_factors_sparse(v, &f, w, cols, numiter)?
            }
            (CountMatrix::Sparse(v), Some(t)) => {
                pnmfem_update_factors_sparse_parallel(v, &f, w, cols, numiter, t)?
            }
        };
        Ok(f.t().to_owned())
    }
}

impl FactorUpdater for BetaNmf {
    fn name(&self) -> &'static str {
        "betanmf"
    }

    fn update(
        &self,
        x: CountMatrix<'_>,
        w: &Array2<f64>,
        h: &Array2<f64>,
        cols: &[usize],
    ) -> Result<Array2<f64>> {
        self.config.validate()?;
        match x {
            CountMatrix::Dense(v) => betanmf_update_factors(&v, w, h, cols, self.config.e),
            CountMatrix::Sparse(v) => betanmf_update_factors_sparse(v, w, h, cols, self.config.e),
        }
    }
}
