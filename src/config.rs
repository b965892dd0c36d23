use serde::{Deserialize, Serialize};

use crate::error::{check_floor, NmfError, Result};

/// Settings shared by the factor updaters.
///
/// `numiter` is an exact inner iteration count, not an upper bound: the EM and
/// SCD kernels never stop early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Smallest permissible denominator
    pub e: f64,
    pub numiter: usize,
    /// `None` or `Some(1)` runs sequentially; `Some(n)` spawns `n` workers per call
    pub num_threads: Option<usize>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            e: 1e-15,
            numiter: 4,
            num_threads: None,
        }
    }
}

impl KernelConfig {
    pub fn with_floor(mut self, e: f64) -> Self {
        self.e = e;
        self
    }

    pub fn with_numiter(mut self, numiter: usize) -> Self {
        self.numiter = numiter;
        self
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_floor(self.e)?;
        if self.num_threads == Some(0) {
            return Err(NmfError::InvalidParameter(
                "num_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Worker count when the parallel kernels should be used
    pub fn parallel_threads(&self) -> Option<usize> {
        self.num_threads.filter(|&n| n > 1)
    }
}
