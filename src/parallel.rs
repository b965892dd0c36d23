//! Column-partitioned dispatch for the parallel kernel variants.
//!
//! Every refined column depends only on the data, the fixed factor and its
//! own starting value. The column set is split into contiguous blocks, one
//! per worker, each worker returns the columns it owns, and the results are
//! written back after the join. No two workers ever produce the same column.

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;

use crate::error::{NmfError, Result};

/// Split `cols` into at most `parts` contiguous, non-empty blocks of
/// near-equal size (earlier blocks take the remainder).
pub fn partition_columns(cols: &[usize], parts: usize) -> Vec<&[usize]> {
    if cols.is_empty() || parts == 0 {
        return Vec::new();
    }
    let parts = parts.min(cols.len());
    let base = cols.len() / parts;
    let extra = cols.len() % parts;

    let mut blocks = Vec::with_capacity(parts);
    let mut start = 0;
    for p in 0..parts {
        let len = base + usize::from(p < extra);
        blocks.push(&cols[start..start + len]);
        start += len;
    }
    blocks
}

/// Refine the lanes `cols` of `factor` along `axis` one after another.
///
/// `axis` is `Axis(1)` when the kernel refines columns of a k×m factor and
/// `Axis(0)` when it refines rows of an m×k factor.
pub(crate) fn update_lanes<F>(
    factor: &Array2<f64>,
    axis: Axis,
    cols: &[usize],
    update: F,
) -> Array2<f64>
where
    F: Fn(usize) -> Array1<f64>,
{
    let mut out = factor.clone();
    for &c in cols {
        let lane = update(c);
        out.index_axis_mut(axis, c).assign(&lane);
    }
    out
}

/// Parallel counterpart of [`update_lanes`] on a pool of `num_threads`
/// workers built for this call only.
pub(crate) fn update_lanes_parallel<F>(
    factor: &Array2<f64>,
    axis: Axis,
    cols: &[usize],
    num_threads: usize,
    update: F,
) -> Result<Array2<f64>>
where
    F: Fn(usize) -> Array1<f64> + Sync,
{
    if num_threads == 0 {
        return Err(NmfError::InvalidParameter(
            "num_threads must be at least 1".to_string(),
        ));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()?;
    let blocks = partition_columns(cols, num_threads);
    log::trace!(
        "dispatching {} columns in {} blocks on {} threads",
        cols.len(),
        blocks.len(),
        num_threads
    );

    let owned: Vec<Vec<(usize, Array1<f64>)>> = pool.install(|| {
        blocks
            .par_iter()
            .map(|block| block.iter().map(|&c| (c, update(c))).collect())
            .collect()
    });

    let mut out = factor.clone();
    for (c, lane) in owned.into_iter().flatten() {
        out.index_axis_mut(axis, c).assign(&lane);
    }
    Ok(out)
}
