//! Error types shared by every kernel.
//!
//! Only contract violations are reported. Small denominators are rescued by
//! the epsilon floor and negative coordinates are clamped, so neither ever
//! surfaces here.

use std::error::Error;
use std::fmt;

/// Errors raised at the call boundary, before any computation starts
#[derive(Debug, Clone, PartialEq)]
pub enum NmfError {
    /// Matrix dimensions disagree, e.g. data n×m against factors n×k and k×m
    DimensionMismatch {
        context: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Vector length disagrees with the matrix it is paired with
    LengthMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    /// A row or column selector points outside the matrix
    IndexOutOfBounds {
        context: &'static str,
        index: usize,
        bound: usize,
    },
    /// A column selector names the same column twice
    DuplicateIndex { context: &'static str, index: usize },
    InvalidParameter(String),
    ThreadPool(String),
}

impl fmt::Display for NmfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NmfError::DimensionMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "{}: expected a {}x{} matrix, found {}x{}",
                context, expected.0, expected.1, found.0, found.1
            ),
            NmfError::LengthMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "{}: expected length {}, found {}",
                context, expected, found
            ),
            NmfError::IndexOutOfBounds {
                context,
                index,
                bound,
            } => write!(f, "{}: index {} out of bounds (< {})", context, index, bound),
            NmfError::DuplicateIndex { context, index } => {
                write!(f, "{}: index {} appears more than once", context, index)
            }
            NmfError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            NmfError::ThreadPool(msg) => write!(f, "Thread pool error: {}", msg),
        }
    }
}

impl Error for NmfError {}

impl From<rayon::ThreadPoolBuildError> for NmfError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        NmfError::ThreadPool(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NmfError>;

pub(crate) fn check_dims(
    context: &'static str,
    expected: (usize, usize),
    found: (usize, usize),
) -> Result<()> {
    if expected != found {
        return Err(NmfError::DimensionMismatch {
            context,
            expected,
            found,
        });
    }
    Ok(())
}

pub(crate) fn check_len(context: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(NmfError::LengthMismatch {
            context,
            expected,
            found,
        });
    }
    Ok(())
}

/// Epsilon floor must be a finite, non-negative number
pub(crate) fn check_floor(e: f64) -> Result<()> {
    if !e.is_finite() || e < 0.0 {
        return Err(NmfError::InvalidParameter(format!(
            "epsilon floor must be finite and >= 0, got {}",
            e
        )));
    }
    Ok(())
}

/// Every index must be `< bound`; with `unique` set, no index may repeat.
pub(crate) fn check_indices(
    context: &'static str,
    indices: &[usize],
    bound: usize,
    unique: bool,
) -> Result<()> {
    let mut seen = vec![false; bound];
    for &index in indices {
        if index >= bound {
            return Err(NmfError::IndexOutOfBounds {
                context,
                index,
                bound,
            });
        }
        if unique {
            if seen[index] {
                return Err(NmfError::DuplicateIndex { context, index });
            }
            seen[index] = true;
        }
    }
    Ok(())
}
