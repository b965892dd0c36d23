/// Shared fixtures for the kernel unit tests
use ndarray::{array, Array2};
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

/// A 6×5 count matrix with two topic-like blocks and roughly half zeros.
/// Rows 0-2 mostly use columns 0-2, rows 3-5 mostly use columns 2-4.
pub fn make_count_matrix() -> Array2<f64> {
    array![
        [4.0, 2.0, 1.0, 0.0, 0.0],
        [3.0, 0.0, 2.0, 0.0, 1.0],
        [5.0, 1.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 3.0, 2.0],
        [0.0, 1.0, 0.0, 4.0, 6.0],
        [1.0, 0.0, 2.0, 2.0, 3.0],
    ]
}

/// Seeded positive factors `(a, b)` with `a` n×k and `b` k×m.
pub fn seeded_factors(n: usize, m: usize, k: usize, seed: u64) -> (Array2<f64>, Array2<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let a = Array2::random_using((n, k), Uniform::new(0.1, 1.0), &mut rng);
    let b = Array2::random_using((k, m), Uniform::new(0.1, 1.0), &mut rng);
    (a, b)
}

/// Relative closeness check that also tolerates values near zero.
pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    let scale = expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tol * scale,
        "expected {} but got {} (tol {})",
        expected,
        actual,
        tol
    );
}

pub fn assert_nonnegative(a: &Array2<f64>) {
    for &v in a.iter() {
        assert!(v >= 0.0 && v.is_finite(), "entry should be finite and >= 0, got {}", v);
    }
}
