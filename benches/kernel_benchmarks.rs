//! Benchmarks for the factor update kernels
//!
//! Run with: cargo bench --bench kernel_benchmarks
//! HTML reports: target/criterion/report/index.html

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::{Distribution, Poisson, Uniform};
use ndarray_rand::RandomExt;
use poisson_nmf::*;
use sprs::CsMat;

/// Counts from a rank-`k` Poisson model, roughly half zeros
fn create_benchmark_counts(n: usize, m: usize, k: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let l = Array2::random_using((n, k), Uniform::new(0.0, 1.0), &mut rng);
    let f = Array2::random_using((k, m), Uniform::new(0.0, 0.5), &mut rng);
    l.dot(&f).mapv(|r| {
        if r > 0.0 {
            Poisson::new(r).map_or(0.0, |p| p.sample(&mut rng))
        } else {
            0.0
        }
    })
}

fn create_factors(n: usize, m: usize, k: usize) -> (Array2<f64>, Array2<f64>) {
    let mut rng = StdRng::seed_from_u64(1);
    let w = Array2::random_using((n, k), Uniform::new(0.1, 1.0), &mut rng);
    let h = Array2::random_using((k, m), Uniform::new(0.1, 1.0), &mut rng);
    (w, h)
}

/// Benchmark the coordinate descent engines on dense and sparse data
fn bench_coordinate_descent(c: &mut Criterion) {
    let mut group = c.benchmark_group("coordinate_descent");
    group.sample_size(20);

    for (n, m) in [(200, 100), (1000, 400)] {
        let x = create_benchmark_counts(n, m, 6, 7);
        let xs = CsMat::csc_from_dense(x.view(), 0.0);
        let (w, h) = create_factors(n, m, 6);
        let cols: Vec<usize> = (0..m).collect();
        let size = format!("{}x{}", n, m);

        group.bench_with_input(BenchmarkId::new("ccd_dense", &size), &x, |b, x| {
            b.iter(|| ccd_update_factors(black_box(x), &w, &h, &cols, 1e-15).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("ccd_sparse", &size), &xs, |b, xs| {
            b.iter(|| ccd_update_factors_sparse(black_box(xs), &w, &h, &cols, 1e-15).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("scd_sparse", &size), &xs, |b, xs| {
            b.iter(|| {
                scd_update_factors_sparse(black_box(xs), &w, &h, &cols, 4, 1e-15).unwrap()
            });
        });
    }

    group.finish();
}

/// Benchmark sequential against threaded dispatch
fn bench_parallelism_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallelism");
    group.sample_size(20);

    let x = create_benchmark_counts(1000, 400, 6, 3);
    let xs = CsMat::csc_from_dense(x.view(), 0.0);
    let (w, h) = create_factors(1000, 400, 6);
    let f = h.t().to_owned();
    let cols: Vec<usize> = (0..400).collect();

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("ccd", threads), &threads, |b, &t| {
            b.iter(|| {
                ccd_update_factors_sparse_parallel(black_box(&xs), &w, &h, &cols, 1e-15, t)
                    .unwrap()
            });
        });
        group.bench_with_input(BenchmarkId::new("pnmfem", threads), &threads, |b, &t| {
            b.iter(|| {
                pnmfem_update_factors_sparse_parallel(black_box(&xs), &f, &w, &cols, 4, t)
                    .unwrap()
            });
        });
    }

    group.finish();
}

/// Benchmark the loss evaluators
fn bench_cost(c: &mut Criterion) {
    let mut group = c.benchmark_group("cost");

    let x = create_benchmark_counts(1000, 400, 6, 5);
    let xs = CsMat::csc_from_dense(x.view(), 0.0);
    let (w, h) = create_factors(1000, 400, 6);

    for loss in [Loss::Frobenius, Loss::Poisson, Loss::Multinom] {
        let name = format!("{:?}", loss);
        group.bench_function(BenchmarkId::new("dense", &name), |b| {
            b.iter(|| cost(black_box(&x), &w, &h, 1e-15, loss).unwrap());
        });
        group.bench_function(BenchmarkId::new("sparse", &name), |b| {
            b.iter(|| cost_sparse(black_box(&xs), &w, &h, 1e-15, loss).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_coordinate_descent,
    bench_parallelism_comparison,
    bench_cost,
);

criterion_main!(benches);
