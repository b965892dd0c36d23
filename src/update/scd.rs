//! Sequential coordinate descent (SCD) on the KL loss.
//!
//! Unlike [`super::ccd`], each coordinate takes a fixed number of Newton
//! steps rather than being solved to convergence, in the manner of the
//! NNLM package (Lin & Boutros 2020).

use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix2};
use sprs::CsMat;

use super::check_update_shapes;
use crate::error::{check_floor, check_len, Result};
use crate::matrix::{as_csc, column_support};
use crate::parallel::{update_lanes, update_lanes_parallel};

/// One SCD sweep on `min_x Σ_k u_k x_k − Σ_i w_i log(Σ_k L_ik x_k)`, taking
/// `numiter` Newton steps on each coordinate in turn. `u = colsum(l)`.
pub fn scd_kl_update(
    l: &Array2<f64>,
    w: &Array1<f64>,
    x0: &Array1<f64>,
    numiter: usize,
    e: f64,
) -> Result<Array1<f64>> {
    let u = l.sum_axis(Axis(0));
    scd_kl_update2(l, &u, w, x0, numiter, e)
}

/// [`scd_kl_update`] with the column sums supplied by the caller.
pub fn scd_kl_update2(
    l: &Array2<f64>,
    u: &Array1<f64>,
    w: &Array1<f64>,
    x0: &Array1<f64>,
    numiter: usize,
    e: f64,
) -> Result<Array1<f64>> {
    check_floor(e)?;
    check_len("scd_kl_update: w", l.nrows(), w.len())?;
    check_len("scd_kl_update: u", l.ncols(), u.len())?;
    check_len("scd_kl_update: x0", l.ncols(), x0.len())?;
    Ok(scd_kl_solve(
        l.view(),
        u.view(),
        w.view(),
        x0.to_owned(),
        numiter,
        e,
    ))
}

pub(crate) fn scd_kl_solve(
    l: ArrayView2<f64>,
    u: ArrayView1<f64>,
    w: ArrayView1<f64>,
    mut x: Array1<f64>,
    numiter: usize,
    e: f64,
) -> Array1<f64> {
    let mut r = l.dot(&x);
    for k in 0..x.len() {
        let lk = l.column(k);
        for _ in 0..numiter {
            let mut a = 0.0;
            let mut b = 0.0;
            for ((&lik, &wi), &ri) in lk.iter().zip(w.iter()).zip(r.iter()) {
                let mu = lik / (ri.max(0.0) + e);
                a += wi * mu * mu;
                b += wi * mu;
            }
            b += a * x[k] - u[k];
            let next = (b / (a + e)).max(0.0);
            let step = next - x[k];
            if step == 0.0 {
                break;
            }
            r.scaled_add(step, &lk);
            x[k] = next;
        }
    }
    x
}

/// Refine columns `j` of `h` (k×m) by one SCD sweep against `a ≈ w·h`.
pub fn scd_update_factors<S: Data<Elem = f64>>(
    a: &ArrayBase<S, Ix2>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    numiter: usize,
    e: f64,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes("scd_update_factors", a.dim(), w, h, j)?;
    log::debug!(
        "scd_update_factors: {} columns, {} steps per coordinate",
        j.len(),
        numiter
    );

    let u = w.sum_axis(Axis(0));
    Ok(update_lanes(h, Axis(1), j, |c| {
        scd_kl_solve(w.view(), u.view(), a.column(c), h.column(c).to_owned(), numiter, e)
    }))
}

pub fn scd_update_factors_sparse(
    a: &CsMat<f64>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    numiter: usize,
    e: f64,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes("scd_update_factors_sparse", (a.rows(), a.cols()), w, h, j)?;
    log::debug!(
        "scd_update_factors_sparse: {} columns, nnz {}",
        j.len(),
        a.nnz()
    );

    let a = as_csc(a);
    let u = w.sum_axis(Axis(0));
    Ok(update_lanes(h, Axis(1), j, |c| {
        let (rows, vals) = column_support(&a, c);
        let ws = w.select(Axis(0), &rows);
        scd_kl_solve(ws.view(), u.view(), vals.view(), h.column(c).to_owned(), numiter, e)
    }))
}

pub fn scd_update_factors_parallel<S: Data<Elem = f64> + Sync>(
    a: &ArrayBase<S, Ix2>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    numiter: usize,
    e: f64,
    num_threads: usize,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes("scd_update_factors_parallel", a.dim(), w, h, j)?;
    log::debug!(
        "scd_update_factors_parallel: {} columns on {} threads",
        j.len(),
        num_threads
    );

    let u = w.sum_axis(Axis(0));
    update_lanes_parallel(h, Axis(1), j, num_threads, |c| {
        scd_kl_solve(w.view(), u.view(), a.column(c), h.column(c).to_owned(), numiter, e)
    })
}

pub fn scd_update_factors_sparse_parallel(
    a: &CsMat<f64>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    j: &[usize],
    numiter: usize,
    e: f64,
    num_threads: usize,
) -> Result<Array2<f64>> {
    check_floor(e)?;
    check_update_shapes(
        "scd_update_factors_sparse_parallel",
        (a.rows(), a.cols()),
        w,
        h,
        j,
    )?;

    let a = as_csc(a);
    let u = w.sum_axis(Axis(0));
    update_lanes_parallel(h, Axis(1), j, num_threads, |c| {
        let (rows, vals) = column_support(&a, c);
        let ws = w.select(Axis(0), &rows);
        scd_kl_solve(ws.view(), u.view(), vals.view(), h.column(c).to_owned(), numiter, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{cost, Loss};
    use crate::test_utils::{
        assert_close, assert_nonnegative, make_count_matrix, seeded_factors,
    };
    use ndarray::array;

    #[test]
    fn test_scd_kl_update_converges() {
        let l = array![[1.0, 0.2], [0.5, 1.0], [0.1, 2.0], [1.5, 0.3]];
        let x_star = array![2.0, 0.5];
        let w = l.dot(&x_star);
        let mut x = array![1.0, 1.0];
        for _ in 0..50 {
            x = scd_kl_update(&l, &w, &x, 10, 1e-15).unwrap();
        }
        assert_close(x[0], 2.0, 1e-6);
        assert_close(x[1], 0.5, 1e-6);
    }

    #[test]
    fn test_scd_zero_steps_is_identity() {
        let l = array![[1.0, 0.2], [0.5, 1.0]];
        let x0 = array![0.3, 0.7];
        let x = scd_kl_update(&l, &array![2.0, 1.0], &x0, 0, 1e-15).unwrap();
        assert_eq!(x, x0);
    }

    #[test]
    fn test_scd_kl_update2_matches_with_full_sums() {
        let l = array![[1.0, 0.2], [0.5, 1.0], [0.1, 2.0]];
        let w = array![3.0, 1.0, 2.0];
        let x0 = array![0.5, 0.5];
        let u = l.sum_axis(Axis(0));
        assert_eq!(
            scd_kl_update(&l, &w, &x0, 4, 1e-15).unwrap(),
            scd_kl_update2(&l, &u, &w, &x0, 4, 1e-15).unwrap()
        );
    }

    #[test]
    fn test_scd_variants_agree() {
        let x = make_count_matrix();
        let xs = CsMat::csc_from_dense(x.view(), 0.0);
        let (w, h) = seeded_factors(x.nrows(), x.ncols(), 3, 2);
        let j = vec![4, 1, 0];

        let dense = scd_update_factors(&x, &w, &h, &j, 4, 1e-15).unwrap();
        let sparse = scd_update_factors_sparse(&xs, &w, &h, &j, 4, 1e-15).unwrap();
        let par = scd_update_factors_parallel(&x, &w, &h, &j, 4, 1e-15, 2).unwrap();
        let sparse_par = scd_update_factors_sparse_parallel(&xs, &w, &h, &j, 4, 1e-15, 2).unwrap();

        assert_eq!(dense, par);
        assert_eq!(sparse, sparse_par);
        for (d, s) in dense.iter().zip(sparse.iter()) {
            assert_close(*d, *s, 1e-12);
        }
        assert_eq!(dense.column(2), h.column(2));
        assert_eq!(dense.column(3), h.column(3));
        assert_nonnegative(&dense);
    }

    #[test]
    fn test_scd_update_factors_decreases_loss() {
        let x = make_count_matrix();
        let (w, mut h) = seeded_factors(x.nrows(), x.ncols(), 2, 30);
        let j: Vec<usize> = (0..x.ncols()).collect();
        let mut prev = cost(&x, &w, &h, 1e-15, Loss::Poisson).unwrap().sum();
        for _ in 0..5 {
            h = scd_update_factors(&x, &w, &h, &j, 10, 1e-15).unwrap();
            let f = cost(&x, &w, &h, 1e-15, Loss::Poisson).unwrap().sum();
            assert!(f <= prev + 1e-9, "loss went up: {} -> {}", prev, f);
            prev = f;
        }
    }

    #[test]
    fn test_scd_rejects_bad_input() {
        let x = make_count_matrix();
        let (w, h) = seeded_factors(x.nrows(), x.ncols(), 2, 1);
        assert!(scd_update_factors(&x, &w, &h, &[0, 0], 2, 1e-15).is_err());
        assert!(scd_update_factors(&x, &w, &h, &[0], 2, -1.0).is_err());
        assert!(scd_update_factors_parallel(&x, &w, &h, &[0], 2, 1e-15, 0).is_err());
    }
}
