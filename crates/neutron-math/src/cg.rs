// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Preconditioned Conjugate Gradient
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Jacobi-preconditioned conjugate gradient for symmetric positive
//! definite CSR systems (diffusion and discrete-ordinates operators).

use sprs::CsMat;

use crate::sparse::{
    jacobi_inverse, residual_norm, spmv, vec_axpy, vec_dot, vec_norm, LinearSolveResult,
};

/// Configuration for the PCG solver.
#[derive(Debug, Clone)]
pub struct PcgConfig {
    /// Maximum number of iterations (default: 2000).
    pub max_iter: usize,
    /// Tolerance on ‖r‖₂ / ‖b‖₂ (default: 1e-10).
    pub tol: f64,
}

impl Default for PcgConfig {
    fn default() -> Self {
        PcgConfig {
            max_iter: 2000,
            tol: 1e-10,
        }
    }
}

/// Solve `A x = b`. `x` is the initial guess on entry and the solution on
/// exit; it is updated even when the iteration does not converge.
pub fn pcg_solve(a: &CsMat<f64>, b: &[f64], x: &mut [f64], config: &PcgConfig) -> LinearSolveResult {
    let n = b.len();
    let b_norm = vec_norm(b);
    if b_norm < 1e-300 {
        x.iter_mut().for_each(|v| *v = 0.0);
        return LinearSolveResult {
            iterations: 0,
            residual: 0.0,
            converged: true,
        };
    }

    let inv_diag = jacobi_inverse(a);
    let mut ap = vec![0.0; n];
    spmv(a, x, &mut ap);
    let mut r: Vec<f64> = b.iter().zip(&ap).map(|(bi, ai)| bi - ai).collect();
    let mut z: Vec<f64> = r.iter().zip(&inv_diag).map(|(ri, di)| ri * di).collect();
    let mut p = z.clone();
    let mut rz = vec_dot(&r, &z);
    let abs_tol = config.tol * b_norm;

    let mut iterations = 0;
    let mut converged = vec_norm(&r) <= abs_tol;

    while !converged && iterations < config.max_iter {
        iterations += 1;
        spmv(a, &p, &mut ap);
        let pap = vec_dot(&p, &ap);
        if pap.abs() < 1e-300 {
            break;
        }
        let alpha = rz / pap;
        vec_axpy(alpha, &p, x);
        vec_axpy(-alpha, &ap, &mut r);

        if vec_norm(&r) <= abs_tol {
            converged = true;
            break;
        }

        for ((zi, ri), di) in z.iter_mut().zip(&r).zip(&inv_diag) {
            *zi = ri * di;
        }
        let rz_new = vec_dot(&r, &z);
        let beta = rz_new / rz;
        rz = rz_new;
        for (pi, zi) in p.iter_mut().zip(&z) {
            *pi = zi + beta * *pi;
        }
    }

    let residual = residual_norm(a, x, b) / b_norm;
    LinearSolveResult {
        iterations,
        residual,
        converged: converged || residual <= config.tol,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::SystemBuilder;

    /// 1D Laplacian with Dirichlet ends: tridiag(-1, 2, -1).
    fn laplacian_1d(n: usize) -> CsMat<f64> {
        let mut b = SystemBuilder::new(n);
        for i in 0..n {
            b.add(i, i, 2.0);
            if i > 0 {
                b.add(i, i - 1, -1.0);
            }
            if i + 1 < n {
                b.add(i, i + 1, -1.0);
            }
        }
        b.build()
    }

    #[test]
    fn test_pcg_solves_laplacian() {
        let n = 50;
        let a = laplacian_1d(n);
        let exact: Vec<f64> = (0..n).map(|i| (i as f64 * 0.1).sin()).collect();
        let mut b = vec![0.0; n];
        spmv(&a, &exact, &mut b);

        let mut x = vec![0.0; n];
        let result = pcg_solve(&a, &b, &mut x, &PcgConfig::default());
        assert!(result.converged, "PCG should converge: {result:?}");
        assert!(result.iterations <= n + 1, "CG exceeded n iterations: {}", result.iterations);
        for i in 0..n {
            assert!((x[i] - exact[i]).abs() < 1e-8, "x[{i}] = {} vs {}", x[i], exact[i]);
        }
    }

    #[test]
    fn test_pcg_diagonal_system_one_iteration() {
        let mut builder = SystemBuilder::new(3);
        builder.add(0, 0, 2.0);
        builder.add(1, 1, 4.0);
        builder.add(2, 2, 8.0);
        let a = builder.build();
        let mut x = vec![0.0; 3];
        let result = pcg_solve(&a, &[2.0, 4.0, 8.0], &mut x, &PcgConfig::default());
        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        for v in x {
            assert!((v - 1.0).abs() < 1e-14);
        }
    }

    #[test]
    fn test_pcg_zero_rhs() {
        let a = laplacian_1d(10);
        let mut x = vec![3.0; 10];
        let result = pcg_solve(&a, &[0.0; 10], &mut x, &PcgConfig::default());
        assert!(result.converged);
        assert!(x.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_pcg_reports_non_convergence() {
        let a = laplacian_1d(100);
        let b = vec![1.0; 100];
        let mut x = vec![0.0; 100];
        let config = PcgConfig { max_iter: 3, tol: 1e-12 };
        let result = pcg_solve(&a, &b, &mut x, &config);
        assert!(!result.converged);
        assert_eq!(result.iterations, 3);
        assert!(x.iter().all(|v| v.is_finite()));
    }
}
