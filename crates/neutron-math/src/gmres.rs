// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — GMRES
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Restarted GMRES(m) Krylov subspace solver for non-symmetric CSR
//! systems (the drift-corrected NDA operator).
//!
//! GMRES builds an orthonormal Krylov basis via Arnoldi iteration with
//! modified Gram-Schmidt, then solves the projected least-squares
//! problem using Givens rotations on the upper Hessenberg matrix. When
//! the basis reaches size `m` without convergence the solver restarts
//! from the current approximate solution.
//!
//! A left Jacobi preconditioner is applied: instead of `A x = b` we
//! solve `D⁻¹ A x = D⁻¹ b` with `D = diag(A)`.

use sprs::CsMat;

use crate::sparse::{
    jacobi_inverse, residual_norm, spmv, vec_axpy, vec_dot, vec_norm, LinearSolveResult,
};

/// Configuration for the GMRES(m) solver.
#[derive(Debug, Clone)]
pub struct GmresConfig {
    /// Krylov subspace dimension before restart (default: 40).
    pub restart: usize,
    /// Maximum number of outer (restart) iterations (default: 200).
    pub max_iter: usize,
    /// Convergence tolerance on the preconditioned relative residual (default: 1e-10).
    pub tol: f64,
}

impl Default for GmresConfig {
    fn default() -> Self {
        GmresConfig {
            restart: 40,
            max_iter: 200,
            tol: 1e-10,
        }
    }
}

/// A single Givens rotation storing (c, s) such that
/// ```text
/// | c  s | | a |   | r |
/// |-s  c | | b | = | 0 |
/// ```
#[derive(Clone, Copy)]
struct GivensRotation {
    c: f64,
    s: f64,
}

impl GivensRotation {
    /// Compute the rotation that zeroes `b` in (a, b).
    fn compute(a: f64, b: f64) -> Self {
        if b.abs() < 1e-300 {
            GivensRotation { c: 1.0, s: 0.0 }
        } else if b.abs() > a.abs() {
            let tau = -a / b;
            let s = 1.0 / (1.0 + tau * tau).sqrt();
            let c = s * tau;
            GivensRotation { c, s }
        } else {
            let tau = -b / a;
            let c = 1.0 / (1.0 + tau * tau).sqrt();
            let s = c * tau;
            GivensRotation { c, s }
        }
    }

    #[inline]
    fn apply(&self, a: &mut f64, b: &mut f64) {
        let ta = *a;
        let tb = *b;
        *a = self.c * ta - self.s * tb;
        *b = self.s * ta + self.c * tb;
    }
}

/// `out = D⁻¹ (b − A x)`
fn preconditioned_residual(a: &CsMat<f64>, inv_diag: &[f64], x: &[f64], b: &[f64], out: &mut [f64]) {
    spmv(a, x, out);
    for ((oi, &bi), &di) in out.iter_mut().zip(b).zip(inv_diag) {
        *oi = di * (bi - *oi);
    }
}

/// Solve `A x = b` with restarted GMRES(m) and a left Jacobi
/// preconditioner. `x` is the initial guess on entry and the best
/// available solution on exit.
///
/// ```text
/// for each restart cycle:
///   z = D⁻¹ (b − A·x), beta = ‖z‖₂, V[0] = z / beta
///   for j = 0 .. m-1:             (Arnoldi)
///     w = D⁻¹ A V[j]
///     modified Gram-Schmidt against V[0..=j] → H[:, j]
///     apply previous Givens rotations, compute a new one
///     residual estimate = |g[j+1]|
///   back-substitute H y = g, x += V · y
/// ```
pub fn gmres_solve(
    a: &CsMat<f64>,
    b: &[f64],
    x: &mut [f64],
    config: &GmresConfig,
) -> LinearSolveResult {
    let n = b.len();
    let b_norm = vec_norm(b);
    if n == 0 || b_norm < 1e-300 {
        x.iter_mut().for_each(|v| *v = 0.0);
        return LinearSolveResult {
            iterations: 0,
            residual: 0.0,
            converged: true,
        };
    }

    let m = config.restart.max(1).min(n);
    let inv_diag = jacobi_inverse(a);

    let pb: Vec<f64> = b.iter().zip(&inv_diag).map(|(bi, di)| bi * di).collect();
    let abs_tol = config.tol * vec_norm(&pb).max(1e-300);

    let mut av = vec![0.0; n];
    let mut z = vec![0.0; n];
    let mut total_iters = 0;

    for _restart in 0..config.max_iter {
        preconditioned_residual(a, &inv_diag, x, b, &mut z);
        let beta = vec_norm(&z);
        if beta <= abs_tol {
            break;
        }

        let mut v_basis: Vec<Vec<f64>> = Vec::with_capacity(m + 1);
        v_basis.push(z.iter().map(|zi| zi / beta).collect());

        // H[i][j] => h_store[j * (m+1) + i]
        let h_rows = m + 1;
        let mut h_store = vec![0.0; h_rows * m];
        let mut givens: Vec<GivensRotation> = Vec::with_capacity(m);
        let mut g = vec![0.0; m + 1];
        g[0] = beta;

        let mut converged_inner = false;
        let mut inner_iters = 0;

        for j in 0..m {
            inner_iters = j + 1;
            total_iters += 1;

            spmv(a, &v_basis[j], &mut av);
            let mut w: Vec<f64> = av.iter().zip(&inv_diag).map(|(ai, di)| ai * di).collect();

            for (i, vi) in v_basis.iter().enumerate().take(j + 1) {
                let h_ij = vec_dot(&w, vi);
                h_store[j * h_rows + i] = h_ij;
                vec_axpy(-h_ij, vi, &mut w);
            }

            let h_jp1_j = vec_norm(&w);
            h_store[j * h_rows + (j + 1)] = h_jp1_j;
            if h_jp1_j > 1e-300 {
                v_basis.push(w.iter().map(|wi| wi / h_jp1_j).collect());
            } else {
                v_basis.push(vec![0.0; n]);
            }

            for (i, rot) in givens.iter().enumerate() {
                let (mut ha, mut hb) = (h_store[j * h_rows + i], h_store[j * h_rows + i + 1]);
                rot.apply(&mut ha, &mut hb);
                h_store[j * h_rows + i] = ha;
                h_store[j * h_rows + i + 1] = hb;
            }

            let rot = GivensRotation::compute(h_store[j * h_rows + j], h_store[j * h_rows + j + 1]);
            let (mut ha, mut hb) = (h_store[j * h_rows + j], h_store[j * h_rows + j + 1]);
            rot.apply(&mut ha, &mut hb);
            h_store[j * h_rows + j] = ha;
            h_store[j * h_rows + j + 1] = hb;

            let (mut ga, mut gb) = (g[j], g[j + 1]);
            rot.apply(&mut ga, &mut gb);
            g[j] = ga;
            g[j + 1] = gb;
            givens.push(rot);

            // Happy breakdown also ends the cycle: the Krylov space is invariant
            if g[j + 1].abs() < abs_tol || h_jp1_j < 1e-300 {
                converged_inner = true;
                break;
            }
        }

        let k = inner_iters;
        let mut y = vec![0.0; k];
        for i in (0..k).rev() {
            let mut sum = g[i];
            for jj in (i + 1)..k {
                sum -= h_store[jj * h_rows + i] * y[jj];
            }
            let diag = h_store[i * h_rows + i];
            y[i] = if diag.abs() > 1e-300 { sum / diag } else { 0.0 };
        }
        for (i, &yi) in y.iter().enumerate() {
            vec_axpy(yi, &v_basis[i], x);
        }

        if converged_inner {
            break;
        }
    }

    preconditioned_residual(a, &inv_diag, x, b, &mut z);
    let converged = vec_norm(&z) <= abs_tol * (1.0 + 1e-6);
    LinearSolveResult {
        iterations: total_iters,
        residual: residual_norm(a, x, b) / b_norm,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cg::{pcg_solve, PcgConfig};
    use crate::sparse::SystemBuilder;

    /// Upwinded 1D convection-diffusion: non-symmetric, diagonally dominant.
    fn convection_diffusion(n: usize, peclet: f64) -> CsMat<f64> {
        let mut b = SystemBuilder::new(n);
        for i in 0..n {
            b.add(i, i, 2.0 + peclet);
            if i > 0 {
                b.add(i, i - 1, -1.0 - peclet);
            }
            if i + 1 < n {
                b.add(i, i + 1, -1.0);
            }
        }
        b.build()
    }

    #[test]
    fn test_gmres_nonsymmetric_convergence() {
        let n = 60;
        let a = convection_diffusion(n, 0.8);
        let exact: Vec<f64> = (0..n).map(|i| 1.0 + (i as f64 * 0.2).cos()).collect();
        let mut b = vec![0.0; n];
        spmv(&a, &exact, &mut b);

        let mut x = vec![0.0; n];
        let result = gmres_solve(&a, &b, &mut x, &GmresConfig::default());
        assert!(
            result.converged,
            "GMRES should converge: residual = {}, iters = {}",
            result.residual, result.iterations
        );
        for i in 0..n {
            assert!((x[i] - exact[i]).abs() < 1e-6, "x[{i}] = {} vs {}", x[i], exact[i]);
        }
    }

    #[test]
    fn test_gmres_with_small_restart() {
        let n = 40;
        let a = convection_diffusion(n, 0.3);
        let b = vec![1.0; n];
        let mut x = vec![0.0; n];
        let config = GmresConfig {
            restart: 5,
            max_iter: 500,
            tol: 1e-10,
        };
        let result = gmres_solve(&a, &b, &mut x, &config);
        assert!(result.converged, "restarted GMRES(5) should converge: {result:?}");
        assert!(result.residual < 1e-8);
    }

    #[test]
    fn test_gmres_zero_source() {
        let a = convection_diffusion(10, 0.5);
        let mut x = vec![1.0; 10];
        let result = gmres_solve(&a, &[0.0; 10], &mut x, &GmresConfig::default());
        assert!(result.converged, "Zero source should converge immediately");
        assert!(x.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_gmres_exact_initial_guess() {
        let a = convection_diffusion(20, 0.5);
        let exact = vec![2.0; 20];
        let mut b = vec![0.0; 20];
        spmv(&a, &exact, &mut b);
        let mut x = exact.clone();
        let result = gmres_solve(&a, &b, &mut x, &GmresConfig::default());
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_gmres_matches_pcg_on_spd() {
        let n = 30;
        let mut builder = SystemBuilder::new(n);
        for i in 0..n {
            builder.add(i, i, 2.5);
            if i > 0 {
                builder.add(i, i - 1, -1.0);
                builder.add(i - 1, i, -1.0);
            }
        }
        let a = builder.build();
        let b: Vec<f64> = (0..n).map(|i| (i as f64).sin()).collect();

        let mut x_cg = vec![0.0; n];
        pcg_solve(&a, &b, &mut x_cg, &PcgConfig::default());
        let mut x_gm = vec![0.0; n];
        gmres_solve(&a, &b, &mut x_gm, &GmresConfig::default());

        let max_diff = x_cg
            .iter()
            .zip(&x_gm)
            .fold(0.0_f64, |m, (p, q)| m.max((p - q).abs()));
        assert!(max_diff < 1e-8, "GMRES and PCG should agree: max diff = {max_diff}");
    }

    #[test]
    fn test_zero_diagonal_row_does_not_produce_nan() {
        // Permutation-like block with a zero diagonal entry
        let mut builder = SystemBuilder::new(2);
        builder.add(0, 1, 1.0);
        builder.add(1, 0, 1.0);
        builder.add(1, 1, 1.0);
        let a = builder.build();
        let mut x = vec![0.0; 2];
        let result = gmres_solve(&a, &[1.0, 3.0], &mut x, &GmresConfig::default());
        assert!(x.iter().all(|v| v.is_finite()));
        assert!(result.converged, "{result:?}");
        assert!((x[0] - 2.0).abs() < 1e-8 && (x[1] - 1.0).abs() < 1e-8);
    }
}
