//! Sparse assembly and CSR helpers shared by the Krylov solvers.
//!
//! Element contributions are accumulated in a `sprs::TriMat`; duplicate
//! entries are summed on conversion to CSR.

use sprs::{CsMat, TriMat};

/// Outcome of an iterative linear solve.
#[derive(Debug, Clone, Copy)]
pub struct LinearSolveResult {
    /// Krylov iterations (matrix-vector products) performed.
    pub iterations: usize,
    /// Final true residual ‖b − A·x‖₂ / ‖b‖₂.
    pub residual: f64,
    pub converged: bool,
}

/// Triplet accumulator for an `n × n` system.
#[derive(Debug)]
pub struct SystemBuilder {
    triplets: TriMat<f64>,
}

impl SystemBuilder {
    pub fn new(n: usize) -> Self {
        SystemBuilder {
            triplets: TriMat::new((n, n)),
        }
    }

    /// Accumulate `value` at (row, col). Exact zeros are skipped.
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value != 0.0 {
            self.triplets.add_triplet(row, col, value);
        }
    }

    pub fn build(&self) -> CsMat<f64> {
        self.triplets.to_csr()
    }
}

/// `y = A · x`
pub fn spmv(a: &CsMat<f64>, x: &[f64], y: &mut [f64]) {
    for (row, vec) in a.outer_iterator().enumerate() {
        y[row] = vec.iter().map(|(col, &v)| v * x[col]).sum();
    }
}

/// Entry (row, col), zero if not stored.
pub fn entry(a: &CsMat<f64>, row: usize, col: usize) -> f64 {
    a.get(row, col).copied().unwrap_or(0.0)
}

pub fn diagonal(a: &CsMat<f64>) -> Vec<f64> {
    (0..a.rows()).map(|i| entry(a, i, i)).collect()
}

/// ‖A − Aᵀ‖_max ≤ tol · max|A|
pub fn is_symmetric(a: &CsMat<f64>, tol: f64) -> bool {
    let scale = a.data().iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1e-300);
    a.outer_iterator().enumerate().all(|(row, vec)| {
        vec.iter()
            .all(|(col, &v)| (v - entry(a, col, row)).abs() <= tol * scale)
    })
}

/// ‖b − A·x‖₂
pub fn residual_norm(a: &CsMat<f64>, x: &[f64], b: &[f64]) -> f64 {
    let mut ax = vec![0.0; b.len()];
    spmv(a, x, &mut ax);
    ax.iter()
        .zip(b)
        .map(|(axi, bi)| (bi - axi) * (bi - axi))
        .sum::<f64>()
        .sqrt()
}

// ───────────────────────── BLAS-like helpers ─────────────────────────

#[inline]
pub(crate) fn vec_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

#[inline]
pub(crate) fn vec_dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// `y += alpha · x`
#[inline]
pub(crate) fn vec_axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// Jacobi preconditioner: inverse diagonal, zero diagonals treated as 1.
pub(crate) fn jacobi_inverse(a: &CsMat<f64>) -> Vec<f64> {
    diagonal(a)
        .into_iter()
        .map(|d| if d.abs() > 1e-300 { 1.0 / d } else { 1.0 })
        .collect()
}
