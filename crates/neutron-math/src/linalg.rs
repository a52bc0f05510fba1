//! Small dense linear algebra and vector norms.
//!
//! Dominant-eigenpair power iteration, forward substitution for lower
//! triangular systems, and the norm/relative-change measures used as
//! convergence criteria by the transport iterations.

use ndarray::{Array1, ArrayView1, ArrayView2};
use neutron_types::error::{TransportError, TransportResult};

/// Dominant eigenpair from [`power_iteration`].
#[derive(Debug, Clone)]
pub struct PowerIterationResult {
    pub eigenvalue: f64,
    /// Normalised so that the entries sum to one (or max-abs one if the
    /// sum vanishes).
    pub eigenvector: Array1<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Dominant eigenpair of a linear operator given only by its action.
///
/// Starting from a vector of ones, repeatedly applies `apply` and
/// rescales; the eigenvalue estimate is the ratio of successive max-norms.
/// Stops when both the eigenvalue and the normalised vector change by less
/// than `tol`. A zero image (nilpotent or null operator) returns
/// eigenvalue 0 with the last non-zero iterate.
pub fn power_iteration<F>(n: usize, apply: F, max_iter: usize, tol: f64) -> PowerIterationResult
where
    F: Fn(&Array1<f64>) -> Array1<f64>,
{
    let mut v = Array1::from_elem(n, 1.0 / (n.max(1) as f64));
    let mut lambda = 0.0;

    for iter in 1..=max_iter {
        let w = apply(&v);
        let w_norm = inf_norm(w.view());
        if w_norm < 1e-300 {
            return PowerIterationResult {
                eigenvalue: 0.0,
                eigenvector: normalise_sum(v),
                iterations: iter,
                converged: true,
            };
        }
        let v_norm = inf_norm(v.view());
        let lambda_new = w_norm / v_norm;
        let w = w / w_norm;
        let change = l2_distance(w.view(), (&v / v_norm).view());
        let done = (lambda_new - lambda).abs() < tol * lambda_new.abs().max(1.0) && change < tol;
        lambda = lambda_new;
        v = w;
        if done {
            return PowerIterationResult {
                eigenvalue: lambda,
                eigenvector: normalise_sum(v),
                iterations: iter,
                converged: true,
            };
        }
    }

    PowerIterationResult {
        eigenvalue: lambda,
        eigenvector: normalise_sum(v),
        iterations: max_iter,
        converged: false,
    }
}

fn normalise_sum(v: Array1<f64>) -> Array1<f64> {
    let s = v.sum();
    if s.abs() > 1e-300 {
        v / s
    } else {
        let m = inf_norm(v.view()).max(1e-300);
        v / m
    }
}

/// Solve `L x = b` for lower-triangular `L`.
pub fn forward_substitution(l: ArrayView2<f64>, b: ArrayView1<f64>) -> TransportResult<Array1<f64>> {
    let n = b.len();
    if l.dim() != (n, n) {
        return Err(TransportError::LinAlg(format!(
            "forward substitution: matrix {:?} does not match rhs length {n}",
            l.dim()
        )));
    }
    let mut x = Array1::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[[i, j]] * x[j];
        }
        let d = l[[i, i]];
        if d.abs() < 1e-300 {
            return Err(TransportError::LinAlg(format!(
                "forward substitution: zero pivot in row {i}"
            )));
        }
        x[i] = sum / d;
    }
    Ok(x)
}

pub fn inf_norm(v: ArrayView1<f64>) -> f64 {
    v.iter().fold(0.0_f64, |m, x| m.max(x.abs()))
}

pub fn l2_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// ‖new − old‖∞ / ‖new‖∞, with the absolute change returned when `new`
/// vanishes.
pub fn relative_change_inf<'a, I>(new: I, old: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut diff = 0.0_f64;
    let mut scale = 0.0_f64;
    for (n, o) in new.into_iter().zip(old) {
        diff = diff.max((n - o).abs());
        scale = scale.max(n.abs());
    }
    if scale > 1e-300 {
        diff / scale
    } else {
        diff
    }
}
