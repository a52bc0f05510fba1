// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Transport State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use ndarray::{Array2, Array3};
use serde::Serialize;

/// Right-hand-side driver for one group assembly.
#[derive(Debug, Clone)]
pub enum VolumetricSource {
    /// External source, constant per element. Shape [groups, elements].
    Fixed(Array2<f64>),
    /// Frozen fission flux of the previous power iteration [groups, nodes]
    /// together with the current eigenvalue estimate.
    Fission { flux: Array2<f64>, k: f64 },
}

impl VolumetricSource {
    /// Same strength `q` in every group and element.
    pub fn uniform(num_groups: usize, num_elements: usize, q: f64) -> Self {
        VolumetricSource::Fixed(Array2::from_elem((num_groups, num_elements), q))
    }

    /// Source only in `group`, zero elsewhere.
    pub fn single_group(num_groups: usize, num_elements: usize, group: usize, q: f64) -> Self {
        let mut src = Array2::zeros((num_groups, num_elements));
        if group < num_groups {
            src.row_mut(group).fill(q);
        }
        VolumetricSource::Fixed(src)
    }

    pub fn is_fission(&self) -> bool {
        matches!(self, VolumetricSource::Fission { .. })
    }
}

/// Iteration bookkeeping returned with every solve.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SolveReport {
    pub converged: bool,
    /// Gauss-Seidel sweeps, summed over all power iterations.
    pub gauss_seidel_sweeps: usize,
    /// Within-group passes, summed over every group and sweep.
    pub within_group_iterations: usize,
    pub power_iterations: usize,
    /// Relative inf-norm change after each Gauss-Seidel sweep.
    pub residual_history: Vec<f64>,
    /// k after each power iteration (empty for fixed-source solves).
    pub eigenvalue_history: Vec<f64>,
    pub warnings: Vec<String>,
    pub solve_time_ms: f64,
}

/// Final flux fields of a solve.
#[derive(Debug, Clone)]
pub struct TransportSolution {
    /// [groups, nodes]
    pub scalar_flux: Array2<f64>,
    /// [groups, directions, nodes]; only for discrete-ordinates solves.
    pub angular_flux: Option<Array3<f64>>,
    pub eigenvalue: Option<f64>,
    pub report: SolveReport,
}
