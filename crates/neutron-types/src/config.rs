// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Transport Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

/// Kind of problem handed to the iterative solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    /// External volumetric source, flux is the answer.
    #[default]
    FixedSource,
    /// Criticality: dominant eigenpair (k, φ) by power iteration.
    Eigenvalue,
}

/// Exterior boundary treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryCondition {
    /// No incoming particles (Marshak for diffusion, outflow-only for SAAF).
    #[default]
    Vacuum,
    /// Zero net current; diffusion-type operators only.
    Reflective,
}

/// Cap and tolerance for one iteration level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationLimits {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl IterationLimits {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        IterationLimits {
            max_iterations,
            tolerance,
        }
    }

    fn validate(&self, stage: &str) -> TransportResult<()> {
        if self.max_iterations == 0 {
            return Err(TransportError::ConfigError(format!(
                "{stage}: max_iterations must be at least 1"
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(TransportError::ConfigError(format!(
                "{stage}: tolerance must be finite and > 0, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Krylov solver settings shared by PCG and GMRES.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearSolverConfig {
    /// Krylov iteration budget; GMRES spends it in restart cycles.
    #[serde(default = "default_linear_max_iter")]
    pub max_iterations: usize,
    /// Relative residual tolerance.
    #[serde(default = "default_linear_tol")]
    pub tolerance: f64,
    /// GMRES subspace size before restart.
    #[serde(default = "default_gmres_restart")]
    pub restart: usize,
}

fn default_linear_max_iter() -> usize {
    2000
}
fn default_linear_tol() -> f64 {
    1e-10
}
fn default_gmres_restart() -> usize {
    40
}

impl Default for LinearSolverConfig {
    fn default() -> Self {
        LinearSolverConfig {
            max_iterations: default_linear_max_iter(),
            tolerance: default_linear_tol(),
            restart: default_gmres_restart(),
        }
    }
}

fn default_within_group() -> IterationLimits {
    IterationLimits::new(1000, 1e-6)
}
fn default_gauss_seidel() -> IterationLimits {
    IterationLimits::new(50, 1e-5)
}
fn default_eigenvalue() -> IterationLimits {
    IterationLimits::new(1000, 1e-5)
}

/// Top-level solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub problem: ProblemType,
    #[serde(default)]
    pub boundary: BoundaryCondition,
    /// Self-scattering fixed point for one group.
    #[serde(default = "default_within_group")]
    pub within_group: IterationLimits,
    /// Outer sweep over energy groups.
    #[serde(default = "default_gauss_seidel")]
    pub gauss_seidel: IterationLimits,
    /// Power iteration; tolerance applies to both |Δk| and ‖Δφ‖₂.
    #[serde(default = "default_eigenvalue")]
    pub eigenvalue: IterationLimits,
    #[serde(default)]
    pub linear: LinearSolverConfig,
    #[serde(default)]
    pub upscatter_acceleration: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            problem: ProblemType::default(),
            boundary: BoundaryCondition::default(),
            within_group: default_within_group(),
            gauss_seidel: default_gauss_seidel(),
            eigenvalue: default_eigenvalue(),
            linear: LinearSolverConfig::default(),
            upscatter_acceleration: false,
        }
    }
}

impl TransportConfig {
    /// Load from JSON file and validate.
    pub fn from_file(path: &str) -> TransportResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make an iteration level meaningless.
    pub fn validate(&self) -> TransportResult<()> {
        self.within_group.validate("within_group")?;
        self.gauss_seidel.validate("gauss_seidel")?;
        self.eigenvalue.validate("eigenvalue")?;
        IterationLimits::new(self.linear.max_iterations, self.linear.tolerance)
            .validate("linear")?;
        if self.linear.restart == 0 {
            return Err(TransportError::ConfigError(
                "linear: GMRES restart must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
