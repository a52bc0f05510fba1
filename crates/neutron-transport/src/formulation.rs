// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Transport Formulations
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! The spatial/angular discretisation driven by the iterative solver.

use ndarray::{Array1, Array2, ArrayView2};
use neutron_math::cg::PcgConfig;
use neutron_math::gmres::GmresConfig;
use neutron_math::mesh::TriGrid;
use neutron_math::sparse::LinearSolveResult;
use neutron_types::config::{BoundaryCondition, LinearSolverConfig};
use neutron_types::error::{TransportError, TransportResult};
use neutron_types::materials::CrossSectionSet;
use neutron_types::state::VolumetricSource;

use crate::diffusion::Diffusion;
use crate::nda::Nda;
use crate::saaf::Saaf;

pub(crate) fn pcg_config(linear: &LinearSolverConfig) -> PcgConfig {
    PcgConfig {
        max_iter: linear.max_iterations,
        tol: linear.tolerance,
    }
}

/// GMRES restarts are sized so the total Krylov budget matches
/// `max_iterations`.
pub(crate) fn gmres_config(linear: &LinearSolverConfig) -> GmresConfig {
    let restart = linear.restart.max(1);
    GmresConfig {
        restart,
        max_iter: linear.max_iterations.div_ceil(restart).max(1),
        tol: linear.tolerance,
    }
}

/// One Krylov solve performed inside a group step.
#[derive(Debug, Clone, Copy)]
pub struct LinearRecord {
    /// Discrete direction for SAAF solves, `None` for scalar-flux solves.
    pub direction: Option<usize>,
    pub result: LinearSolveResult,
}

/// Outcome of one within-group pass.
#[derive(Debug)]
pub struct GroupStep {
    pub scalar: Array1<f64>,
    /// [directions, nodes] for angular formulations.
    pub angular: Option<Array2<f64>>,
    pub linear: Vec<LinearRecord>,
    /// Non-fatal problems the step recovered from.
    pub warnings: Vec<TransportError>,
}

#[derive(Debug, Clone, Copy)]
pub enum Formulation<'a> {
    Diffusion(Diffusion<'a>),
    DiscreteOrdinates(Saaf<'a>),
    Acceleration(Nda<'a>),
}

impl<'a> Formulation<'a> {
    pub fn grid(&self) -> &'a TriGrid {
        match self {
            Formulation::Diffusion(d) => d.grid(),
            Formulation::DiscreteOrdinates(s) => s.grid(),
            Formulation::Acceleration(n) => n.diffusion().grid(),
        }
    }

    pub fn xs(&self) -> &'a CrossSectionSet {
        match self {
            Formulation::Diffusion(d) => d.xs(),
            Formulation::DiscreteOrdinates(s) => s.xs(),
            Formulation::Acceleration(n) => n.diffusion().xs(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Formulation::Diffusion(_) => "diffusion",
            Formulation::DiscreteOrdinates(_) => "SAAF",
            Formulation::Acceleration(_) => "NDA",
        }
    }

    /// NDA runs a high-order SAAF sweep inside every low-order pass.
    pub fn requires_high_order_solve(&self) -> bool {
        matches!(self, Formulation::Acceleration(_))
    }

    pub fn has_angular_flux(&self) -> bool {
        !matches!(self, Formulation::Diffusion(_))
    }

    /// The boundary condition the formulation was assembled with.
    pub fn boundary(&self) -> BoundaryCondition {
        match self {
            Formulation::Diffusion(d) => d.boundary(),
            Formulation::DiscreteOrdinates(_) => BoundaryCondition::Vacuum,
            Formulation::Acceleration(n) => n.diffusion().boundary(),
        }
    }

    /// Reject boundary conditions the formulation cannot represent.
    pub fn check_boundary(&self, requested: BoundaryCondition) -> TransportResult<()> {
        if self.has_angular_flux() && requested == BoundaryCondition::Reflective {
            return Err(TransportError::ConfigError(format!(
                "{} supports vacuum boundaries only",
                self.name()
            )));
        }
        if let Formulation::Acceleration(nda) = self {
            if !std::ptr::eq(nda.diffusion().grid(), nda.high_order().grid())
                || !std::ptr::eq(nda.diffusion().xs(), nda.high_order().xs())
            {
                return Err(TransportError::ConfigError(
                    "NDA low- and high-order solvers must share mesh and cross sections".to_string(),
                ));
            }
        }
        if self.boundary() != requested {
            return Err(TransportError::ConfigError(format!(
                "{} was assembled for {:?} boundaries but {:?} was requested",
                self.name(),
                self.boundary(),
                requested
            )));
        }
        Ok(())
    }

    /// Work done once per group before its within-group iteration. NDA
    /// seeds the group with a plain diffusion solve.
    pub fn prepare_group(
        &self,
        group: usize,
        source: &VolumetricSource,
        flux: &mut Array2<f64>,
        linear: &LinearSolverConfig,
    ) -> TransportResult<Vec<LinearRecord>> {
        match self {
            Formulation::Acceleration(nda) => {
                let (phi, result) = nda.diffusion().solve_group(
                    group,
                    source,
                    flux.view(),
                    flux.row(group),
                    linear,
                )?;
                flux.row_mut(group).assign(&phi);
                Ok(vec![LinearRecord {
                    direction: None,
                    result,
                }])
            }
            _ => Ok(Vec::new()),
        }
    }

    /// One within-group pass at the current flux estimate. `angular` is
    /// the previous angular flux of this group, used as Krylov guess.
    pub fn group_step(
        &self,
        group: usize,
        source: &VolumetricSource,
        flux: ArrayView2<f64>,
        angular: Option<ArrayView2<f64>>,
        linear: &LinearSolverConfig,
    ) -> TransportResult<GroupStep> {
        match self {
            Formulation::Diffusion(d) => {
                let (scalar, result) = d.solve_group(group, source, flux, flux.row(group), linear)?;
                Ok(GroupStep {
                    scalar,
                    angular: None,
                    linear: vec![LinearRecord {
                        direction: None,
                        result,
                    }],
                    warnings: Vec::new(),
                })
            }
            Formulation::DiscreteOrdinates(s) => {
                let sweep = s.sweep_group(group, source, flux, angular, linear)?;
                Ok(GroupStep {
                    scalar: sweep.scalar,
                    angular: Some(sweep.angular),
                    linear: sweep
                        .linear
                        .into_iter()
                        .enumerate()
                        .map(|(d, result)| LinearRecord {
                            direction: Some(d),
                            result,
                        })
                        .collect(),
                    warnings: Vec::new(),
                })
            }
            Formulation::Acceleration(nda) => nda.group_step(group, source, flux, angular, linear),
        }
    }
}
