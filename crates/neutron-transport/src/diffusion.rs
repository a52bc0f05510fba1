// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Multigroup Diffusion
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Continuous-Galerkin P1 multigroup diffusion.
//!
//! Per group g the weak form is
//!
//! ```text
//! ∫ D ∇φ·∇v + ∫ Σr φ v + ½ ∮_vacuum φ v = ∫ (Σ_{g'≠g} Σs[g'][g] φ_g' + q_g) v
//! ```
//!
//! with D = 1/(3Σt) and Σr = Σt − Σs[g][g]. The Marshak term is assembled
//! per exterior edge, so corner nodes collect both adjacent edges. With
//! vacuum boundaries the right-hand side is only loaded on interior nodes.

use ndarray::{Array1, ArrayView1, ArrayView2};
use neutron_math::cg::pcg_solve;
use neutron_math::mesh::{TriGrid, AREA_QUADRATURE};
use neutron_math::sparse::{LinearSolveResult, SystemBuilder};
use neutron_types::config::{BoundaryCondition, LinearSolverConfig};
use neutron_types::constants::MARSHAK_COEFFICIENT;
use neutron_types::error::TransportResult;
use neutron_types::materials::CrossSectionSet;
use neutron_types::state::VolumetricSource;
use sprs::CsMat;

use crate::formulation::pcg_config;
use crate::source::{flux_at_quadrature, scattering_density, source_density};

#[derive(Debug, Clone, Copy)]
pub struct Diffusion<'a> {
    grid: &'a TriGrid,
    xs: &'a CrossSectionSet,
    boundary: BoundaryCondition,
}

impl<'a> Diffusion<'a> {
    pub fn new(grid: &'a TriGrid, xs: &'a CrossSectionSet, boundary: BoundaryCondition) -> Self {
        Diffusion { grid, xs, boundary }
    }

    pub fn grid(&self) -> &'a TriGrid {
        self.grid
    }

    pub fn xs(&self) -> &'a CrossSectionSet {
        self.xs
    }

    pub fn boundary(&self) -> BoundaryCondition {
        self.boundary
    }

    /// Nodes whose equation carries a source term.
    fn loads_rhs(&self, n: usize) -> bool {
        self.boundary == BoundaryCondition::Reflective || self.grid.is_interior(n)
    }

    /// Stiffness, removal mass and (vacuum only) Marshak edge terms of `group`.
    pub fn make_lhs(&self, group: usize) -> CsMat<f64> {
        let grid = self.grid;
        let mut system = SystemBuilder::new(grid.num_nodes());

        for e in 0..grid.num_elements() {
            let mat = grid.material(e);
            let d = self.xs.diffusion(mat, group);
            let sig_r = self.xs.sig_r(mat, group);
            let area = grid.area(e);
            let grads = grid.gradients(e);
            let mass = grid.element_mass(e);
            let nodes = grid.element_nodes(e);

            for i in 0..3 {
                for j in 0..3 {
                    let stiffness = grads[i][0] * grads[j][0] + grads[i][1] * grads[j][1];
                    system.add(nodes[i], nodes[j], d * area * stiffness + sig_r * mass[i][j]);
                }
            }

            if self.boundary == BoundaryCondition::Vacuum {
                for &edge in grid.element_boundary_edges(e) {
                    let edge_nodes = grid.boundary_edge(edge).nodes;
                    let m = grid.edge_mass(edge);
                    for a in 0..2 {
                        for b in 0..2 {
                            system.add(edge_nodes[a], edge_nodes[b], MARSHAK_COEFFICIENT * m[a][b]);
                        }
                    }
                }
            }
        }

        system.build()
    }

    /// In-scatter from the other groups plus the external or fission source.
    pub fn make_rhs(
        &self,
        group: usize,
        source: &VolumetricSource,
        flux: ArrayView2<f64>,
    ) -> TransportResult<Array1<f64>> {
        let grid = self.grid;
        let mut rhs = Array1::zeros(grid.num_nodes());

        for e in 0..grid.num_elements() {
            let nodes = grid.element_nodes(e);
            if !nodes.iter().any(|&n| self.loads_rhs(n)) {
                continue;
            }
            let mat = grid.material(e);
            let phi_q = flux_at_quadrature(grid, flux, e)?;
            let scatter = scattering_density(self.xs, mat, group, &phi_q, false);
            let external = source_density(grid, self.xs, source, group, e)?;
            let w = grid.area(e) / 3.0;

            for (local, &n) in nodes.iter().enumerate() {
                if !self.loads_rhs(n) {
                    continue;
                }
                rhs[n] += (0..3)
                    .map(|q| w * AREA_QUADRATURE[q][local] * (scatter[q] + external[q]))
                    .sum::<f64>();
            }
        }

        Ok(rhs)
    }

    /// Assemble and solve `group` with PCG, starting from `guess`.
    pub fn solve_group(
        &self,
        group: usize,
        source: &VolumetricSource,
        flux: ArrayView2<f64>,
        guess: ArrayView1<f64>,
        linear: &LinearSolverConfig,
    ) -> TransportResult<(Array1<f64>, LinearSolveResult)> {
        let lhs = self.make_lhs(group);
        let rhs = self.make_rhs(group, source, flux)?.to_vec();
        let mut x = guess.to_vec();
        let result = pcg_solve(&lhs, &rhs, &mut x, &pcg_config(linear));
        Ok((Array1::from(x), result))
    }
}
