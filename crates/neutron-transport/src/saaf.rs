// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Self-Adjoint Angular Flux Transport
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! S2 discrete ordinates in self-adjoint angular flux (SAAF) form.
//!
//! For each direction Ω the second-order equation
//!
//! ```text
//! ∫ (1/Σt)(Ω·∇ψ)(Ω·∇v) + ∫ Σt ψ v + ∮_{Ω·n>0} (Ω·n) ψ v
//!     = ∫ S v/4π + ∫ (1/Σt)(Ω·∇v) S/4π
//! ```
//!
//! is symmetric positive definite and solved with PCG. The emission
//! density S includes within-group scattering. Only vacuum boundaries
//! are supported: incoming directions carry no boundary term.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use neutron_math::cg::pcg_solve;
use neutron_math::mesh::{TriGrid, AREA_QUADRATURE};
use neutron_math::sparse::{LinearSolveResult, SystemBuilder};
use neutron_types::config::LinearSolverConfig;
use neutron_types::constants::{FOUR_PI, NUM_DIRECTIONS, S2_DIRECTIONS, S2_WEIGHT};
use neutron_types::error::TransportResult;
use neutron_types::materials::CrossSectionSet;
use neutron_types::state::VolumetricSource;
use rayon::prelude::*;
use sprs::CsMat;

use crate::formulation::pcg_config;
use crate::source::{flux_at_quadrature, scattering_density, source_density};

#[inline]
fn streaming(omega: [f64; 2], grad: [f64; 2]) -> f64 {
    omega[0] * grad[0] + omega[1] * grad[1]
}

/// Angular and scalar flux of one group after a full direction sweep.
#[derive(Debug, Clone)]
pub struct GroupSweep {
    /// Σ_d w_d ψ_d per node.
    pub scalar: Array1<f64>,
    /// [directions, nodes]
    pub angular: Array2<f64>,
    /// One result per direction, in direction order.
    pub linear: Vec<LinearSolveResult>,
}

#[derive(Debug, Clone, Copy)]
pub struct Saaf<'a> {
    grid: &'a TriGrid,
    xs: &'a CrossSectionSet,
}

impl<'a> Saaf<'a> {
    pub fn new(grid: &'a TriGrid, xs: &'a CrossSectionSet) -> Self {
        Saaf { grid, xs }
    }

    pub fn grid(&self) -> &'a TriGrid {
        self.grid
    }

    pub fn xs(&self) -> &'a CrossSectionSet {
        self.xs
    }

    pub fn make_lhs(&self, direction: usize, group: usize) -> CsMat<f64> {
        let grid = self.grid;
        let omega = S2_DIRECTIONS[direction];
        let mut system = SystemBuilder::new(grid.num_nodes());

        for e in 0..grid.num_elements() {
            let mat = grid.material(e);
            let sig_t = self.xs.sig_t(mat, group);
            let inv_sig_t = self.xs.inv_sig_t(mat, group);
            let area = grid.area(e);
            let grads = grid.gradients(e);
            let mass = grid.element_mass(e);
            let nodes = grid.element_nodes(e);
            let stream = grads.map(|g| streaming(omega, g));

            for i in 0..3 {
                for j in 0..3 {
                    system.add(
                        nodes[i],
                        nodes[j],
                        inv_sig_t * area * stream[i] * stream[j] + sig_t * mass[i][j],
                    );
                }
            }

            // Outflow edges only; a whole-element corner sees both of its edges
            for &edge in grid.element_boundary_edges(e) {
                let be = grid.boundary_edge(edge);
                let outflow = streaming(omega, be.normal);
                if outflow <= 0.0 {
                    continue;
                }
                let m = grid.edge_mass(edge);
                for a in 0..2 {
                    for b in 0..2 {
                        system.add(be.nodes[a], be.nodes[b], outflow * m[a][b]);
                    }
                }
            }
        }

        system.build()
    }

    /// Isotropic emission density S/4π of `group` at each element's
    /// quadrature points.
    pub fn emission_density(
        &self,
        group: usize,
        source: &VolumetricSource,
        flux: ArrayView2<f64>,
    ) -> TransportResult<Vec<[f64; 3]>> {
        (0..self.grid.num_elements())
            .map(|e| {
                let mat = self.grid.material(e);
                let phi_q = flux_at_quadrature(self.grid, flux, e)?;
                let scatter = scattering_density(self.xs, mat, group, &phi_q, true);
                let external = source_density(self.grid, self.xs, source, group, e)?;
                Ok([0, 1, 2].map(|q| (scatter[q] + external[q]) / FOUR_PI))
            })
            .collect()
    }

    /// Right-hand side of one direction from a precomputed emission density.
    pub fn rhs_from_emission(&self, direction: usize, group: usize, emission: &[[f64; 3]]) -> Array1<f64> {
        let grid = self.grid;
        let omega = S2_DIRECTIONS[direction];
        let mut rhs = Array1::zeros(grid.num_nodes());

        for (e, density) in emission.iter().enumerate() {
            let inv_sig_t = self.xs.inv_sig_t(grid.material(e), group);
            let w = grid.area(e) / 3.0;
            let total: f64 = density.iter().map(|s| w * s).sum();
            let grads = grid.gradients(e);

            for (local, &n) in grid.element_nodes(e).iter().enumerate() {
                let volume: f64 = (0..3).map(|q| w * AREA_QUADRATURE[q][local] * density[q]).sum();
                rhs[n] += volume + inv_sig_t * streaming(omega, grads[local]) * total;
            }
        }

        rhs
    }

    pub fn make_rhs(
        &self,
        direction: usize,
        group: usize,
        source: &VolumetricSource,
        flux: ArrayView2<f64>,
    ) -> TransportResult<Array1<f64>> {
        let emission = self.emission_density(group, source, flux)?;
        Ok(self.rhs_from_emission(direction, group, &emission))
    }

    /// Solve every direction of `group` at the current scalar flux.
    ///
    /// Directions are independent and run on the rayon pool; results are
    /// gathered in direction order and the scalar flux summed sequentially,
    /// so the outcome does not depend on thread scheduling.
    pub fn sweep_group(
        &self,
        group: usize,
        source: &VolumetricSource,
        flux: ArrayView2<f64>,
        guess: Option<ArrayView2<f64>>,
        linear: &LinearSolverConfig,
    ) -> TransportResult<GroupSweep> {
        let emission = self.emission_density(group, source, flux)?;
        let config = pcg_config(linear);
        let initial = |d: usize| -> Vec<f64> {
            match guess {
                Some(g) => g.row(d).to_vec(),
                None => flux.row(group).iter().map(|v| v / FOUR_PI).collect(),
            }
        };

        let solved: Vec<(Vec<f64>, LinearSolveResult)> = (0..NUM_DIRECTIONS)
            .into_par_iter()
            .map(|d| {
                let lhs = self.make_lhs(d, group);
                let rhs = self.rhs_from_emission(d, group, &emission).to_vec();
                let mut psi = initial(d);
                let result = pcg_solve(&lhs, &rhs, &mut psi, &config);
                (psi, result)
            })
            .collect();

        let n = self.grid.num_nodes();
        let mut angular = Array2::zeros((NUM_DIRECTIONS, n));
        let mut scalar = Array1::zeros(n);
        let mut results = Vec::with_capacity(NUM_DIRECTIONS);
        for (d, (psi, result)) in solved.into_iter().enumerate() {
            let psi = ArrayView1::from(&psi[..]);
            scalar.scaled_add(S2_WEIGHT, &psi);
            angular.row_mut(d).assign(&psi);
            results.push(result);
        }

        Ok(GroupSweep {
            scalar,
            angular,
            linear: results,
        })
    }
}
