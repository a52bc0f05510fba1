// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Upscatter Acceleration
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Two-grid upscatter acceleration of Gauss-Seidel over energy.
//!
//! The Gauss-Seidel error is dominated by the eigenvector ξ of
//! `(T − L − D)⁻¹ U` per material (T total, L/D/U the strictly
//! down-scatter, self-scatter and up-scatter parts). After each sweep
//! the flux is corrected by `ε(r) ξ`, where the amplitude ε solves the
//! energy-collapsed diffusion problem
//!
//! ```text
//! −∇·⟨D⟩∇ε + ⟨Σa⟩ ε + ½ ∮_vacuum ε = Σ_g Σ_{g'>g} Σs[g'][g] (φ_g' − φ_g'^prev)
//! ```
//!
//! with `⟨D⟩ = Σ_g D_g ξ_g` and `⟨Σa⟩ = Σ_g Σa_g ξ_g`. In an infinite
//! medium ε is flat and the correction is exact.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use neutron_math::cg::pcg_solve;
use neutron_math::linalg::{forward_substitution, power_iteration};
use neutron_math::mesh::TriGrid;
use neutron_math::sparse::{LinearSolveResult, SystemBuilder};
use neutron_types::config::{BoundaryCondition, LinearSolverConfig};
use neutron_types::constants::MARSHAK_COEFFICIENT;
use neutron_types::error::{TransportError, TransportResult};
use neutron_types::materials::CrossSectionSet;
use sprs::CsMat;

use crate::formulation::pcg_config;

const SPECTRUM_MAX_ITER: usize = 1000;
const SPECTRUM_TOL: f64 = 1e-12;

/// Dominant Gauss-Seidel error mode of one material, sum-normalised.
///
/// Zero for materials without upscatter.
pub fn material_spectrum(xs: &CrossSectionSet, mat: usize) -> TransportResult<Array1<f64>> {
    let g = xs.num_groups();
    if !xs.has_upscatter(mat) {
        return Ok(Array1::zeros(g));
    }
    let s = xs.scattering(mat);

    // Rows are the receiving group, columns the emitting group
    let lower = Array2::from_shape_fn((g, g), |(to, from)| {
        if from > to {
            0.0
        } else if from == to {
            xs.sig_t(mat, to) - s[[from, to]]
        } else {
            -s[[from, to]]
        }
    });
    let upper = Array2::from_shape_fn((g, g), |(to, from)| if from > to { s[[from, to]] } else { 0.0 });

    if let Some(bad) = (0..g).find(|&i| lower[[i, i]] <= 0.0) {
        return Err(TransportError::LinAlg(format!(
            "material '{}': removal cross section of group {bad} is not positive",
            xs.name(mat)
        )));
    }

    let result = power_iteration(
        g,
        |v| {
            forward_substitution(lower.view(), upper.dot(v).view())
                .unwrap_or_else(|_| Array1::zeros(g))
        },
        SPECTRUM_MAX_ITER,
        SPECTRUM_TOL,
    );
    if !result.converged {
        log::warn!(
            "upscatter spectrum of material '{}' not converged after {} iterations",
            xs.name(mat),
            result.iterations
        );
    }
    log::debug!(
        "material '{}': Gauss-Seidel spectral radius {:.6}",
        xs.name(mat),
        result.eigenvalue
    );
    Ok(result.eigenvector)
}

/// Outcome of one correction.
#[derive(Debug, Clone, Copy)]
pub struct Correction {
    /// max |ε| over the nodes.
    pub amplitude: f64,
    pub linear: LinearSolveResult,
}

#[derive(Debug, Clone)]
pub struct UpscatterAccelerator<'a> {
    grid: &'a TriGrid,
    xs: &'a CrossSectionSet,
    boundary: BoundaryCondition,
    /// [materials, groups]
    spectra: Array2<f64>,
    /// [groups, nodes]
    nodal: Array2<f64>,
    /// Energy-collapsed operator for ε.
    operator: CsMat<f64>,
}

impl<'a> UpscatterAccelerator<'a> {
    pub fn new(
        grid: &'a TriGrid,
        xs: &'a CrossSectionSet,
        boundary: BoundaryCondition,
    ) -> TransportResult<Self> {
        let groups = xs.num_groups();
        let mut spectra = Array2::zeros((xs.num_materials(), groups));
        for mat in 0..xs.num_materials() {
            spectra.row_mut(mat).assign(&material_spectrum(xs, mat)?);
        }

        // Area-weighted average of the adjacent elements' spectra
        let mut nodal = Array2::zeros((groups, grid.num_nodes()));
        let mut weight = vec![0.0; grid.num_nodes()];
        let mut coupled = vec![false; grid.num_nodes()];
        let mut system = SystemBuilder::new(grid.num_nodes());
        for e in 0..grid.num_elements() {
            let mat = grid.material(e);
            let area = grid.area(e);
            let xi = spectra.row(mat);
            let nodes = grid.element_nodes(e);
            for &n in nodes.iter() {
                weight[n] += area / 3.0;
                for g in 0..groups {
                    nodal[[g, n]] += area / 3.0 * xi[g];
                }
            }

            let xi_sum = xi.sum();
            if xi_sum <= 0.0 {
                continue;
            }
            let d = (0..groups).map(|g| xs.diffusion(mat, g) * xi[g]).sum::<f64>();
            let sig_a = (0..groups).map(|g| xs.sig_a(mat, g) * xi[g]).sum::<f64>();
            let grads = grid.gradients(e);
            let mass = grid.element_mass(e);
            for i in 0..3 {
                coupled[nodes[i]] = true;
                for j in 0..3 {
                    let stiffness = grads[i][0] * grads[j][0] + grads[i][1] * grads[j][1];
                    system.add(nodes[i], nodes[j], d * area * stiffness + sig_a * mass[i][j]);
                }
            }
            if boundary == BoundaryCondition::Vacuum {
                for &edge in grid.element_boundary_edges(e) {
                    let edge_nodes = grid.boundary_edge(edge).nodes;
                    let m = grid.edge_mass(edge);
                    for a in 0..2 {
                        for b in 0..2 {
                            system.add(edge_nodes[a], edge_nodes[b], MARSHAK_COEFFICIENT * xi_sum * m[a][b]);
                        }
                    }
                }
            }
        }
        for (n, &w) in weight.iter().enumerate() {
            if w > 0.0 {
                nodal.column_mut(n).mapv_inplace(|v| v / w);
            }
            // Nodes away from upscattering material carry no correction
            if !coupled[n] {
                system.add(n, n, 1.0);
            }
        }

        Ok(UpscatterAccelerator {
            grid,
            xs,
            boundary,
            spectra,
            nodal,
            operator: system.build(),
        })
    }

    pub fn spectrum(&self, mat: usize) -> ArrayView1<'_, f64> {
        self.spectra.row(mat)
    }

    pub fn nodal_eigenfunction(&self) -> ArrayView2<'_, f64> {
        self.nodal.view()
    }

    pub fn operator(&self) -> &CsMat<f64> {
        &self.operator
    }

    /// Upscatter of the sweep change `flux − previous`, lumped to nodes.
    /// With vacuum boundaries only interior nodes are loaded.
    pub fn residual_source(&self, flux: ArrayView2<f64>, previous: ArrayView2<f64>) -> Array1<f64> {
        let grid = self.grid;
        let groups = self.xs.num_groups();
        let mut rhs = Array1::zeros(grid.num_nodes());
        for e in 0..grid.num_elements() {
            let mat = grid.material(e);
            if !self.xs.has_upscatter(mat) {
                continue;
            }
            let mut local = 0.0;
            for from in 1..groups {
                let change = grid.interpolate_to_centroid(e, flux.row(from))
                    - grid.interpolate_to_centroid(e, previous.row(from));
                for to in 0..from {
                    local += self.xs.sig_s(mat, from, to) * change;
                }
            }
            let w = grid.area(e) / 3.0 * local;
            for &n in grid.element_nodes(e).iter() {
                if self.boundary == BoundaryCondition::Reflective || grid.is_interior(n) {
                    rhs[n] += w;
                }
            }
        }
        rhs
    }

    /// Error amplitude ε at the nodes.
    pub fn epsilon(
        &self,
        flux: ArrayView2<f64>,
        previous: ArrayView2<f64>,
        linear: &LinearSolverConfig,
    ) -> (Array1<f64>, LinearSolveResult) {
        let rhs = self.residual_source(flux, previous).to_vec();
        let mut x = vec![0.0; rhs.len()];
        let result = pcg_solve(&self.operator, &rhs, &mut x, &pcg_config(linear));
        (Array1::from(x), result)
    }

    /// Add `ε ξ` to `flux` in place.
    pub fn correct(
        &self,
        flux: &mut Array2<f64>,
        previous: ArrayView2<f64>,
        linear: &LinearSolverConfig,
    ) -> Correction {
        let (eps, result) = self.epsilon(flux.view(), previous, linear);
        for ((g, n), v) in flux.indexed_iter_mut() {
            *v += eps[n] * self.nodal[[g, n]];
        }
        Correction {
            amplitude: eps.iter().fold(0.0_f64, |m, v| m.max(v.abs())),
            linear: result,
        }
    }
}
