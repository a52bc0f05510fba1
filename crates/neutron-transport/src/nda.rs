// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Nonlinear Diffusion Acceleration
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Nonlinear diffusion acceleration of the SAAF solve.
//!
//! Every pass runs a high-order SAAF sweep, then solves a low-order
//! diffusion equation carrying a drift term built from the angular flux:
//!
//! ```text
//! ∫ D ∇φ·∇v + ∫ Σr φ v + ∫ ∇v · Σ_j drift_j φ_j = ∫ (in-scatter + q) v
//! drift_j = Σ_d w_d [ (1/Σt) Ω_d (Ω_d·∇u_j) − D ∇u_j ] ψ_d,j / φ_LO,j
//! ```
//!
//! Interior rows only; boundary rows pin φ to the high-order scalar flux.
//! At the fixed point the low-order solution reproduces the high-order
//! scalar flux. The system is non-symmetric and solved with GMRES.

use ndarray::{Array1, ArrayView1, ArrayView2};
use neutron_math::gmres::gmres_solve;
use neutron_math::linalg::{inf_norm, l2_distance};
use neutron_math::sparse::SystemBuilder;
use neutron_types::config::{IterationLimits, LinearSolverConfig, ProblemType};
use neutron_types::constants::{NDA_FLUX_FLOOR, S2_DIRECTIONS, S2_WEIGHT};
use neutron_types::error::{TransportError, TransportResult};
use neutron_types::state::VolumetricSource;
use sprs::CsMat;

use crate::diffusion::Diffusion;
use crate::formulation::{gmres_config, GroupStep, LinearRecord};
use crate::saaf::Saaf;

/// Result of [`Nda::solve_system`].
#[derive(Debug, Clone)]
pub struct NdaSolution {
    pub flux: Array1<f64>,
    /// Only for eigenvalue problems.
    pub eigenvalue: Option<f64>,
    /// Power iterations, or Krylov iterations for a fixed-source solve.
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Nda<'a> {
    diffusion: Diffusion<'a>,
    high_order: &'a Saaf<'a>,
}

impl<'a> Nda<'a> {
    pub fn new(diffusion: Diffusion<'a>, high_order: &'a Saaf<'a>) -> Self {
        Nda {
            diffusion,
            high_order,
        }
    }

    pub fn diffusion(&self) -> &Diffusion<'a> {
        &self.diffusion
    }

    pub fn high_order(&self) -> &'a Saaf<'a> {
        self.high_order
    }

    fn check_flux_floor(group: usize, lo_flux: ArrayView1<f64>) -> TransportResult<()> {
        let peak = inf_norm(lo_flux);
        if !peak.is_finite() || peak == 0.0 {
            return Err(TransportError::NumericalHazard {
                location: format!("NDA group {group}"),
                message: format!("low-order flux has no usable scale (max |φ| = {peak})"),
            });
        }
        if let Some(n) = lo_flux
            .iter()
            .position(|v| !v.is_finite() || v.abs() < NDA_FLUX_FLOOR * peak)
        {
            return Err(TransportError::NumericalHazard {
                location: format!("NDA group {group}, node {n}"),
                message: format!(
                    "low-order flux {:e} below floor {:e} of peak {peak:e}",
                    lo_flux[n], NDA_FLUX_FLOOR
                ),
            });
        }
        Ok(())
    }

    /// Low-order operator with the drift closure from `angular`
    /// ([directions, nodes]) normalised by `lo_flux`.
    ///
    /// Fails with `NumericalHazard` if any |φ_LO| is below
    /// `NDA_FLUX_FLOOR · max|φ_LO|`.
    pub fn make_lhs(
        &self,
        group: usize,
        angular: ArrayView2<f64>,
        lo_flux: ArrayView1<f64>,
    ) -> TransportResult<CsMat<f64>> {
        Self::check_flux_floor(group, lo_flux)?;

        let grid = self.diffusion.grid();
        let xs = self.diffusion.xs();
        let mut system = SystemBuilder::new(grid.num_nodes());

        for e in 0..grid.num_elements() {
            let nodes = grid.element_nodes(e);
            if nodes.iter().all(|&n| grid.is_boundary(n)) {
                continue;
            }
            let mat = grid.material(e);
            let d = xs.diffusion(mat, group);
            let inv_sig_t = xs.inv_sig_t(mat, group);
            let sig_r = xs.sig_r(mat, group);
            let area = grid.area(e);
            let grads = grid.gradients(e);
            let mass = grid.element_mass(e);

            let mut drift = [[0.0; 2]; 3];
            for (j, &nj) in nodes.iter().enumerate() {
                let grad = grads[j];
                for (dir, omega) in S2_DIRECTIONS.iter().enumerate() {
                    let psi = angular[[dir, nj]];
                    let stream = omega[0] * grad[0] + omega[1] * grad[1];
                    for c in 0..2 {
                        drift[j][c] += S2_WEIGHT * (inv_sig_t * omega[c] * stream - d * grad[c]) * psi;
                    }
                }
                let phi = lo_flux[nj];
                drift[j] = drift[j].map(|v| v / phi);
            }

            for (i, &ni) in nodes.iter().enumerate() {
                if grid.is_boundary(ni) {
                    continue;
                }
                let gi = grads[i];
                for (j, &nj) in nodes.iter().enumerate() {
                    let gj = grads[j];
                    let stiffness = d * area * (gi[0] * gj[0] + gi[1] * gj[1]);
                    let closure = area * (drift[j][0] * gi[0] + drift[j][1] * gi[1]);
                    system.add(ni, nj, stiffness + sig_r * mass[i][j] + closure);
                }
            }
        }

        for n in (0..grid.num_nodes()).filter(|&n| grid.is_boundary(n)) {
            system.add(n, n, 1.0);
        }

        Ok(system.build())
    }

    /// Diffusion right-hand side with boundary entries replaced by the
    /// high-order scalar flux.
    pub fn make_rhs(
        &self,
        group: usize,
        source: &VolumetricSource,
        flux: ArrayView2<f64>,
        ho_scalar: ArrayView1<f64>,
    ) -> TransportResult<Array1<f64>> {
        let grid = self.diffusion.grid();
        let mut rhs = self.diffusion.make_rhs(group, source, flux)?;
        for n in (0..grid.num_nodes()).filter(|&n| grid.is_boundary(n)) {
            rhs[n] = ho_scalar[n];
        }
        Ok(rhs)
    }

    /// One NDA pass for `group`: high-order sweep, then the low-order solve.
    ///
    /// A numerical hazard in the closure keeps the high-order scalar flux
    /// for this pass and is reported in `warnings`.
    pub fn group_step(
        &self,
        group: usize,
        source: &VolumetricSource,
        flux: ArrayView2<f64>,
        guess: Option<ArrayView2<f64>>,
        linear: &LinearSolverConfig,
    ) -> TransportResult<GroupStep> {
        let sweep = self.high_order.sweep_group(group, source, flux, guess, linear)?;
        let mut records: Vec<LinearRecord> = sweep
            .linear
            .iter()
            .enumerate()
            .map(|(d, &result)| LinearRecord {
                direction: Some(d),
                result,
            })
            .collect();
        let mut warnings = Vec::new();

        let scalar = match self.make_lhs(group, sweep.angular.view(), flux.row(group)) {
            Ok(lhs) => {
                let rhs = self.make_rhs(group, source, flux, sweep.scalar.view())?.to_vec();
                let mut x = flux.row(group).to_vec();
                let result = gmres_solve(&lhs, &rhs, &mut x, &gmres_config(linear));
                records.push(LinearRecord {
                    direction: None,
                    result,
                });
                Array1::from(x)
            }
            Err(hazard @ TransportError::NumericalHazard { .. }) => {
                warnings.push(hazard);
                sweep.scalar.clone()
            }
            Err(other) => return Err(other),
        };

        Ok(GroupStep {
            scalar,
            angular: Some(sweep.angular),
            linear: records,
            warnings,
        })
    }

    /// Solve an assembled single-group system.
    ///
    /// Fixed source: one GMRES solve of `lhs · φ = rhs`. Eigenvalue: power
    /// iteration on `lhs · φ_new = F φ` with the fission operator of
    /// `group` lumped at element centroids; `rhs` is ignored. The flux is
    /// kept at unit integral during the iteration, k is the integral of
    /// each new iterate, and the returned flux is scaled to max one.
    pub fn solve_system(
        &self,
        lhs: &CsMat<f64>,
        rhs: ArrayView1<f64>,
        problem: ProblemType,
        group: usize,
        limits: &IterationLimits,
        linear: &LinearSolverConfig,
    ) -> TransportResult<NdaSolution> {
        let grid = self.diffusion.grid();
        let n = grid.num_nodes();
        if lhs.rows() != n || lhs.cols() != n {
            return Err(TransportError::ConfigError(format!(
                "system is {}x{}, mesh has {n} nodes",
                lhs.rows(),
                lhs.cols()
            )));
        }
        let gmres = gmres_config(linear);

        match problem {
            ProblemType::FixedSource => {
                let b = rhs.to_vec();
                let mut x = vec![0.0; n];
                let result = gmres_solve(lhs, &b, &mut x, &gmres);
                if !result.converged {
                    log::warn!(
                        "NDA fixed-source solve stopped at residual {:.3e} after {} iterations",
                        result.residual,
                        result.iterations
                    );
                }
                Ok(NdaSolution {
                    flux: Array1::from(x),
                    eigenvalue: None,
                    iterations: result.iterations,
                    converged: result.converged,
                })
            }
            ProblemType::Eigenvalue => {
                let xs = self.diffusion.xs();
                if !(0..grid.num_elements()).any(|e| xs.nu_sig_f(grid.material(e), group) > 0.0) {
                    return Err(TransportError::ConfigError(format!(
                        "group {group} has no fission production on this mesh"
                    )));
                }

                let integral = |phi: &Array1<f64>| -> f64 {
                    (0..grid.num_elements())
                        .map(|e| grid.area(e) * grid.interpolate_to_centroid(e, phi.view()))
                        .sum()
                };

                let mut phi = Array1::from_elem(n, 1.0 / grid.total_area());
                let mut k = 1.0;
                let mut converged = false;
                let mut iterations = 0;

                for it in 1..=limits.max_iterations {
                    iterations = it;
                    let mut b = vec![0.0; n];
                    for e in 0..grid.num_elements() {
                        let production = xs.nu_sig_f(grid.material(e), group)
                            * grid.interpolate_to_centroid(e, phi.view())
                            * grid.area(e)
                            / 3.0;
                        for &node in grid.element_nodes(e).iter() {
                            b[node] += production;
                        }
                    }

                    let mut x = phi.to_vec();
                    let result = gmres_solve(lhs, &b, &mut x, &gmres);
                    if !result.converged {
                        log::warn!(
                            "NDA power iteration {it}: linear solve residual {:.3e}",
                            result.residual
                        );
                    }
                    let mut next = Array1::from(x);
                    let k_new = integral(&next);
                    if !k_new.is_finite() || k_new <= 0.0 {
                        return Err(TransportError::NumericalHazard {
                            location: format!("NDA power iteration {it}"),
                            message: format!("flux integral {k_new} is not positive"),
                        });
                    }
                    next /= k_new;

                    let flux_change = l2_distance(next.view(), phi.view());
                    let k_change = (k_new - k).abs();
                    phi = next;
                    k = k_new;
                    log::debug!("NDA power iteration {it}: k = {k:.8}, Δφ = {flux_change:.3e}");
                    if flux_change < limits.tolerance && k_change < limits.tolerance {
                        converged = true;
                        break;
                    }
                }

                if !converged {
                    log::warn!(
                        "NDA power iteration did not converge in {} iterations (k = {k:.6})",
                        limits.max_iterations
                    );
                }

                let peak = inf_norm(phi.view());
                if peak > 0.0 {
                    phi /= peak;
                }
                Ok(NdaSolution {
                    flux: phi,
                    eigenvalue: Some(k),
                    iterations,
                    converged,
                })
            }
        }
    }
}
