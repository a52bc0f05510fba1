// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Multigroup Iterative Solver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Multigroup iteration: within-group source iteration, Gauss-Seidel
//! over energy with optional upscatter acceleration, and power
//! iteration on k for criticality problems.
//!
//! Non-fatal problems (numerical hazards, stalled linear solves,
//! exhausted budgets) are logged, forwarded to the observer and kept in
//! the report; configuration and I/O errors abort the solve.

use std::time::Instant;

use ndarray::{Array2, Array3, Axis};
use neutron_math::linalg::{l2_distance, relative_change_inf};
use neutron_types::config::{ProblemType, TransportConfig};
use neutron_types::constants::NUM_DIRECTIONS;
use neutron_types::error::{TransportError, TransportResult};
use neutron_types::state::{SolveReport, TransportSolution, VolumetricSource};

use crate::formulation::{Formulation, GroupStep, LinearRecord};
use crate::observer::{NoObserver, SolverEvent, SolverObserver};
use crate::source::{fission_production, validate_source};
use crate::upscatter::UpscatterAccelerator;

/// Mutable iteration state shared by the nested loops.
struct RunState<'o, O: SolverObserver> {
    report: SolveReport,
    observer: &'o mut O,
}

impl<'o, O: SolverObserver> RunState<'o, O> {
    fn emit(&mut self, event: SolverEvent) {
        self.observer.on_event(&event);
    }

    fn warn(&mut self, err: &TransportError) {
        log::warn!("{err}");
        let message = err.to_string();
        self.emit(SolverEvent::Warning(message.clone()));
        self.report.warnings.push(message);
    }
}

/// Flux estimates carried between iterations.
struct Fields {
    /// [groups, nodes]
    scalar: Array2<f64>,
    /// [groups, directions, nodes]
    angular: Option<Array3<f64>>,
}

pub struct IterativeSolver<'a> {
    formulation: Formulation<'a>,
    config: TransportConfig,
}

impl<'a> IterativeSolver<'a> {
    pub fn new(formulation: Formulation<'a>, config: TransportConfig) -> Self {
        IterativeSolver {
            formulation,
            config,
        }
    }

    pub fn formulation(&self) -> &Formulation<'a> {
        &self.formulation
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Solve with the upscatter toggle taken from the configuration.
    pub fn run(&self, source: &VolumetricSource) -> TransportResult<TransportSolution> {
        self.solve(source, self.config.upscatter_acceleration)
    }

    pub fn solve(
        &self,
        source: &VolumetricSource,
        accelerate_upscatter: bool,
    ) -> TransportResult<TransportSolution> {
        self.solve_with_observer(source, accelerate_upscatter, &mut NoObserver)
    }

    /// Fixed-source problems solve for `source` directly. Eigenvalue
    /// problems take either a zero fixed source (flat start) or a
    /// `Fission` source whose flux and k seed the power iteration.
    pub fn solve_with_observer<O: SolverObserver>(
        &self,
        source: &VolumetricSource,
        accelerate_upscatter: bool,
        observer: &mut O,
    ) -> TransportResult<TransportSolution> {
        let start = Instant::now();
        self.validate(source)?;

        let grid = self.formulation.grid();
        let xs = self.formulation.xs();
        let groups = xs.num_groups();
        let nodes = grid.num_nodes();

        let accelerator = if accelerate_upscatter {
            Some(UpscatterAccelerator::new(grid, xs, self.formulation.boundary())?)
        } else {
            None
        };

        log::info!(
            "{} solve: {groups} groups, {nodes} nodes, {} elements, {:?}{}",
            self.formulation.name(),
            grid.num_elements(),
            self.config.problem,
            if accelerator.is_some() { ", upscatter acceleration" } else { "" }
        );

        let mut fields = Fields {
            scalar: Array2::ones((groups, nodes)),
            angular: self
                .formulation
                .has_angular_flux()
                .then(|| Array3::zeros((groups, NUM_DIRECTIONS, nodes))),
        };
        let mut run = RunState {
            report: SolveReport::default(),
            observer,
        };

        let (converged, eigenvalue) = match self.config.problem {
            ProblemType::FixedSource => {
                let converged = self.gauss_seidel(source, &mut fields, accelerator.as_ref(), &mut run)?;
                (converged, None)
            }
            ProblemType::Eigenvalue => {
                let (k, converged) = self.power_iteration(source, &mut fields, accelerator.as_ref(), &mut run)?;
                (converged, Some(k))
            }
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        run.report.converged = converged;
        run.report.solve_time_ms = elapsed_ms;
        run.emit(SolverEvent::Finished {
            converged,
            elapsed_ms,
        });
        log::info!(
            "{} solve finished: converged = {converged}, {} sweeps, {} within-group passes, {elapsed_ms:.1} ms",
            self.formulation.name(),
            run.report.gauss_seidel_sweeps,
            run.report.within_group_iterations
        );

        Ok(TransportSolution {
            scalar_flux: fields.scalar,
            angular_flux: fields.angular,
            eigenvalue,
            report: run.report,
        })
    }

    fn validate(&self, source: &VolumetricSource) -> TransportResult<()> {
        self.config.validate()?;
        self.formulation.check_boundary(self.config.boundary)?;

        let grid = self.formulation.grid();
        let xs = self.formulation.xs();
        if let Some(&mat) = grid.materials().iter().find(|&&m| m >= xs.num_materials()) {
            return Err(TransportError::ConfigError(format!(
                "mesh references material {mat} but the library has {}",
                xs.num_materials()
            )));
        }
        validate_source(grid, xs, source)?;

        if self.config.problem == ProblemType::Eigenvalue {
            if !grid.materials().iter().any(|&m| xs.is_fissile(m)) {
                return Err(TransportError::ConfigError(
                    "eigenvalue problem without fissile material on the mesh".to_string(),
                ));
            }
            if let VolumetricSource::Fixed(q) = source {
                if q.iter().any(|&v| v != 0.0) {
                    return Err(TransportError::ConfigError(
                        "eigenvalue problems take no external source".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Converge one group with the other groups frozen.
    fn within_group<O: SolverObserver>(
        &self,
        group: usize,
        source: &VolumetricSource,
        fields: &mut Fields,
        run: &mut RunState<'_, O>,
    ) -> TransportResult<()> {
        let linear = &self.config.linear;
        let limits = self.config.within_group;

        match self.formulation.prepare_group(group, source, &mut fields.scalar, linear) {
            Ok(records) => self.report_linear(group, &records, run),
            Err(e) if !e.is_fatal() => run.warn(&e),
            Err(e) => return Err(e),
        }

        // Without any scattering one pass is exact
        let iterate = self.formulation.xs().scatters_any();
        let mut residual = f64::INFINITY;

        for iteration in 1..=limits.max_iterations {
            run.report.within_group_iterations += 1;
            let guess = fields.angular.as_ref().map(|a| a.index_axis(Axis(0), group));
            let step = match self.formulation.group_step(group, source, fields.scalar.view(), guess, linear) {
                Ok(step) => step,
                Err(e) if !e.is_fatal() => {
                    run.warn(&e);
                    log::warn!("group {group}: keeping the previous estimate after {e}");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            let GroupStep {
                scalar,
                angular,
                linear: records,
                warnings,
            } = step;
            self.report_linear(group, &records, run);
            for w in &warnings {
                run.warn(w);
            }

            residual = relative_change_inf(scalar.iter(), fields.scalar.row(group).iter());
            fields.scalar.row_mut(group).assign(&scalar);
            if let (Some(store), Some(psi)) = (fields.angular.as_mut(), angular) {
                store.index_axis_mut(Axis(0), group).assign(&psi);
            }

            log::debug!("group {group} pass {iteration}: residual {residual:.3e}");
            run.emit(SolverEvent::WithinGroupIteration {
                group,
                iteration,
                residual,
            });

            if !iterate || residual < limits.tolerance {
                return Ok(());
            }
        }

        run.warn(&TransportError::NonConvergence {
            stage: format!("within-group iteration, group {group}"),
            iterations: limits.max_iterations,
            residual,
        });
        Ok(())
    }

    fn report_linear<O: SolverObserver>(
        &self,
        group: usize,
        records: &[LinearRecord],
        run: &mut RunState<'_, O>,
    ) {
        for record in records {
            let r = record.result;
            run.emit(SolverEvent::LinearSolve {
                group,
                direction: record.direction,
                iterations: r.iterations,
                residual: r.residual,
                converged: r.converged,
            });
            if !r.converged {
                let stage = match record.direction {
                    Some(d) => format!("linear solve, group {group}, direction {d}"),
                    None => format!("linear solve, group {group}"),
                };
                run.warn(&TransportError::NonConvergence {
                    stage,
                    iterations: r.iterations,
                    residual: r.residual,
                });
            }
        }
    }

    /// Gauss-Seidel over energy until the relative flux change drops
    /// below tolerance. Returns whether it converged.
    fn gauss_seidel<O: SolverObserver>(
        &self,
        source: &VolumetricSource,
        fields: &mut Fields,
        accelerator: Option<&UpscatterAccelerator<'_>>,
        run: &mut RunState<'_, O>,
    ) -> TransportResult<bool> {
        let xs = self.formulation.xs();
        let groups = xs.num_groups();
        let limits = self.config.gauss_seidel;
        // Pure downscatter (or one group) is exact after a single sweep
        let single_sweep = groups == 1 || !xs.any_upscatter();
        let mut residual = f64::INFINITY;

        for sweep in 1..=limits.max_iterations {
            run.report.gauss_seidel_sweeps += 1;
            let previous = fields.scalar.clone();

            for group in 0..groups {
                self.within_group(group, source, fields, run)?;
            }

            if let Some(acc) = accelerator {
                let correction = acc.correct(&mut fields.scalar, previous.view(), &self.config.linear);
                let epsilon = correction.amplitude;
                log::debug!("sweep {sweep}: upscatter correction max|ε| = {epsilon:.3e}");
                run.emit(SolverEvent::UpscatterCorrection { sweep, epsilon });
                if !correction.linear.converged {
                    run.warn(&TransportError::NonConvergence {
                        stage: format!("upscatter correction solve, sweep {sweep}"),
                        iterations: correction.linear.iterations,
                        residual: correction.linear.residual,
                    });
                }
            }

            residual = relative_change_inf(fields.scalar.iter(), previous.iter());
            run.report.residual_history.push(residual);
            log::debug!("Gauss-Seidel sweep {sweep}: residual {residual:.3e}");
            run.emit(SolverEvent::GaussSeidelSweep { sweep, residual });

            if single_sweep || residual < limits.tolerance {
                return Ok(true);
            }
        }

        run.warn(&TransportError::NonConvergence {
            stage: "Gauss-Seidel".to_string(),
            iterations: limits.max_iterations,
            residual,
        });
        Ok(false)
    }

    /// Power iteration on k with the flux normalised to unit fission
    /// production. Returns (k, converged).
    fn power_iteration<O: SolverObserver>(
        &self,
        source: &VolumetricSource,
        fields: &mut Fields,
        accelerator: Option<&UpscatterAccelerator<'_>>,
        run: &mut RunState<'_, O>,
    ) -> TransportResult<(f64, bool)> {
        let grid = self.formulation.grid();
        let xs = self.formulation.xs();
        let limits = self.config.eigenvalue;

        let mut k = 1.0;
        if let VolumetricSource::Fission { flux, k: k0 } = source {
            fields.scalar.assign(flux);
            k = *k0;
        }
        let production = fission_production(grid, xs, fields.scalar.view());
        if !production.is_finite() || production <= 0.0 {
            return Err(TransportError::ConfigError(format!(
                "initial flux has no fission production ({production})"
            )));
        }
        fields.scalar /= production;

        let mut residual = f64::INFINITY;
        // Every inner Gauss-Seidel loop must converge too
        let mut inner_converged = true;
        for iteration in 1..=limits.max_iterations {
            run.report.power_iterations += 1;
            let fission = VolumetricSource::Fission {
                flux: fields.scalar.clone(),
                k,
            };
            let previous = fields.scalar.clone();
            inner_converged &= self.gauss_seidel(&fission, fields, accelerator, run)?;

            let production = fission_production(grid, xs, fields.scalar.view());
            if !production.is_finite() || production <= 0.0 {
                run.warn(&TransportError::NumericalHazard {
                    location: format!("power iteration {iteration}"),
                    message: format!("fission production {production} is not positive"),
                });
                fields.scalar.assign(&previous);
                return Ok((k, false));
            }
            let k_new = k * production;
            fields.scalar /= production;
            if let Some(angular) = fields.angular.as_mut() {
                *angular /= production;
            }

            let flux_change = fields
                .scalar
                .axis_iter(Axis(0))
                .zip(previous.axis_iter(Axis(0)))
                .map(|(new, old)| l2_distance(new, old).powi(2))
                .sum::<f64>()
                .sqrt();
            let k_change = (k_new - k).abs();
            residual = flux_change.max(k_change);
            k = k_new;

            run.report.eigenvalue_history.push(k);
            log::debug!("power iteration {iteration}: k = {k:.8}, Δk = {k_change:.3e}, Δφ = {flux_change:.3e}");
            run.emit(SolverEvent::PowerIteration {
                iteration,
                eigenvalue: k,
                residual,
            });

            if k_change < limits.tolerance && flux_change < limits.tolerance {
                log::info!("k-eigenvalue converged: k = {k:.8} after {iteration} power iterations");
                return Ok((k, inner_converged));
            }
        }

        run.warn(&TransportError::NonConvergence {
            stage: "power iteration".to_string(),
            iterations: limits.max_iterations,
            residual,
        });
        Ok((k, false))
    }
}
