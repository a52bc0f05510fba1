// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Source Densities
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Element-level source densities shared by every formulation.
//!
//! All densities are evaluated at the three area quadrature points of an
//! element; the scalar flux is carried there by P1 interpolation through
//! the mesh triangulation.

use ndarray::{ArrayView2, Axis};
use neutron_math::mesh::TriGrid;
use neutron_types::error::{TransportError, TransportResult};
use neutron_types::materials::CrossSectionSet;
use neutron_types::state::VolumetricSource;

/// Scalar flux of every group at the quadrature points of element `e`.
pub(crate) fn flux_at_quadrature(
    grid: &TriGrid,
    flux: ArrayView2<f64>,
    e: usize,
) -> TransportResult<Vec<[f64; 3]>> {
    let tri = grid.triangulation();
    let points = grid.quadrature_points(e);
    flux.axis_iter(Axis(0))
        .map(|row| {
            let mut values = [0.0; 3];
            for (q, (p, _)) in points.iter().enumerate() {
                values[q] = tri.interpolate(row, *p, Some(e)).ok_or_else(|| {
                    TransportError::NumericalHazard {
                        location: "flux interpolation".to_string(),
                        message: format!("quadrature point {p:?} of element {e} lies outside the mesh"),
                    }
                })?;
            }
            Ok(values)
        })
        .collect()
}

/// In-scatter density into `group`: Σ_g' Σs[g'][group] φ_g'. The self term
/// is included only when `include_self` is set.
pub(crate) fn scattering_density(
    xs: &CrossSectionSet,
    mat: usize,
    group: usize,
    phi_q: &[[f64; 3]],
    include_self: bool,
) -> [f64; 3] {
    let mut density = [0.0; 3];
    for (from, phi) in phi_q.iter().enumerate() {
        if from == group && !include_self {
            continue;
        }
        let s = xs.sig_s(mat, from, group);
        if s == 0.0 {
            continue;
        }
        for q in 0..3 {
            density[q] += s * phi[q];
        }
    }
    density
}

/// External or fission source density of `group` on element `e`.
///
/// Fission: (χ_g / k) Σ_g' νΣf_g' φ_g' from the frozen flux.
pub(crate) fn source_density(
    grid: &TriGrid,
    xs: &CrossSectionSet,
    source: &VolumetricSource,
    group: usize,
    e: usize,
) -> TransportResult<[f64; 3]> {
    match source {
        VolumetricSource::Fixed(q) => Ok([q[[group, e]]; 3]),
        VolumetricSource::Fission { flux, k } => {
            let mat = grid.material(e);
            let chi = xs.chi(mat, group);
            if chi == 0.0 {
                return Ok([0.0; 3]);
            }
            let phi_q = flux_at_quadrature(grid, flux.view(), e)?;
            let mut density = [0.0; 3];
            for (from, phi) in phi_q.iter().enumerate() {
                let nu_sig_f = xs.nu_sig_f(mat, from);
                for q in 0..3 {
                    density[q] += nu_sig_f * phi[q];
                }
            }
            Ok(density.map(|d| chi * d / k))
        }
    }
}

/// Volume-integrated fission production Σ_e A_e Σ_g νΣf_g φ̄_g with
/// centroid-interpolated flux.
pub fn fission_production(grid: &TriGrid, xs: &CrossSectionSet, flux: ArrayView2<f64>) -> f64 {
    (0..grid.num_elements())
        .map(|e| {
            let mat = grid.material(e);
            let local: f64 = flux
                .axis_iter(Axis(0))
                .enumerate()
                .map(|(g, row)| xs.nu_sig_f(mat, g) * grid.interpolate_to_centroid(e, row))
                .sum();
            grid.area(e) * local
        })
        .sum()
}

/// Shape and consistency checks of a source against mesh and library.
pub(crate) fn validate_source(
    grid: &TriGrid,
    xs: &CrossSectionSet,
    source: &VolumetricSource,
) -> TransportResult<()> {
    let groups = xs.num_groups();
    match source {
        VolumetricSource::Fixed(q) => {
            if q.dim() != (groups, grid.num_elements()) {
                return Err(TransportError::ConfigError(format!(
                    "fixed source has shape {:?}, expected ({groups}, {})",
                    q.dim(),
                    grid.num_elements()
                )));
            }
            if q.iter().any(|v| !v.is_finite()) {
                return Err(TransportError::ConfigError(
                    "fixed source contains non-finite values".to_string(),
                ));
            }
        }
        VolumetricSource::Fission { flux, k } => {
            if flux.dim() != (groups, grid.num_nodes()) {
                return Err(TransportError::ConfigError(format!(
                    "fission flux has shape {:?}, expected ({groups}, {})",
                    flux.dim(),
                    grid.num_nodes()
                )));
            }
            if !k.is_finite() || *k <= 0.0 {
                return Err(TransportError::ConfigError(format!(
                    "fission source eigenvalue must be positive, got {k}"
                )));
            }
        }
    }
    Ok(())
}
