// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Transport Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use std::f64::consts::PI;

/// Direction cosine of the 2-per-axis level-symmetric set (1/√3, truncated).
pub const S2_MU: f64 = 0.577_350_3;

/// Number of discrete directions in the 2D tensor-product set.
pub const NUM_DIRECTIONS: usize = 4;

/// Directions in tensor-product order: (+,+), (+,-), (-,+), (-,-).
pub const S2_DIRECTIONS: [[f64; 2]; NUM_DIRECTIONS] = [
    [S2_MU, S2_MU],
    [S2_MU, -S2_MU],
    [-S2_MU, S2_MU],
    [-S2_MU, -S2_MU],
];

/// Quadrature weight per direction; the four weights sum to 4π.
pub const S2_WEIGHT: f64 = PI;

/// Isotropic source normalisation over the unit sphere.
pub const FOUR_PI: f64 = 4.0 * PI;

/// Marshak vacuum boundary coefficient for the diffusion operator.
pub const MARSHAK_COEFFICIENT: f64 = 0.5;

/// Relative floor below which the NDA drift denominator is treated as zero.
pub const NDA_FLUX_FLOOR: f64 = 1e-12;

/// Coordinate tolerance used to classify nodes onto axis-aligned boundaries.
pub const BOUNDARY_TOL: f64 = 1e-10;
