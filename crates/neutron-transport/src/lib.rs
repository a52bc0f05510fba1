// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Neutron Transport
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Multigroup neutron transport on triangular meshes.
//!
//! Diffusion, S2 SAAF and NDA formulations share one iterative solver:
//! within-group iteration, Gauss-Seidel over energy with optional
//! upscatter acceleration, and power iteration for k-eigenvalue problems.

pub mod diffusion;
pub mod formulation;
pub mod nda;
pub mod observer;
pub mod saaf;
pub mod solver;
pub mod source;
pub mod upscatter;

pub use diffusion::Diffusion;
pub use formulation::Formulation;
pub use nda::Nda;
pub use saaf::Saaf;
pub use solver::IterativeSolver;
pub use upscatter::UpscatterAccelerator;
