// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Property-Based Tests (proptest) for neutron-transport
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for neutron-transport using proptest.
//!
//! Covers: operator symmetry, infinite-medium solutions, fission
//! production scaling, upscatter spectrum shape.

use ndarray::Array2;
use neutron_math::mesh::TriGrid;
use neutron_math::sparse::{diagonal, is_symmetric};
use neutron_transport::source::fission_production;
use neutron_transport::upscatter::material_spectrum;
use neutron_transport::{Diffusion, Formulation, IterativeSolver, Saaf};
use neutron_types::config::{BoundaryCondition, IterationLimits, TransportConfig};
use neutron_types::constants::NUM_DIRECTIONS;
use neutron_types::materials::{CrossSectionSet, MaterialData};
use neutron_types::state::VolumetricSource;
use proptest::prelude::*;

fn one_group(sig_a: f64, sig_s: f64) -> CrossSectionSet {
    CrossSectionSet::new(vec![MaterialData {
        name: "generated".to_string(),
        sig_a: vec![sig_a],
        scattering: vec![vec![sig_s]],
        sig_f: vec![0.5 * sig_a],
        nu: vec![2.4],
        chi: vec![1.0],
    }])
    .unwrap()
}

// ── Operators ────────────────────────────────────────────────────────

proptest! {
    /// Diffusion and SAAF operators are symmetric with a positive diagonal.
    #[test]
    fn operators_symmetric_positive_diagonal(
        nx in 1usize..6,
        ny in 1usize..6,
        sig_a in 0.01f64..2.0,
        sig_s in 0.0f64..2.0,
        vacuum in any::<bool>(),
        direction in 0usize..NUM_DIRECTIONS,
    ) {
        let grid = TriGrid::rectangle(nx, ny, (0.0, 2.0), (0.0, 1.0), |_, _| 0).unwrap();
        let xs = one_group(sig_a, sig_s);
        let bc = if vacuum { BoundaryCondition::Vacuum } else { BoundaryCondition::Reflective };
        let diffusion = Diffusion::new(&grid, &xs, bc).make_lhs(0);
        prop_assert!(is_symmetric(&diffusion, 1e-12));
        prop_assert!(diagonal(&diffusion).iter().all(|&d| d > 0.0));

        let saaf = Saaf::new(&grid, &xs).make_lhs(direction, 0);
        prop_assert!(is_symmetric(&saaf, 1e-12));
        prop_assert!(diagonal(&saaf).iter().all(|&d| d > 0.0));
    }
}

// ── Solutions ────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Reflective diffusion with a uniform source gives φ = q / Σa.
    #[test]
    fn infinite_medium_flux(
        n in 1usize..5,
        sig_a in 0.05f64..2.0,
        sig_s in 0.0f64..3.0,
        q in 0.1f64..10.0,
    ) {
        let grid = TriGrid::rectangle(n, n, (0.0, 1.0), (0.0, 1.0), |_, _| 0).unwrap();
        let xs = one_group(sig_a, sig_s);
        let cfg = TransportConfig {
            boundary: BoundaryCondition::Reflective,
            within_group: IterationLimits::new(50, 1e-10),
            ..Default::default()
        };
        let solver = IterativeSolver::new(
            Formulation::Diffusion(Diffusion::new(&grid, &xs, BoundaryCondition::Reflective)),
            cfg,
        );
        let sol = solver
            .solve(&VolumetricSource::uniform(1, grid.num_elements(), q), false)
            .unwrap();
        let exact = q / sig_a;
        for v in sol.scalar_flux.iter() {
            prop_assert!((v - exact).abs() < 1e-6 * exact, "φ = {} vs {}", v, exact);
        }
    }

    /// Fission production is linear in the flux.
    #[test]
    fn fission_production_linear(
        n in 1usize..6,
        scale in 0.01f64..100.0,
        sig_a in 0.05f64..2.0,
    ) {
        let grid = TriGrid::rectangle(n, n, (0.0, 3.0), (0.0, 1.0), |_, _| 0).unwrap();
        let xs = one_group(sig_a, 0.1);
        let flux = Array2::from_shape_fn((1, grid.num_nodes()), |(_, i)| 1.0 + (i % 3) as f64);
        let base = fission_production(&grid, &xs, flux.view());
        let scaled = fission_production(&grid, &xs, (&flux * scale).view());
        prop_assert!(base > 0.0);
        prop_assert!((scaled - scale * base).abs() < 1e-10 * scale * base);
    }
}

// ── Upscatter spectrum ───────────────────────────────────────────────

proptest! {
    /// The Gauss-Seidel error mode is non-negative and sums to one.
    #[test]
    fn upscatter_spectrum_is_a_distribution(
        groups in 2usize..5,
        seed in prop::collection::vec(0.01f64..1.0, 25),
    ) {
        let scattering: Vec<Vec<f64>> = (0..groups)
            .map(|from| (0..groups).map(|to| seed[from * 5 + to]).collect())
            .collect();
        let xs = CrossSectionSet::new(vec![MaterialData {
            name: "generated".to_string(),
            sig_a: vec![0.05; groups],
            scattering,
            ..Default::default()
        }])
        .unwrap();
        prop_assert!(xs.has_upscatter(0));
        let xi = material_spectrum(&xs, 0).unwrap();
        prop_assert!(xi.iter().all(|&v| v >= -1e-12));
        prop_assert!((xi.sum() - 1.0).abs() < 1e-9);
    }
}
