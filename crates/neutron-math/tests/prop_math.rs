// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Property-Based Tests (proptest) for neutron-math
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for neutron-math using proptest.
//!
//! Covers: rectangle mesh invariants, P1 interpolation exactness,
//! PCG and GMRES residual reduction, forward substitution.

use ndarray::{Array1, Array2};
use neutron_math::cg::{pcg_solve, PcgConfig};
use neutron_math::gmres::{gmres_solve, GmresConfig};
use neutron_math::linalg::forward_substitution;
use neutron_math::mesh::TriGrid;
use neutron_math::sparse::{residual_norm, spmv, SystemBuilder};
use proptest::prelude::*;

// ── Mesh Invariants ──────────────────────────────────────────────────

proptest! {
    /// Element areas sum to the rectangle area and boundary edges count
    /// matches the perimeter cell count.
    #[test]
    fn rectangle_area_and_perimeter(
        nx in 1usize..12,
        ny in 1usize..12,
        w in 0.5f64..20.0,
        h in 0.5f64..20.0,
    ) {
        let grid = TriGrid::rectangle(nx, ny, (0.0, w), (-h, 0.0), |_, _| 0).unwrap();
        prop_assert_eq!(grid.num_elements(), 2 * nx * ny);
        prop_assert!((grid.total_area() - w * h).abs() < 1e-9 * w * h);
        prop_assert_eq!(grid.boundary_edges().len(), 2 * (nx + ny));
        let perimeter: f64 = grid.boundary_edges().iter().map(|e| e.length).sum();
        prop_assert!((perimeter - 2.0 * (w + h)).abs() < 1e-9 * (w + h));
    }

    /// Every element's gradients sum to zero and every area is positive.
    #[test]
    fn basis_gradients_sum_to_zero(nx in 1usize..8, ny in 1usize..8) {
        let grid = TriGrid::rectangle(nx, ny, (0.0, 1.0), (0.0, 3.0), |_, _| 0).unwrap();
        for e in 0..grid.num_elements() {
            prop_assert!(grid.area(e) > 0.0);
            let g = grid.gradients(e);
            prop_assert!((g[0][0] + g[1][0] + g[2][0]).abs() < 1e-9);
            prop_assert!((g[0][1] + g[1][1] + g[2][1]).abs() < 1e-9);
        }
    }

    /// P1 interpolation reproduces linear fields anywhere in the domain.
    #[test]
    fn interpolation_exact_for_linear(
        px in 0.0f64..1.0,
        py in 0.0f64..1.0,
        a in -5.0f64..5.0,
        b in -5.0f64..5.0,
    ) {
        let grid = TriGrid::rectangle(5, 4, (0.0, 1.0), (0.0, 1.0), |_, _| 0).unwrap();
        let field = Array1::from_shape_fn(grid.num_nodes(), |n| {
            let p = grid.node(n);
            a * p[0] + b * p[1] + 1.0
        });
        let v = grid.triangulation().interpolate(field.view(), [px, py], None).unwrap();
        prop_assert!((v - (a * px + b * py + 1.0)).abs() < 1e-9);
    }
}

// ── Krylov Solvers ───────────────────────────────────────────────────

fn spd_system(n: usize, shift: f64) -> sprs::CsMat<f64> {
    let mut b = SystemBuilder::new(n);
    for i in 0..n {
        b.add(i, i, 2.0 + shift);
        if i > 0 {
            b.add(i, i - 1, -1.0);
            b.add(i - 1, i, -1.0);
        }
    }
    b.build()
}

proptest! {
    /// PCG satisfies A x = b on shifted 1D Laplacians.
    #[test]
    fn pcg_solution_satisfies_system(n in 2usize..60, shift in 0.01f64..2.0) {
        let a = spd_system(n, shift);
        let rhs: Vec<f64> = (0..n).map(|i| ((i + 1) as f64).sqrt()).collect();
        let mut x = vec![0.0; n];
        let res = pcg_solve(&a, &rhs, &mut x, &PcgConfig::default());
        prop_assert!(res.converged);
        let rel = residual_norm(&a, &x, &rhs) / rhs.iter().map(|v| v * v).sum::<f64>().sqrt();
        prop_assert!(rel < 1e-8, "relative residual {}", rel);
    }

    /// GMRES recovers a known solution of a non-symmetric system.
    #[test]
    fn gmres_recovers_known_solution(n in 2usize..50, skew in 0.0f64..1.0) {
        let mut builder = SystemBuilder::new(n);
        for i in 0..n {
            builder.add(i, i, 3.0);
            if i > 0 { builder.add(i, i - 1, -1.0 - skew); }
            if i + 1 < n { builder.add(i, i + 1, -1.0 + 0.5 * skew); }
        }
        let a = builder.build();
        let exact: Vec<f64> = (0..n).map(|i| (i as f64 * 0.3).cos() + 2.0).collect();
        let mut rhs = vec![0.0; n];
        spmv(&a, &exact, &mut rhs);
        let mut x = vec![0.0; n];
        let res = gmres_solve(&a, &rhs, &mut x, &GmresConfig::default());
        prop_assert!(res.converged);
        for i in 0..n {
            prop_assert!((x[i] - exact[i]).abs() < 1e-7);
        }
    }

    /// Forward substitution inverts unit-dominant lower-triangular matrices.
    #[test]
    fn forward_substitution_inverts(n in 1usize..10, off in -0.9f64..0.9) {
        let l = Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j { 1.0 + i as f64 } else if j < i { off / (1.0 + (i - j) as f64) } else { 0.0 }
        });
        let x_exact = Array1::from_shape_fn(n, |i| i as f64 - 1.5);
        let b = l.dot(&x_exact);
        let x = forward_substitution(l.view(), b.view()).unwrap();
        for i in 0..n {
            prop_assert!((x[i] - x_exact[i]).abs() < 1e-10);
        }
    }
}
