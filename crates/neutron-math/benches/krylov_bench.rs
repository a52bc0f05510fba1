// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Krylov Solver Benchmark
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use criterion::{criterion_group, criterion_main, Criterion};
use neutron_math::cg::{pcg_solve, PcgConfig};
use neutron_math::gmres::{gmres_solve, GmresConfig};
use neutron_math::mesh::TriGrid;
use neutron_math::sparse::SystemBuilder;
use sprs::CsMat;
use std::hint::black_box;

/// P1 stiffness + mass on a structured mesh: the shape of a one-group
/// diffusion operator.
fn fe_operator(n: usize, drift: f64) -> CsMat<f64> {
    let grid = TriGrid::rectangle(n, n, (0.0, 10.0), (0.0, 10.0), |_, _| 0).unwrap();
    let mut builder = SystemBuilder::new(grid.num_nodes());
    for e in 0..grid.num_elements() {
        let nodes = grid.element_nodes(e);
        let grads = grid.gradients(e);
        let mass = grid.element_mass(e);
        let area = grid.area(e);
        for i in 0..3 {
            for j in 0..3 {
                let stiff = grads[i][0] * grads[j][0] + grads[i][1] * grads[j][1];
                let value = area * (0.3 * stiff + drift * grads[i][0] / 3.0) + 0.1 * mass[i][j];
                builder.add(nodes[i], nodes[j], value);
            }
        }
    }
    builder.build()
}

fn bench_pcg(c: &mut Criterion) {
    for n in [16, 32] {
        let a = fe_operator(n, 0.0);
        let b = vec![1.0; a.rows()];
        let config = PcgConfig::default();
        c.bench_function(&format!("pcg_fe_{n}x{n}"), |bench| {
            bench.iter(|| {
                let mut x = vec![0.0; b.len()];
                let res = pcg_solve(&a, &b, &mut x, &config);
                black_box(res.iterations);
            })
        });
    }
}

fn bench_gmres(c: &mut Criterion) {
    let a = fe_operator(32, 0.2);
    let b = vec![1.0; a.rows()];

    let mut group = c.benchmark_group("gmres_fe_32x32");
    group.sample_size(10);
    for restart in [20, 40] {
        group.bench_function(format!("restart_{restart}"), |bench| {
            let config = GmresConfig {
                restart,
                ..GmresConfig::default()
            };
            bench.iter(|| {
                let mut x = vec![0.0; b.len()];
                let res = gmres_solve(&a, &b, &mut x, &config);
                black_box(res.iterations);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pcg, bench_gmres);
criterion_main!(benches);
