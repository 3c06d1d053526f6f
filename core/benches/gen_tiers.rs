use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sweeplog_core::*;

const TIERS: [(&str, Coord2, CellCount); 3] = [
    ("beginner", (8, 8), 10),
    ("intermediate", (16, 16), 40),
    ("expert", (16, 30), 99),
];

fn random_layouts(c: &mut Criterion) {
    let mut group = c.benchmark_group("lay_mine");
    for (name, size, mines) in TIERS {
        let config = GameConfig::new(size, mines);
        let open = (size.0 / 2, size.1 / 2);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            let mut seed = 0;
            b.iter(|| {
                seed += 1;
                black_box(lay_mine(config, open, seed))
            })
        });
    }
    group.finish();
}

fn solvable_layouts(c: &mut Criterion) {
    let mut group = c.benchmark_group("laymine_solvable");
    group.sample_size(10);
    for (name, size, mines) in TIERS {
        let config = GameConfig::new(size, mines);
        let open = (size.0 / 2, size.1 / 2);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            let mut seed = 0;
            b.iter(|| {
                seed += 1;
                black_box(laymine_solvable(config, open, 10_000, seed))
            })
        });
    }
    group.finish();
}

fn parallel_solvable_layouts(c: &mut Criterion) {
    let mut group = c.benchmark_group("laymine_solvable_parallel");
    group.sample_size(10);
    for (name, size, mines) in TIERS {
        let config = GameConfig::new(size, mines);
        let open = (size.0 / 2, size.1 / 2);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            let mut seed = 0;
            b.iter(|| {
                seed += 1;
                black_box(laymine_solvable_parallel(
                    config,
                    open,
                    10_000,
                    seed,
                    SolverLimits::default(),
                ))
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    random_layouts,
    solvable_layouts,
    parallel_solvable_layouts
);
criterion_main!(benches);
