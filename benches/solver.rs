//! Benchmarks for the rooted-partition-tree dynamic program and the two
//! samplers.
//!
//! Run with:
//! ```bash
//! cargo bench --bench solver
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use jtree_rs::sample::{sample_naive, AdaptiveSampler};
use jtree_rs::scores::LocalScores;
use jtree_rs::solver::{MaxSolver, SolverConfig, SumSolver};

/// Deterministic scores with no exploitable structure.
fn bench_scores(n: u32) -> LocalScores {
    LocalScores::from_fn(n, n, |s| {
        if s.is_empty() {
            return 0.0;
        }
        let x = s.bits().wrapping_mul(2_654_435_761);
        (x % 1000) as f64 / 500.0 - 1.0
    })
}

fn bench_maximize(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver/maximize");

    for n in [8, 10, 12] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut solver = MaxSolver::new(bench_scores(n), SolverConfig::new(n)).unwrap();
                solver.maximize()
            });
        });
    }

    group.finish();
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver/partition");

    for n in [8, 10, 12] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut solver = SumSolver::new(bench_scores(n), SolverConfig::new(n)).unwrap();
                solver.partition_function()
            });
        });
    }

    group.finish();
}

fn bench_samplers(c: &mut Criterion) {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    let n = 10;
    let draws = 100usize;

    let mut group = c.benchmark_group("solver/sample");
    group.throughput(Throughput::Elements(draws as u64));

    group.bench_function("naive", |b| {
        let mut solver = SumSolver::new(bench_scores(n), SolverConfig::new(n)).unwrap();
        solver.partition_function();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        b.iter(|| {
            for _ in 0..draws {
                sample_naive(&mut solver, &mut rng);
            }
        });
    });

    group.bench_function("adaptive", |b| {
        let mut solver = SumSolver::new(bench_scores(n), SolverConfig::new(n)).unwrap();
        solver.partition_function();
        let mut sampler = AdaptiveSampler::new(&solver);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        b.iter(|| {
            for _ in 0..draws {
                sampler.sample(&mut solver, &mut rng);
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_maximize, bench_partition, bench_samplers);
criterion_main!(benches);
