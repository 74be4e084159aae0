//! Argument expansion and scheduling benchmarks
//!
//! Measures:
//! - Index tuple enumeration for product and zip
//! - Typed case materialization
//! - Runner overhead for many trivial invocations

use attest_core::arguments::{expand, Strategy};
use attest_core::{Arguments, Registry, Runner, Test};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

// ============================================================================
// Expansion
// ============================================================================

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand");
    for &(label, sizes) in &[
        ("2x500", &[2usize, 500][..]),
        ("10x10x10", &[10, 10, 10][..]),
        ("4x4x4x4x4", &[4, 4, 4, 4, 4][..]),
    ] {
        for strategy in [Strategy::Product, Strategy::Zip] {
            let count = expand(sizes, strategy).len();
            group.throughput(Throughput::Elements(count as u64));
            group.bench_with_input(
                BenchmarkId::new(strategy.to_string(), label),
                &sizes,
                |b, sizes| b.iter(|| expand(black_box(sizes), strategy).count()),
            );
        }
    }
    group.finish();
}

fn bench_materialize(c: &mut Criterion) {
    let flavors: Vec<String> = (0..50).map(|i| format!("flavor-{i}")).collect();
    let toppings: Vec<String> = (0..20).map(|i| format!("topping-{i}")).collect();
    let arguments = Arguments::product(flavors, toppings);

    c.bench_function("materialize_product_50x20", |b| {
        b.iter(|| arguments.iter().map(|(f, t)| f.len() + t.len()).sum::<usize>());
    });
}

// ============================================================================
// Scheduling
// ============================================================================

fn bench_run_trivial(c: &mut Criterion) {
    let mut registry = Registry::new();
    registry
        .register(Test::parameterized(
            "noop",
            Arguments::new(0..1000u32),
            |_cx, _n| async { Ok(()) },
        ))
        .unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let runner = Runner::new();

    c.bench_function("run_1000_invocations", |b| {
        b.iter(|| runtime.block_on(runner.run(black_box(&registry))));
    });
}

criterion_group!(benches, bench_expand, bench_materialize, bench_run_trivial);
criterion_main!(benches);
