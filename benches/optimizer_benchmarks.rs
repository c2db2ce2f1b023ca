//! Optimization engine benchmarks.
//!
//! Run with: cargo bench
//! Run specific benchmark: cargo bench -- <name>

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use sage::{
    CacheConfig, CostModel, EngineConfig, OptimizationEngine, OptimizationRequest,
    QueryRewriter, QueryStatistics, TableStatistics,
};

const SIMPLE_QUERY: &str = "SELECT id, name FROM users WHERE id = 42";
const COMPLEX_QUERY: &str = "SELECT o.id, c.name, SUM(i.amount) FROM orders o \
     JOIN customers c ON o.customer_id = c.id \
     JOIN items i ON i.order_id = o.id \
     WHERE o.status = 'open' AND o.total IN (SELECT total FROM refunds) \
     GROUP BY o.id, c.name HAVING SUM(i.amount) > 100 ORDER BY c.name";

fn tables(rows: u64) -> Vec<TableStatistics> {
    vec![
        TableStatistics::new("orders", rows),
        TableStatistics::new("customers", rows / 10),
        TableStatistics::new("items", rows * 4),
    ]
}

fn bench_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect");

    for (name, query) in [("simple", SIMPLE_QUERY), ("complex", COMPLEX_QUERY)] {
        group.throughput(Throughput::Bytes(query.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), query, |b, query| {
            b.iter(|| QueryStatistics::collect(black_box(query)))
        });
    }

    group.finish();
}

fn bench_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate");
    let model = CostModel::new();

    for rows in [1_000u64, 100_000, 10_000_000] {
        let stats = tables(rows);
        group.throughput(Throughput::Elements(rows));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &stats, |b, stats| {
            b.iter(|| model.estimate(black_box(COMPLEX_QUERY), black_box(stats)))
        });
    }

    group.finish();
}

fn bench_rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite");
    let rewriter = QueryRewriter::new();
    let model = CostModel::new();

    for (name, query) in [
        ("select_star", "SELECT * FROM orders"),
        (
            "subquery",
            "SELECT * FROM orders WHERE customer_id IN (SELECT id FROM customers)",
        ),
    ] {
        let request = OptimizationRequest::new(query, "postgresql")
            .with_table_statistics(tables(100_000));
        let statistics = QueryStatistics::collect(query);

        group.bench_with_input(BenchmarkId::from_parameter(name), &request, |b, request| {
            b.iter(|| rewriter.rewrite(black_box(request), &statistics, &model))
        });
    }

    group.finish();
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize");

    let request = OptimizationRequest::new(COMPLEX_QUERY, "postgresql")
        .with_table_statistics(tables(100_000));

    let uncached = OptimizationEngine::new(
        EngineConfig::new().with_cache_config(CacheConfig::disabled()),
    );
    group.bench_function("uncached", |b| {
        b.iter(|| uncached.optimize_blocking(black_box(&request)))
    });

    let cached = OptimizationEngine::with_defaults();
    cached.optimize_blocking(&request);
    group.bench_function("cached", |b| {
        b.iter(|| cached.optimize_blocking(black_box(&request)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_collect,
    bench_estimate,
    bench_rewrite,
    bench_optimize
);
criterion_main!(benches);
