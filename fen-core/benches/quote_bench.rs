//! Quote-engine and risk-gate latency benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fen_core::core::types::Side;
use fen_core::quote::{QuoteEngine, QuoteParams};
use fen_core::risk::{RiskGate, RiskLimits};
use fen_core::Order;

fn bench_quotes(c: &mut Criterion) {
    let mut group = c.benchmark_group("quote_engine");
    group.significance_level(0.01).sample_size(1000);

    let engine = QuoteEngine::new(QuoteParams::default());
    group.bench_function("quotes_flat", |b| {
        b.iter(|| {
            black_box(engine.quotes(
                black_box(100.0),
                black_box(0),
                black_box(300.0),
                black_box(0.0001),
                0,
            ))
        });
    });

    group.bench_function("quotes_skewed", |b| {
        b.iter(|| {
            black_box(engine.quotes(
                black_box(100.0),
                black_box(750),
                black_box(300.0),
                black_box(0.0001),
                0,
            ))
        });
    });

    group.bench_function("latency_cost", |b| {
        b.iter(|| black_box(engine.latency_cost(black_box(0.2), black_box(100.0))));
    });

    group.finish();
}

fn bench_risk(c: &mut Criterion) {
    let mut group = c.benchmark_group("risk_gate");
    group.sample_size(1000);

    let gate = RiskGate::new(RiskLimits::default());
    let order = Order::new(1, 1, Side::Buy, 100.0, 100, 0);
    group.bench_function("check_pass", |b| {
        b.iter(|| black_box(gate.check(black_box(&order), black_box(0))));
    });

    group.finish();
}

criterion_group!(benches, bench_quotes, bench_risk);
criterion_main!(benches);
