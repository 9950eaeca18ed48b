//! SPSC ring throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fen_core::queue::SpscQueue;
use fen_core::Tick;

fn bench_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc");
    group.significance_level(0.01).sample_size(1000);

    let queue: SpscQueue<u64, 16384> = SpscQueue::new();
    group.bench_function("push_pop_u64", |b| {
        b.iter(|| {
            queue.push(black_box(42));
            black_box(queue.pop());
        });
    });

    let tick_queue: SpscQueue<Tick, 4096> = SpscQueue::new();
    let tick = Tick::quote(1, 1, 99.99, 10, 100.01, 10);
    group.bench_function("push_pop_tick", |b| {
        b.iter(|| {
            tick_queue.push(black_box(tick));
            black_box(tick_queue.pop());
        });
    });

    group.finish();
}

fn bench_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_burst");
    group.sample_size(200);

    let queue: SpscQueue<u64, 1024> = SpscQueue::new();
    group.bench_function("burst_512", |b| {
        b.iter(|| {
            for i in 0..512u64 {
                queue.push(i);
            }
            while queue.pop().is_some() {}
        });
    });

    group.finish();
}

criterion_group!(benches, bench_push_pop, bench_burst);
criterion_main!(benches);
