//! Tick-to-trade benchmark harness.
//!
//! Measures per-stage and end-to-end pipeline latency over synthetic
//! updates and exports three CSVs:
//!
//! - `<prefix>_total.csv`       - end-to-end latency summary
//! - `<prefix>_components.csv`  - per-stage mean/p99/max and share
//! - `<prefix>_raw_samples.csv` - per-sample stage breakdown
//!
//! Exit codes: 0 success, 1 configuration error, 2 runtime error.

use anyhow::{Context, Result};
use clap::Parser;
use fen_core::book::{BookUpdate, OrderBook, UpdateKind};
use fen_core::core::types::{Order, Side, TradingEvent};
use fen_core::inference::{FeatureVector, FixedLatencyOracle, InferenceOracle};
use fen_core::intensity::{IntensityEngine, IntensityParams};
use fen_core::perf;
use fen_core::queue::SpscQueue;
use fen_core::quote::{QuoteEngine, QuoteParams};
use fen_core::risk::{RiskGate, RiskLimits};
use fen_core::Tick;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "pipeline-bench",
    about = "Measure component and full tick-to-trade pipeline latency"
)]
struct Args {
    /// Number of full-pipeline samples.
    #[arg(long, default_value_t = 1_000_000)]
    samples: usize,

    /// Output file prefix.
    #[arg(long, default_value = "benchmark")]
    output: String,

    /// Run component benchmarks only.
    #[arg(long)]
    components: bool,

    /// Run the full-system benchmark only.
    #[arg(long)]
    full: bool,

    /// Pin the benchmark to this core (isolated core recommended).
    #[arg(long)]
    core: Option<usize>,
}

const STAGE_NAMES: [&str; 6] = [
    "book_update",
    "intensity",
    "feature_assembly",
    "inference",
    "quote_calc",
    "risk_check",
];

/// One instrumented pass through the pipeline: per-stage nanoseconds.
#[derive(Debug, Clone, Copy, Default)]
struct Sample {
    stages_ns: [u64; 6],
}

impl Sample {
    fn total_ns(&self) -> u64 {
        self.stages_ns.iter().sum()
    }
}

/// Deterministic synthetic update stream around a drifting mid. Adds
/// and deletes are balanced so the book stays inside its level
/// capacity over arbitrarily long runs.
struct UpdateGenerator {
    rng: StdRng,
    sequence: u64,
    next_order_id: u64,
    mid: f64,
    live: Vec<u64>,
}

impl UpdateGenerator {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sequence: 0,
            next_order_id: 1,
            mid: 100.0,
            live: Vec::with_capacity(128),
        }
    }

    fn next_update(&mut self) -> BookUpdate {
        self.sequence += 1;
        self.mid += (self.rng.gen::<f64>() - 0.5) * 0.02;

        let delete = self.live.len() >= 80
            || (self.live.len() >= 40 && self.rng.gen::<bool>());
        if delete {
            let idx = self.rng.gen_range(0..self.live.len());
            let order_id = self.live.swap_remove(idx);
            return BookUpdate {
                kind: UpdateKind::Delete,
                order_id,
                price: 0.0,
                quantity: 0.0,
                is_bid: true,
                sequence: self.sequence,
                timestamp_ns: self.sequence as i64 * 100,
            };
        }

        let is_bid = self.rng.gen::<bool>();
        let offset = (1 + self.rng.gen_range(0..5)) as f64 * 0.01;
        let price = if is_bid {
            self.mid - offset
        } else {
            self.mid + offset
        };
        let order_id = self.next_order_id;
        self.next_order_id += 1;
        self.live.push(order_id);
        BookUpdate {
            kind: UpdateKind::Add,
            order_id,
            price: (price * 100.0).round() / 100.0,
            quantity: self.rng.gen_range(1..50) as f64,
            is_bid,
            sequence: self.sequence,
            timestamp_ns: self.sequence as i64 * 100,
        }
    }
}

fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
    sorted[idx]
}

struct StatLine {
    mean: f64,
    p99: u64,
    max: u64,
    min: u64,
    median: u64,
}

fn stats(values: &[u64]) -> StatLine {
    if values.is_empty() {
        return StatLine {
            mean: 0.0,
            p99: 0,
            max: 0,
            min: 0,
            median: 0,
        };
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    StatLine {
        mean: sorted.iter().sum::<u64>() as f64 / sorted.len() as f64,
        p99: percentile(&sorted, 0.99),
        max: *sorted.last().unwrap(),
        min: sorted[0],
        median: percentile(&sorted, 0.5),
    }
}

/// Time one closure over `iterations` runs and report mean ns.
fn bench_component<F: FnMut()>(name: &str, iterations: usize, mut f: F) {
    // Warmup.
    for _ in 0..iterations / 10 {
        f();
    }
    let start = Instant::now();
    for _ in 0..iterations {
        f();
    }
    let elapsed = start.elapsed().as_nanos() as f64;
    println!(
        "{:<24} {:>10.1} ns/op  ({} iterations)",
        name,
        elapsed / iterations as f64,
        iterations
    );
}

fn run_component_benchmarks() {
    println!("component benchmarks");
    println!("{}", "-".repeat(60));
    const ITERATIONS: usize = 1_000_000;

    // SPSC ring.
    let queue: SpscQueue<Tick, 4096> = SpscQueue::new();
    let tick = Tick::quote(1, 1, 99.99, 100, 100.01, 100);
    bench_component("spsc_push_pop", ITERATIONS, || {
        queue.push(tick);
        let _ = queue.pop();
    });

    // Book updates.
    let mut book = OrderBook::new();
    let mut generator = UpdateGenerator::new(7);
    bench_component("book_apply_update", ITERATIONS, || {
        let update = generator.next_update();
        let _ = book.apply_update(&update);
    });

    // Intensity updates.
    let mut intensity = IntensityEngine::new(IntensityParams::default());
    let mut event_time = 0i64;
    bench_component("intensity_update", 100_000, || {
        event_time += 1_000;
        intensity.update(TradingEvent::new(event_time, Side::Buy, 1));
    });

    // Feature assembly + oracle.
    let current = Tick::quote(2_000, 1, 99.99, 100, 100.01, 100);
    let previous = Tick::quote(1_000, 1, 99.98, 100, 100.00, 100);
    let mut oracle = FixedLatencyOracle::default();
    bench_component("features_and_inference", ITERATIONS, || {
        let features = FeatureVector::assemble(&current, &previous, &previous, 0.8, 0.4);
        let _ = oracle.predict(&features);
    });

    // Quote computation.
    let quote_engine = QuoteEngine::new(QuoteParams::default());
    bench_component("quote_calc", ITERATIONS, || {
        let _ = quote_engine.quotes(100.0, 25, 300.0, 0.0001, 0);
    });

    // Risk checks.
    let risk = RiskGate::new(RiskLimits::default());
    let order = Order::new(1, 1, Side::Buy, 100.0, 100, 0);
    bench_component("risk_check", ITERATIONS, || {
        let _ = risk.check(&order, 0);
    });

    println!();
}

fn run_full_benchmark(samples: usize, output_prefix: &str) -> Result<()> {
    println!("full tick-to-trade benchmark ({} samples)", samples);

    let mut book = OrderBook::new();
    let mut intensity = IntensityEngine::new(IntensityParams::default());
    let mut oracle = FixedLatencyOracle::default();
    let quote_engine = QuoteEngine::new(QuoteParams::default());
    let risk = RiskGate::new(RiskLimits {
        max_order_notional: 1_000_000.0,
        ..Default::default()
    });
    let mut generator = UpdateGenerator::new(42);

    let mut previous_tick = Tick::empty(0, 1);
    let reference_tick = Tick::quote(0, 1, 99.99, 100, 100.01, 100);
    let mut recorded = Vec::with_capacity(samples);

    // Warmup to populate the book and caches.
    for _ in 0..10_000.min(samples) {
        let update = generator.next_update();
        let _ = book.apply_update(&update);
    }

    for _ in 0..samples {
        let mut sample = Sample::default();
        let update = generator.next_update();

        let t0 = Instant::now();
        let applied = book.apply_update(&update).is_ok();
        sample.stages_ns[0] = t0.elapsed().as_nanos() as u64;
        if !applied {
            continue;
        }

        let t1 = Instant::now();
        intensity.update(TradingEvent::new(update.timestamp_ns, Side::Buy, 1));
        sample.stages_ns[1] = t1.elapsed().as_nanos() as u64;

        let t2 = Instant::now();
        let tick = book.as_tick(update.timestamp_ns, 1);
        let features = FeatureVector::assemble(
            &tick,
            &previous_tick,
            &reference_tick,
            intensity.buy_intensity(),
            intensity.sell_intensity(),
        );
        sample.stages_ns[2] = t2.elapsed().as_nanos() as u64;

        let t3 = Instant::now();
        let _prediction = oracle.predict(&features);
        sample.stages_ns[3] = t3.elapsed().as_nanos() as u64;

        let t4 = Instant::now();
        let quotes = quote_engine.quotes(tick.mid_price.max(1.0), 0, 300.0, 0.0001, 0);
        sample.stages_ns[4] = t4.elapsed().as_nanos() as u64;

        let t5 = Instant::now();
        let order = Order::new(1, 1, Side::Buy, quotes.bid_price.max(0.01), 100, 0);
        let _ = risk.check(&order, 0);
        sample.stages_ns[5] = t5.elapsed().as_nanos() as u64;

        previous_tick = tick;
        recorded.push(sample);
    }

    export_reports(&recorded, output_prefix)
}

fn export_reports(samples: &[Sample], prefix: &str) -> Result<()> {
    let totals: Vec<u64> = samples.iter().map(|s| s.total_ns()).collect();
    let total_stats = stats(&totals);

    println!("tick-to-trade latency");
    println!("{}", "-".repeat(60));
    println!("samples: {}", samples.len());
    println!("mean:    {:>10.1} ns", total_stats.mean);
    println!("median:  {:>10} ns", total_stats.median);
    println!("p99:     {:>10} ns", total_stats.p99);
    println!("max:     {:>10} ns", total_stats.max);

    // Total summary.
    let total_path = format!("{}_total.csv", prefix);
    let mut file = BufWriter::new(File::create(&total_path).context("creating total csv")?);
    writeln!(file, "metric,value_ns")?;
    writeln!(file, "count,{}", totals.len())?;
    writeln!(file, "mean,{:.2}", total_stats.mean)?;
    writeln!(file, "median,{}", total_stats.median)?;
    writeln!(file, "p99,{}", total_stats.p99)?;
    writeln!(file, "min,{}", total_stats.min)?;
    writeln!(file, "max,{}", total_stats.max)?;

    // Per-component summary.
    let components_path = format!("{}_components.csv", prefix);
    let mut file =
        BufWriter::new(File::create(&components_path).context("creating components csv")?);
    writeln!(file, "component,mean_ns,p99_ns,max_ns,percent")?;
    println!("\ncomponent breakdown");
    println!("{}", "-".repeat(60));
    for (stage, name) in STAGE_NAMES.iter().enumerate() {
        let values: Vec<u64> = samples.iter().map(|s| s.stages_ns[stage]).collect();
        let line = stats(&values);
        let percent = if total_stats.mean > 0.0 {
            line.mean / total_stats.mean * 100.0
        } else {
            0.0
        };
        println!(
            "{:<20} {:>10.1} ns  {:>6.1}%",
            name, line.mean, percent
        );
        writeln!(
            file,
            "{},{:.2},{},{},{:.2}",
            name, line.mean, line.p99, line.max, percent
        )?;
    }

    // Raw samples.
    let raw_path = format!("{}_raw_samples.csv", prefix);
    let mut file = BufWriter::new(File::create(&raw_path).context("creating raw csv")?);
    writeln!(
        file,
        "sample_id,total_ns,book_ns,intensity_ns,features_ns,inference_ns,quote_ns,risk_ns"
    )?;
    for (i, sample) in samples.iter().enumerate() {
        writeln!(
            file,
            "{},{},{},{},{},{},{},{}",
            i,
            sample.total_ns(),
            sample.stages_ns[0],
            sample.stages_ns[1],
            sample.stages_ns[2],
            sample.stages_ns[3],
            sample.stages_ns[4],
            sample.stages_ns[5],
        )?;
    }

    println!("\nresults exported:");
    println!("  {}", total_path);
    println!("  {}", components_path);
    println!("  {}", raw_path);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    fen_core::utils::logger::init("warn", false);

    if args.samples == 0 {
        eprintln!("configuration error: --samples must be positive");
        return ExitCode::from(1);
    }
    // --components and --full each restrict the run to one half; both
    // (or neither) means run everything.
    let run_components = !args.full || args.components;
    let run_full = !args.components || args.full;

    if let Some(core) = args.core {
        if let Err(err) = perf::isolate_hot_thread(core, 49) {
            eprintln!("configuration error: {:#}", err);
            return ExitCode::from(1);
        }
    }

    if run_components {
        run_component_benchmarks();
    }
    if run_full {
        if let Err(err) = run_full_benchmark(args.samples, &args.output) {
            eprintln!("benchmark failed: {:#}", err);
            return ExitCode::from(2);
        }
    }
    ExitCode::SUCCESS
}
