//! Deterministic backtest runner.
//!
//! Exit codes: 0 success, 1 configuration/input error, 2 runtime error.

use clap::Parser;
use fen_backtest::{BacktestConfig, BacktestDriver};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "backtest", about = "Replay a historical capture through the trading pipeline")]
struct Args {
    /// Historical capture CSV (ts_us,event_type,side,price,size,order_id,level).
    input: PathBuf,

    /// Simulated order round-trip latency in nanoseconds.
    #[arg(long)]
    latency_ns: Option<i64>,

    /// Fill-model RNG seed.
    #[arg(long)]
    seed: Option<u32>,

    /// Starting capital.
    #[arg(long)]
    capital: Option<f64>,

    /// Commission per filled share.
    #[arg(long)]
    commission: Option<f64>,

    /// Absolute position limit.
    #[arg(long)]
    max_position: Option<i64>,

    /// Disable square-root impact on fills.
    #[arg(long)]
    no_slippage: bool,

    /// Disable the adverse-move fill penalty.
    #[arg(long)]
    no_adverse_selection: bool,

    /// Run the latency sensitivity sweep instead of a single backtest.
    #[arg(long)]
    sweep: bool,

    /// Event replay log path.
    #[arg(long)]
    replay_log: Option<PathBuf>,

    /// Risk-breach log path.
    #[arg(long)]
    breach_log: Option<PathBuf>,

    /// Default log level (overridden by RUST_LOG).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

fn build_config(args: &Args) -> BacktestConfig {
    let mut config = BacktestConfig::default();
    if let Some(latency) = args.latency_ns {
        config.simulated_latency_ns = latency;
    }
    if let Some(seed) = args.seed {
        config.random_seed = seed;
    }
    if let Some(capital) = args.capital {
        config.initial_capital = capital;
    }
    if let Some(commission) = args.commission {
        config.commission_per_share = commission;
    }
    if let Some(max_position) = args.max_position {
        config.max_position = max_position;
    }
    config.enable_slippage = !args.no_slippage;
    config.enable_adverse_selection = !args.no_adverse_selection;
    config.run_latency_sweep = args.sweep;
    config
}

fn main() -> ExitCode {
    let args = Args::parse();
    fen_core::utils::logger::init(&args.log_level, args.json_logs);

    let config = build_config(&args);

    // Configuration and input problems are exit code 1.
    let mut driver = match BacktestDriver::new(config) {
        Ok(driver) => driver,
        Err(err) => {
            eprintln!("configuration error: {}", err);
            return ExitCode::from(1);
        }
    };

    if let Some(path) = &args.replay_log {
        driver = match driver.with_replay_log(path) {
            Ok(driver) => driver,
            Err(err) => {
                eprintln!("cannot open replay log: {:#}", err);
                return ExitCode::from(1);
            }
        };
    }
    if let Some(path) = &args.breach_log {
        driver = match driver.with_breach_log(path) {
            Ok(driver) => driver,
            Err(err) => {
                eprintln!("cannot open breach log: {:#}", err);
                return ExitCode::from(1);
            }
        };
    }

    match driver.load_events(&args.input) {
        Ok(0) => {
            eprintln!("input error: {} contains no events", args.input.display());
            return ExitCode::from(1);
        }
        Ok(_) => {}
        Err(err) => {
            eprintln!("input error: {:#}", err);
            return ExitCode::from(1);
        }
    }

    // Anything failing from here on is a runtime error: exit code 2.
    if args.sweep {
        match driver.run_latency_sweep() {
            Ok(results) => {
                println!("latency_ns,total_pnl,sharpe,fill_rate,adverse_selection");
                for (latency, metrics) in &results {
                    println!(
                        "{},{:.2},{:.3},{:.4},{:.4}",
                        latency,
                        metrics.total_pnl,
                        metrics.sharpe_ratio,
                        metrics.fill_rate,
                        metrics.adverse_selection_ratio
                    );
                }
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("backtest failed: {:#}", err);
                ExitCode::from(2)
            }
        }
    } else {
        match driver.run() {
            Ok(metrics) => {
                println!("{}", metrics);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("backtest failed: {:#}", err);
                ExitCode::from(2)
            }
        }
    }
}
