//! Replay and breach logging
//!
//! Append-only text logs that make a run reproducible and auditable:
//! a JSON header binding the configuration to a content checksum of
//! the input file, then one line per order event / sampled tick / P&L
//! checkpoint. Two runs with the same input, config and seed must
//! produce byte-identical files.

use crate::config::BacktestConfig;
use anyhow::{Context, Result};
use fen_core::core::types::Side;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// SHA-256 of a file's contents, lowercase hex.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Event replay log writer.
pub struct ReplayLogger {
    writer: BufWriter<File>,
}

impl ReplayLogger {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// The run header: config fields plus the input checksum.
    pub fn log_header(&mut self, config: &BacktestConfig, input_sha256: &str) -> Result<()> {
        let header = json!({
            "simulated_latency_ns": config.simulated_latency_ns,
            "random_seed": config.random_seed,
            "max_position": config.max_position,
            "commission": config.commission_per_share,
            "input_sha256": input_sha256,
        });
        writeln!(self.writer, "{}", header)?;
        Ok(())
    }

    pub fn log_submit(
        &mut self,
        ts_ns: i64,
        order_id: u64,
        side: Side,
        price: f64,
        qty: u64,
    ) -> Result<()> {
        writeln!(
            self.writer,
            "ts_ns={} order_id={} side={} price={:.6} qty={} event=submit",
            ts_ns, order_id, side, price, qty
        )?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_fill(
        &mut self,
        ts_ns: i64,
        order_id: u64,
        side: Side,
        price: f64,
        qty: u64,
        latency_ns: i64,
        decision_mid: f64,
        fill_mid: f64,
    ) -> Result<()> {
        writeln!(
            self.writer,
            "ts_ns={} order_id={} side={} price={:.6} qty={} event=fill latency_ns={} decision_mid={:.6} fill_mid={:.6}",
            ts_ns, order_id, side, price, qty, latency_ns, decision_mid, fill_mid
        )?;
        Ok(())
    }

    pub fn log_cancel(
        &mut self,
        ts_ns: i64,
        order_id: u64,
        side: Side,
        price: f64,
        qty: u64,
    ) -> Result<()> {
        writeln!(
            self.writer,
            "ts_ns={} order_id={} side={} price={:.6} qty={} event=cancel",
            ts_ns, order_id, side, price, qty
        )?;
        Ok(())
    }

    /// Sampled market state, kept sparse to bound log growth.
    pub fn log_tick(
        &mut self,
        ts_ns: i64,
        bid: f64,
        ask: f64,
        bid_size: u64,
        ask_size: u64,
    ) -> Result<()> {
        writeln!(
            self.writer,
            "ts_ns={} event=tick bid={:.6} ask={:.6} bid_size={} ask_size={}",
            ts_ns, bid, ask, bid_size, ask_size
        )?;
        Ok(())
    }

    pub fn log_pnl(
        &mut self,
        ts_ns: i64,
        realized: f64,
        unrealized: f64,
        position: i64,
    ) -> Result<()> {
        writeln!(
            self.writer,
            "ts_ns={} event=pnl realized={:.6} unrealized={:.6} position={}",
            ts_ns, realized, unrealized, position
        )?;
        Ok(())
    }

    pub fn log_signal(
        &mut self,
        ts_ns: i64,
        direction: f64,
        strength: f64,
        confirmation_ticks: u32,
        obi: f64,
    ) -> Result<()> {
        let side = if direction > 0.0 { "BUY" } else { "SELL" };
        writeln!(
            self.writer,
            "ts_ns={} event=signal side={} strength={:.6} ticks={} obi={:.6}",
            ts_ns, side, strength, confirmation_ticks, obi
        )?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Risk-breach log: one line per denial.
pub struct BreachLogger {
    writer: BufWriter<File>,
    breaches: u64,
}

impl BreachLogger {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            breaches: 0,
        })
    }

    pub fn log_breach(&mut self, ts_ns: i64, reason: &dyn std::fmt::Display) -> Result<()> {
        self.breaches += 1;
        writeln!(self.writer, "ts_ns={} event=risk_denied reason=\"{}\"", ts_ns, reason)?;
        Ok(())
    }

    pub fn breach_count(&self) -> u64 {
        self.breaches
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
