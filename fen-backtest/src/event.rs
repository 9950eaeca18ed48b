//! Historical event loading
//!
//! Input is a time-sorted CSV with columns
//! `ts_us,event_type,side,price,size,order_id,level`. Timestamps are
//! microseconds and widen to nanoseconds on load. Malformed rows are
//! skipped and counted, never fatal; the loader re-sorts by timestamp
//! so a slightly disordered capture still replays deterministically.

use anyhow::{Context, Result};
use fen_core::core::types::{Side, Tick};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Event taxonomy of the capture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Snapshot,
    Add,
    Modify,
    Cancel,
    Trade,
}

impl EventKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "snapshot" => Some(EventKind::Snapshot),
            "add" => Some(EventKind::Add),
            "modify" => Some(EventKind::Modify),
            "cancel" => Some(EventKind::Cancel),
            "trade" => Some(EventKind::Trade),
            _ => None,
        }
    }
}

/// One replayable market event.
#[derive(Debug, Clone, Copy)]
pub struct HistoricalEvent {
    pub timestamp_ns: i64,
    pub kind: EventKind,
    pub side: Side,
    pub price: f64,
    pub size: u64,
    pub order_id: u64,
    pub level: u32,
}

impl HistoricalEvent {
    /// Reconstruct a market tick. The capture carries one price per
    /// row, so a synthetic 2 bps spread is laid around it; trades carry
    /// their volume and taker side.
    pub fn to_tick(&self, asset_id: u32) -> Tick {
        let half_spread = self.price * 0.0001;
        let mut tick = Tick::quote(
            self.timestamp_ns,
            asset_id,
            self.price - half_spread,
            self.size,
            self.price + half_spread,
            self.size,
        );
        if self.kind == EventKind::Trade {
            tick.trade_volume = self.size;
            tick.trade_side = self.side;
        }
        tick
    }
}

/// Load result: sorted events plus the malformed-row count.
#[derive(Debug)]
pub struct LoadedEvents {
    pub events: Vec<HistoricalEvent>,
    pub malformed_rows: u64,
}

/// Parse one data row; `None` marks it malformed.
fn parse_row(line: &str) -> Option<HistoricalEvent> {
    let mut fields = line.split(',');

    let ts_us: i64 = fields.next()?.trim().parse().ok()?;
    let kind = EventKind::parse(fields.next()?.trim())?;
    let side = match fields.next()?.trim() {
        "S" => Side::Sell,
        _ => Side::Buy,
    };
    let price: f64 = fields.next()?.trim().parse().ok()?;
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    let size: u64 = fields.next()?.trim().parse().ok()?;
    let order_id: u64 = match fields.next() {
        Some(s) if !s.trim().is_empty() => s.trim().parse().ok()?,
        _ => 0,
    };
    let level: u32 = match fields.next() {
        Some(s) if !s.trim().is_empty() => s.trim().parse().ok()?,
        _ => 0,
    };

    Some(HistoricalEvent {
        timestamp_ns: ts_us * 1_000,
        kind,
        side,
        price,
        size,
        order_id,
        level,
    })
}

/// Load and sort a capture file.
pub fn load_csv(path: &Path) -> Result<LoadedEvents> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut events = Vec::new();
    let mut malformed = 0u64;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Header row.
        if line_no == 0 && trimmed.starts_with("ts_us") {
            continue;
        }
        match parse_row(trimmed) {
            Some(event) => events.push(event),
            None => malformed += 1,
        }
    }

    // Chronological order is a replay precondition.
    events.sort_by_key(|e| e.timestamp_ns);

    if malformed > 0 {
        warn!(malformed, "skipped malformed capture rows");
    }
    info!(
        events = events.len(),
        file = %path.display(),
        "loaded historical events"
    );

    Ok(LoadedEvents {
        events,
        malformed_rows: malformed,
    })
}
