//! Lock-free pipeline counters
//!
//! Cache-aligned atomic counters, one per cache line so concurrent
//! telemetry reads never share a line with the pipeline thread's
//! writes. All increments use relaxed ordering; nothing reads these to
//! drive control flow.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the tick-to-trade pipeline.
#[repr(C, align(64))]
pub struct PipelineMetrics {
    /// Book updates applied.
    pub updates_applied: AtomicU64,
    _pad1: [u8; 56],

    /// Sequence gaps detected.
    pub gaps_detected: AtomicU64,
    _pad2: [u8; 56],

    /// Quote decisions produced.
    pub quotes_generated: AtomicU64,
    _pad3: [u8; 56],

    /// Orders that passed risk and were emitted.
    pub orders_emitted: AtomicU64,
    _pad4: [u8; 56],

    /// Orders denied by the risk gate.
    pub risk_denials: AtomicU64,
    _pad5: [u8; 56],

    /// Failed pushes onto the outbound order ring.
    pub order_queue_overflows: AtomicU64,
    _pad6: [u8; 56],

    /// Telemetry snapshots dropped (acceptable by design, but counted).
    pub telemetry_drops: AtomicU64,
    _pad7: [u8; 56],

    /// Cumulative per-update processing time.
    pub total_latency_ns: AtomicU64,
    _pad8: [u8; 56],
}

impl PipelineMetrics {
    pub const fn new() -> Self {
        Self {
            updates_applied: AtomicU64::new(0),
            _pad1: [0; 56],
            gaps_detected: AtomicU64::new(0),
            _pad2: [0; 56],
            quotes_generated: AtomicU64::new(0),
            _pad3: [0; 56],
            orders_emitted: AtomicU64::new(0),
            _pad4: [0; 56],
            risk_denials: AtomicU64::new(0),
            _pad5: [0; 56],
            order_queue_overflows: AtomicU64::new(0),
            _pad6: [0; 56],
            telemetry_drops: AtomicU64::new(0),
            _pad7: [0; 56],
            total_latency_ns: AtomicU64::new(0),
            _pad8: [0; 56],
        }
    }

    #[inline(always)]
    pub fn inc_updates(&self) {
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_gaps(&self) {
        self.gaps_detected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_quotes(&self) {
        self.quotes_generated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_orders(&self) {
        self.orders_emitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_denials(&self) {
        self.risk_denials.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_order_overflows(&self) {
        self.order_queue_overflows.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_telemetry_drops(&self) {
        self.telemetry_drops.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn add_latency(&self, nanos: u64) {
        self.total_latency_ns.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            gaps_detected: self.gaps_detected.load(Ordering::Relaxed),
            quotes_generated: self.quotes_generated.load(Ordering::Relaxed),
            orders_emitted: self.orders_emitted.load(Ordering::Relaxed),
            risk_denials: self.risk_denials.load(Ordering::Relaxed),
            order_queue_overflows: self.order_queue_overflows.load(Ordering::Relaxed),
            telemetry_drops: self.telemetry_drops.load(Ordering::Relaxed),
            total_latency_ns: self.total_latency_ns.load(Ordering::Relaxed),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Copyable snapshot crossing the telemetry queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub updates_applied: u64,
    pub gaps_detected: u64,
    pub quotes_generated: u64,
    pub orders_emitted: u64,
    pub risk_denials: u64,
    pub order_queue_overflows: u64,
    pub telemetry_drops: u64,
    pub total_latency_ns: u64,
}

impl MetricsSnapshot {
    /// Average processing time per applied update.
    pub fn avg_latency_ns(&self) -> f64 {
        if self.updates_applied == 0 {
            return 0.0;
        }
        self.total_latency_ns as f64 / self.updates_applied as f64
    }

    /// Quote decisions per applied update.
    pub fn quote_rate(&self) -> f64 {
        if self.updates_applied == 0 {
            return 0.0;
        }
        self.quotes_generated as f64 / self.updates_applied as f64
    }
}
