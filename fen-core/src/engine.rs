//! The tick-to-trade pipeline
//!
//! Composes the stages in dependency order and runs them single
//! threaded on one pinned core:
//!
//! ```text
//! feed ring ─▶ OrderBook ─▶ IntensityEngine ─▶ features ─▶ oracle
//!                                                            │
//!           order ring ◀─ RiskGate ◀─ QuoteEngine ◀──────────┘
//! ```
//!
//! The pipeline is generic over the [`InferenceOracle`] so the oracle
//! call monomorphizes; there is no dynamic dispatch on the hot path.
//! Errors never unwind across stages: a sequence gap parks the book in
//! recovery, content errors are counted and dropped, risk denials are
//! counted and logged.

use crate::book::{BookUpdate, OrderBook, UpdateKind};
use crate::core::types::{Order, QuotePair, Side, Tick, TradingEvent};
use crate::inference::{FeatureVector, InferenceOracle};
use crate::intensity::{IntensityEngine, IntensityParams};
use crate::perf::clock;
use crate::perf::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::queue::SpscQueue;
use crate::quote::{QuoteEngine, QuoteParams};
use crate::risk::{RiskGate, RiskLimits};
use crate::shutdown::ShutdownFlag;
use std::sync::Arc;
use tracing::{debug, info};

/// Pipeline wiring parameters.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub asset_id: u32,
    /// Quoting horizon T, seconds.
    pub session_horizon_secs: f64,
    /// Volatility estimate feeding the latency-cost model.
    pub volatility_estimate: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            asset_id: 1,
            session_horizon_secs: 600.0,
            volatility_estimate: 0.20,
        }
    }
}

/// The per-update output of the pipeline: at most one order per side.
#[derive(Debug, Clone, Copy)]
pub struct QuoteDecision {
    pub pair: QuotePair,
    pub bid: Option<Order>,
    pub ask: Option<Order>,
}

/// End-of-run summary.
#[derive(Debug, Clone, Copy)]
pub struct PipelineStats {
    pub updates_processed: u64,
    pub quotes_generated: u64,
    pub orders_emitted: u64,
    pub risk_denials: u64,
    pub gaps_detected: u64,
    pub final_position: i64,
}

pub struct Pipeline<O: InferenceOracle> {
    config: PipelineConfig,
    book: OrderBook,
    intensity: IntensityEngine,
    quote_engine: QuoteEngine,
    risk: RiskGate,
    oracle: O,

    position: i64,
    next_order_id: u64,
    previous_tick: Tick,
    reference_tick: Tick,
    seen_first_tick: bool,

    metrics: Arc<PipelineMetrics>,
}

impl<O: InferenceOracle> Pipeline<O> {
    pub fn new(
        config: PipelineConfig,
        intensity_params: IntensityParams,
        quote_params: QuoteParams,
        risk_limits: RiskLimits,
        oracle: O,
    ) -> Self {
        info!(
            asset_id = config.asset_id,
            horizon = config.session_horizon_secs,
            "initializing pipeline"
        );
        // Fix the process epoch before the hot loop ever reads it.
        clock::calibrate();
        Self {
            book: OrderBook::new(),
            intensity: IntensityEngine::new(intensity_params),
            quote_engine: QuoteEngine::new(quote_params),
            risk: RiskGate::new(risk_limits),
            oracle,
            position: 0,
            next_order_id: 1,
            previous_tick: Tick::empty(0, config.asset_id),
            reference_tick: Tick::empty(0, config.asset_id),
            seen_first_tick: false,
            metrics: Arc::new(PipelineMetrics::new()),
            config,
        }
    }

    /// Process one sequenced update end to end.
    ///
    /// Returns the quote decision when the update resulted in orders
    /// clearing the gate; `None` for gaps, content errors, non-quotable
    /// books and risk denials on both sides.
    pub fn process_update(&mut self, update: &BookUpdate) -> Option<QuoteDecision> {
        if let Err(err) = self.book.apply_update(update) {
            use crate::core::errors::BookError;
            match err {
                BookError::SequenceGap { .. } => self.metrics.inc_gaps(),
                BookError::GapPending => {}
                other => debug!(%other, "update dropped"),
            }
            return None;
        }
        self.metrics.inc_updates();

        // Executions drive the point process; the taker direction is
        // the event side.
        if update.kind == UpdateKind::Execute {
            let side = if update.is_bid { Side::Buy } else { Side::Sell };
            self.intensity.update(TradingEvent::new(
                update.timestamp_ns,
                side,
                self.config.asset_id,
            ));
        }

        let mut tick = self.book.as_tick(update.timestamp_ns, self.config.asset_id);
        if update.kind == UpdateKind::Execute {
            tick.trade_volume = update.quantity as u64;
            tick.trade_side = if update.is_bid { Side::Buy } else { Side::Sell };
        }

        if !tick.is_valid() {
            self.remember(tick);
            return None;
        }

        let features = FeatureVector::assemble(
            &tick,
            &self.previous_tick,
            &self.reference_tick,
            self.intensity.buy_intensity(),
            self.intensity.sell_intensity(),
        );
        let _prediction = self.oracle.predict(&features);

        let latency_cost = self
            .quote_engine
            .latency_cost(self.config.volatility_estimate, tick.mid_price);
        let pair = self.quote_engine.quotes(
            tick.mid_price,
            self.position,
            self.config.session_horizon_secs,
            latency_cost,
            update.timestamp_ns,
        );

        self.remember(tick);

        if !pair.is_quotable() || !self.quote_engine.should_quote(pair.spread, latency_cost) {
            return None;
        }
        self.metrics.inc_quotes();

        let multiplier = self.risk.size_multiplier();
        let bid = self.gated_order(Side::Buy, pair.bid_price, pair.bid_size * multiplier, update);
        let ask = self.gated_order(Side::Sell, pair.ask_price, pair.ask_size * multiplier, update);

        if bid.is_none() && ask.is_none() {
            return None;
        }
        Some(QuoteDecision { pair, bid, ask })
    }

    fn gated_order(
        &mut self,
        side: Side,
        price: f64,
        size: f64,
        update: &BookUpdate,
    ) -> Option<Order> {
        let quantity = size.round() as u64;
        if quantity == 0 || price <= 0.0 {
            return None;
        }
        let order = Order::new(
            self.next_order_id,
            self.config.asset_id,
            side,
            price,
            quantity,
            update.timestamp_ns,
        );
        match self.risk.check(&order, self.position) {
            Ok(()) => {
                self.next_order_id += 1;
                self.metrics.inc_orders();
                Some(order)
            }
            Err(_) => {
                self.metrics.inc_denials();
                None
            }
        }
    }

    fn remember(&mut self, tick: Tick) {
        if !self.seen_first_tick && tick.is_valid() {
            self.reference_tick = tick;
            self.seen_first_tick = true;
        }
        self.previous_tick = tick;
    }

    /// Drain the feed ring until it is empty, pushing emitted orders to
    /// the outbound ring. Full outbound pushes are counted, never
    /// silently dropped.
    pub fn drain<const N: usize, const M: usize>(
        &mut self,
        feed: &SpscQueue<BookUpdate, N>,
        orders_out: &SpscQueue<Order, M>,
    ) {
        while let Some(update) = feed.pop() {
            let started_ns = clock::now_ns();
            if let Some(decision) = self.process_update(&update) {
                for order in [decision.bid, decision.ask].into_iter().flatten() {
                    if !orders_out.push(order) {
                        self.metrics.inc_order_overflows();
                        tracing::warn!(order_id = order.order_id, "order ring full");
                    }
                }
            }
            self.metrics
                .add_latency((clock::now_ns() - started_ns) as u64);
        }
    }

    /// Push a metrics snapshot onto the telemetry ring. Telemetry is
    /// lossy by design: a full ring counts a drop and moves on.
    pub fn publish_telemetry<const K: usize>(
        &self,
        telemetry: &SpscQueue<MetricsSnapshot, K>,
    ) -> bool {
        let delivered = telemetry.push(self.metrics.snapshot());
        if !delivered {
            self.metrics.inc_telemetry_drops();
        }
        delivered
    }

    /// Run until shutdown is requested, spinning on an empty feed. The
    /// shutdown flag is checked between events only.
    pub fn run<const N: usize, const M: usize>(
        &mut self,
        feed: &SpscQueue<BookUpdate, N>,
        orders_out: &SpscQueue<Order, M>,
        shutdown: &ShutdownFlag,
    ) -> PipelineStats {
        info!("pipeline loop started");
        while !shutdown.is_requested() {
            match feed.pop() {
                Some(update) => {
                    let started_ns = clock::now_ns();
                    if let Some(decision) = self.process_update(&update) {
                        for order in [decision.bid, decision.ask].into_iter().flatten() {
                            if !orders_out.push(order) {
                                self.metrics.inc_order_overflows();
                                tracing::warn!(order_id = order.order_id, "order ring full");
                            }
                        }
                    }
                    self.metrics
                        .add_latency((clock::now_ns() - started_ns) as u64);
                }
                None => std::hint::spin_loop(),
            }
        }
        info!("pipeline loop stopped");
        self.stats()
    }

    pub fn stats(&self) -> PipelineStats {
        let snap = self.metrics.snapshot();
        PipelineStats {
            updates_processed: snap.updates_applied,
            quotes_generated: snap.quotes_generated,
            orders_emitted: snap.orders_emitted,
            risk_denials: snap.risk_denials,
            gaps_detected: snap.gaps_detected,
            final_position: self.position,
        }
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut OrderBook {
        &mut self.book
    }

    pub fn risk_mut(&mut self) -> &mut RiskGate {
        &mut self.risk
    }

    /// Position is owned by the execution layer; the pipeline reads it
    /// for skew and risk and is told about fills from outside.
    pub fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    pub fn position(&self) -> i64 {
        self.position
    }
}
