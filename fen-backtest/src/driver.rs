//! Deterministic event-replay driver
//!
//! A single-threaded loop over the time-sorted capture. Per event:
//!
//! 1. advance the clock to the event timestamp
//! 2. convert to a tick; feed the intensity engine the inferred side
//! 3. assemble features and call the inference oracle
//! 4. read the intensity imbalance (OBI)
//! 5. run the temporal persistence filter
//! 6. if persistent: price quotes, validate, risk-check, submit
//! 7. run the fill model over every order past its enforced latency
//! 8. mark P&L, record state, emit sampled log lines
//!
//! Everything random flows from one seeded RNG consumed in a fixed
//! order, so a given (input, config, seed) triple replays byte for
//! byte. Fill eligibility always waits out the latency floor, however
//! low the configured latency is.

use crate::config::{BacktestConfig, ConfigError, LATENCY_FLOOR_NS};
use crate::event::{EventKind, HistoricalEvent, LoadedEvents};
use crate::fill::FillModel;
use crate::replay::{file_sha256, BreachLogger, ReplayLogger};
use crate::report::{
    FillRecord, LatencyDistribution, MetricInputs, PerformanceMetrics, SlippageAnalyzer,
};
use crate::temporal::TemporalFilter;
use anyhow::{Context, Result};
use fen_core::core::types::{Order, Side, Tick, TradingEvent};
use fen_core::inference::{FeatureVector, FixedLatencyOracle, InferenceOracle};
use fen_core::intensity::{IntensityEngine, IntensityParams};
use fen_core::quote::{QuoteEngine, QuoteParams};
use fen_core::risk::{RiskGate, RiskLimits};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tracing::{debug, info};

/// Replay asset id; the capture format is single-asset.
const ASSET_ID: u32 = 1;

/// Quoting horizon handed to the quote engine, seconds.
const QUOTE_HORIZON_SECS: f64 = 600.0;

/// Volatility estimate used when too little history has accumulated.
const DEFAULT_VOLATILITY: f64 = 0.20;

/// An order waiting out its modeled latency.
#[derive(Debug, Clone, Copy)]
struct PendingOrder {
    order: Order,
    decision_mid: f64,
    queue_position: f64,
}

/// The deterministic backtest engine.
pub struct BacktestDriver {
    config: BacktestConfig,
    events: Vec<HistoricalEvent>,
    pub malformed_rows: u64,
    input_checksum: Option<String>,

    intensity: IntensityEngine,
    oracle: FixedLatencyOracle,
    quote_engine: QuoteEngine,
    risk: RiskGate,
    temporal: TemporalFilter,
    fill_model: FillModel,
    rng: StdRng,

    current_time_ns: i64,
    position: i64,
    capital: f64,
    realized_pnl: f64,
    unrealized_pnl: f64,
    next_order_id: u64,
    active_orders: Vec<PendingOrder>,
    fill_count: u64,

    // Realized P&L accumulators: Σ side·qty and Σ side·price·qty keep
    // the mark-to-mid of all fills O(1) per tick.
    net_filled_qty: i64,
    signed_fill_cost: f64,

    pnl_history: Vec<f64>,
    timestamps: Vec<i64>,
    quoted_spreads_bps: Vec<f64>,

    submit_to_fill: LatencyDistribution,
    total_rtt: LatencyDistribution,
    slippage: SlippageAnalyzer,

    replay_log: Option<ReplayLogger>,
    breach_log: Option<BreachLogger>,
}

impl BacktestDriver {
    pub fn new(config: BacktestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let quote_engine = Self::build_quote_engine(&config);
        let risk = Self::build_risk_gate(&config);
        let rng = StdRng::seed_from_u64(config.random_seed as u64);

        Ok(Self {
            intensity: IntensityEngine::new(IntensityParams::default()),
            oracle: FixedLatencyOracle::default(),
            quote_engine,
            risk,
            temporal: TemporalFilter::default(),
            fill_model: FillModel::default(),
            rng,
            events: Vec::new(),
            malformed_rows: 0,
            input_checksum: None,
            current_time_ns: 0,
            position: 0,
            capital: config.initial_capital,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            next_order_id: 1,
            active_orders: Vec::new(),
            fill_count: 0,
            net_filled_qty: 0,
            signed_fill_cost: 0.0,
            pnl_history: Vec::new(),
            timestamps: Vec::new(),
            quoted_spreads_bps: Vec::new(),
            submit_to_fill: LatencyDistribution::new(),
            total_rtt: LatencyDistribution::new(),
            slippage: SlippageAnalyzer::new(),
            replay_log: None,
            breach_log: None,
            config,
        })
    }

    fn build_quote_engine(config: &BacktestConfig) -> QuoteEngine {
        QuoteEngine::new(QuoteParams {
            risk_aversion: 0.01,
            volatility: DEFAULT_VOLATILITY,
            order_arrival_rate: 10.0,
            tick_size: 0.01,
            max_inventory: config.max_position,
            system_latency_ns: config.simulated_latency_ns,
        })
    }

    fn build_risk_gate(config: &BacktestConfig) -> RiskGate {
        RiskGate::new(RiskLimits {
            max_position: config.max_position,
            max_order_notional: 50_000.0,
            max_daily_loss: 100_000.0,
            deny_naked_short: false,
        })
    }

    /// Attach the event replay log. Must precede `load_events` for the
    /// header to carry the input checksum.
    pub fn with_replay_log(mut self, path: &Path) -> Result<Self> {
        self.replay_log = Some(ReplayLogger::create(path)?);
        Ok(self)
    }

    /// Attach the risk-breach log.
    pub fn with_breach_log(mut self, path: &Path) -> Result<Self> {
        self.breach_log = Some(BreachLogger::create(path)?);
        Ok(self)
    }

    /// Load the capture, checksum it, and write the replay header.
    pub fn load_events(&mut self, path: &Path) -> Result<usize> {
        let LoadedEvents {
            events,
            malformed_rows,
        } = crate::event::load_csv(path)?;
        let checksum = file_sha256(path)?;

        if let Some(log) = self.replay_log.as_mut() {
            log.log_header(&self.config, &checksum)
                .context("writing replay header")?;
        }

        info!(
            events = events.len(),
            malformed_rows,
            sha256 = %checksum,
            "capture ready for replay"
        );
        self.events = events;
        self.malformed_rows = malformed_rows;
        self.input_checksum = Some(checksum);
        Ok(self.events.len())
    }

    /// Inject pre-built events (tests, generators). No checksum.
    pub fn set_events(&mut self, events: Vec<HistoricalEvent>) {
        self.events = events;
    }

    /// Run the configured backtest once.
    pub fn run(&mut self) -> Result<PerformanceMetrics> {
        self.reset_run_state();
        info!(
            simulated_latency_ns = self.config.simulated_latency_ns,
            effective_latency_ns = self.config.effective_latency_ns(),
            seed = self.config.random_seed,
            events = self.events.len(),
            "starting deterministic replay"
        );

        let events = std::mem::take(&mut self.events);
        let mut previous_tick: Option<Tick> = None;
        let mut reference_tick: Option<Tick> = None;

        for (index, event) in events.iter().enumerate() {
            self.current_time_ns = event.timestamp_ns;
            let tick = event.to_tick(ASSET_ID);

            let Some(prev) = previous_tick else {
                previous_tick = Some(tick);
                reference_tick = Some(tick);
                continue;
            };
            let reference = reference_tick.unwrap_or(tick);

            // Trades drive the point process on their taker side;
            // quote updates count as passive buy-side book activity.
            let event_side = if event.kind == EventKind::Trade {
                event.side
            } else {
                Side::Buy
            };
            self.intensity.update(TradingEvent::new(
                self.current_time_ns,
                event_side,
                ASSET_ID,
            ));

            let features = FeatureVector::assemble(
                &tick,
                &prev,
                &reference,
                self.intensity.buy_intensity(),
                self.intensity.sell_intensity(),
            );
            let _prediction = self.oracle.predict(&features);

            let obi = self.intensity.imbalance();
            if self.temporal.observe(obi, self.current_time_ns) {
                self.try_submit_quotes(&tick, obi)?;
            }

            self.process_fills(&tick)?;
            self.update_pnl(tick.mid_price);
            self.record_state(&tick);

            if let Some(log) = self.replay_log.as_mut() {
                if index % 100 == 0 {
                    log.log_tick(
                        self.current_time_ns,
                        tick.bid_price,
                        tick.ask_price,
                        tick.bid_size,
                        tick.ask_size,
                    )?;
                }
                if index % 1000 == 0 {
                    log.log_pnl(
                        self.current_time_ns,
                        self.realized_pnl,
                        self.unrealized_pnl,
                        self.position,
                    )?;
                }
            }

            previous_tick = Some(tick);
        }

        let final_mid = previous_tick.map(|t| t.mid_price).unwrap_or(0.0);
        self.events = events;

        if let Some(log) = self.replay_log.as_mut() {
            log.flush()?;
        }
        if let Some(log) = self.breach_log.as_mut() {
            log.flush()?;
        }

        let metrics = PerformanceMetrics::compute(MetricInputs {
            pnl_history: &self.pnl_history,
            timestamps: &self.timestamps,
            quoted_spreads_bps: &self.quoted_spreads_bps,
            fills: self.slippage.fills(),
            orders_submitted: self.next_order_id - 1,
            initial_capital: self.config.initial_capital,
            final_mid,
        });

        info!(
            total_pnl = metrics.total_pnl,
            trades = metrics.total_trades,
            fill_rate = metrics.fill_rate,
            "replay complete"
        );
        let submit_stats = self.submit_to_fill.stats();
        let rtt_stats = self.total_rtt.stats();
        debug!(
            fills = submit_stats.count,
            mean_ns = submit_stats.mean_ns,
            p99_ns = submit_stats.p99_ns,
            "submit-to-fill latency"
        );
        debug!(
            mean_ns = rtt_stats.mean_ns,
            p99_ns = rtt_stats.p99_ns,
            "total round-trip latency"
        );

        Ok(metrics)
    }

    /// One backtest per sweep latency; returns (latency, metrics) in
    /// sweep order.
    pub fn run_latency_sweep(&mut self) -> Result<Vec<(i64, PerformanceMetrics)>> {
        let sweep = self.config.latency_sweep_ns.clone();
        let mut results = Vec::with_capacity(sweep.len());

        for latency_ns in sweep {
            info!(latency_ns, "sweep: running backtest");
            self.config.simulated_latency_ns = latency_ns;
            self.quote_engine = Self::build_quote_engine(&self.config);
            let metrics = self.run()?;
            info!(
                latency_ns,
                pnl = metrics.total_pnl,
                sharpe = metrics.sharpe_ratio,
                fill_rate = metrics.fill_rate,
                "sweep: result"
            );
            results.push((latency_ns, metrics));
        }
        Ok(results)
    }

    fn reset_run_state(&mut self) {
        self.rng = StdRng::seed_from_u64(self.config.random_seed as u64);
        self.intensity.reset();
        self.temporal.reset();
        self.risk = Self::build_risk_gate(&self.config);

        self.current_time_ns = 0;
        self.position = 0;
        self.capital = self.config.initial_capital;
        self.realized_pnl = 0.0;
        self.unrealized_pnl = 0.0;
        self.next_order_id = 1;
        self.active_orders.clear();
        self.fill_count = 0;
        self.net_filled_qty = 0;
        self.signed_fill_cost = 0.0;
        self.pnl_history.clear();
        self.timestamps.clear();
        self.quoted_spreads_bps.clear();
        self.submit_to_fill.clear();
        self.total_rtt.clear();
        self.slippage.clear();
    }

    fn try_submit_quotes(&mut self, tick: &Tick, obi: f64) -> Result<()> {
        let latency_cost = self
            .quote_engine
            .latency_cost(self.estimate_volatility(), tick.mid_price);
        let quotes = self.quote_engine.quotes(
            tick.mid_price,
            self.position,
            QUOTE_HORIZON_SECS,
            latency_cost,
            self.current_time_ns,
        );

        if !quotes.is_quotable() {
            return Ok(());
        }
        if !self.quote_engine.should_quote(quotes.spread, latency_cost) {
            return Ok(());
        }

        if let Some(log) = self.replay_log.as_mut() {
            log.log_signal(
                self.current_time_ns,
                self.temporal.direction(),
                self.temporal.average_strength(),
                self.temporal.confirmation_ticks(),
                obi,
            )?;
        }

        let bid_qty = quotes.bid_size.round() as u64;
        let ask_qty = quotes.ask_size.round() as u64;
        self.submit_order(Side::Buy, quotes.bid_price, bid_qty, tick)?;
        self.submit_order(Side::Sell, quotes.ask_price, ask_qty, tick)?;
        Ok(())
    }

    fn submit_order(&mut self, side: Side, price: f64, quantity: u64, tick: &Tick) -> Result<()> {
        if price <= 0.0 || quantity == 0 {
            return Ok(());
        }
        let order = Order::new(
            self.next_order_id,
            ASSET_ID,
            side,
            price,
            quantity,
            self.current_time_ns,
        );

        if let Err(denial) = self.risk.check(&order, self.position) {
            if let Some(log) = self.breach_log.as_mut() {
                log.log_breach(self.current_time_ns, &denial)?;
            }
            return Ok(());
        }

        self.next_order_id += 1;
        let pending = PendingOrder {
            order,
            decision_mid: tick.mid_price,
            queue_position: self.fill_model.queue_position(side, tick),
        };
        self.active_orders.push(pending);

        if let Some(log) = self.replay_log.as_mut() {
            log.log_submit(self.current_time_ns, order.order_id, side, price, quantity)?;
        }
        Ok(())
    }

    /// Check every pending order against the enforced latency and run
    /// the fill model on the eligible ones. Orders that miss their fill
    /// draw are cancelled, not left to rot.
    fn process_fills(&mut self, tick: &Tick) -> Result<()> {
        let enforced_latency = self.config.simulated_latency_ns.max(LATENCY_FLOOR_NS);
        let volatility = self.estimate_volatility();

        let mut index = 0;
        while index < self.active_orders.len() {
            let pending = self.active_orders[index];
            let elapsed = self.current_time_ns - pending.order.submit_time_ns;
            if elapsed < enforced_latency {
                index += 1;
                continue;
            }

            // Eligible: fill or cancel, either way the slot is consumed.
            let removed = self.active_orders.remove(index);
            let probability = self.fill_model.fill_probability(
                &removed.order,
                tick,
                removed.queue_position,
                volatility,
                elapsed / 1_000,
                self.config.enable_adverse_selection,
            );
            let draw: f64 = self.rng.gen();

            if draw < probability {
                self.apply_fill(&removed, tick, elapsed)?;
            } else if let Some(log) = self.replay_log.as_mut() {
                log.log_cancel(
                    self.current_time_ns,
                    removed.order.order_id,
                    removed.order.side,
                    removed.order.price,
                    removed.order.quantity,
                )?;
            }
        }
        Ok(())
    }

    fn apply_fill(&mut self, pending: &PendingOrder, tick: &Tick, elapsed_ns: i64) -> Result<()> {
        let order = &pending.order;
        let mut fill_price = order.price;

        if self.config.enable_slippage {
            let visible = match order.side {
                Side::Buy => tick.bid_size,
                Side::Sell => tick.ask_size,
            };
            let impact = self
                .fill_model
                .slippage(tick.mid_price, order.quantity, visible);
            fill_price += match order.side {
                Side::Buy => impact,
                Side::Sell => -impact,
            };
        }

        let signed_qty = order.signed_quantity();
        self.position += signed_qty;
        self.capital -= self.config.commission_per_share * order.quantity as f64;

        self.net_filled_qty += signed_qty;
        self.signed_fill_cost += signed_qty as f64 * fill_price;
        self.fill_count += 1;

        self.submit_to_fill.add_sample(elapsed_ns);
        self.total_rtt.add_sample(elapsed_ns);
        self.slippage.add_fill(FillRecord {
            ts_ns: self.current_time_ns,
            side: order.side,
            fill_price,
            decision_mid: pending.decision_mid,
            fill_mid: tick.mid_price,
            quantity: order.quantity,
        });

        if let Some(log) = self.replay_log.as_mut() {
            log.log_fill(
                self.current_time_ns,
                order.order_id,
                order.side,
                fill_price,
                order.quantity,
                elapsed_ns,
                pending.decision_mid,
                tick.mid_price,
            )?;
        }
        Ok(())
    }

    fn update_pnl(&mut self, mid_price: f64) {
        let previous_realized = self.realized_pnl;
        // Mark-to-mid of everything filled so far.
        self.realized_pnl = mid_price * self.net_filled_qty as f64 - self.signed_fill_cost;
        self.unrealized_pnl = self.position as f64 * mid_price;
        self.risk.record_pnl(self.realized_pnl - previous_realized);
    }

    fn record_state(&mut self, tick: &Tick) {
        self.pnl_history.push(self.realized_pnl + self.unrealized_pnl);
        self.timestamps.push(self.current_time_ns);
        self.quoted_spreads_bps.push(tick.spread_bps());
    }

    /// Realized volatility from the recent equity path; the default
    /// estimate until enough history exists.
    fn estimate_volatility(&self) -> f64 {
        if self.pnl_history.len() < 10 {
            return DEFAULT_VOLATILITY;
        }
        let window = &self.pnl_history[self.pnl_history.len().saturating_sub(100)..];
        let returns: Vec<f64> = window
            .windows(2)
            .map(|w| (w[1] - w[0]) / (w[0].abs() + 1e-10))
            .collect();
        if returns.is_empty() {
            return DEFAULT_VOLATILITY;
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let mut sq_sum = 0.0;
        for r in &returns {
            sq_sum += (r - mean) * (r - mean);
        }
        ((sq_sum / n) * fen_core::quote::TRADING_SECONDS_PER_YEAR).sqrt()
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn fill_count(&self) -> u64 {
        self.fill_count
    }

    pub fn orders_submitted(&self) -> u64 {
        self.next_order_id - 1
    }

    pub fn input_checksum(&self) -> Option<&str> {
        self.input_checksum.as_deref()
    }

    pub fn submit_to_fill_latency(&self) -> &LatencyDistribution {
        &self.submit_to_fill
    }

    pub fn total_rtt_latency(&self) -> &LatencyDistribution {
        &self.total_rtt
    }

    pub fn slippage_analyzer(&self) -> &SlippageAnalyzer {
        &self.slippage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    /// A capture with persistent one-sided buy flow and a trend steep
    /// enough that resting asks are crossed by the next tick: the
    /// temporal filter passes and every eligible ask is marketable, so
    /// fills draw at exp(-latency_us/1000) against the seeded RNG and
    /// the runs stay deterministic.
    fn trending_events(count: usize) -> Vec<HistoricalEvent> {
        (0..count)
            .map(|i| HistoricalEvent {
                timestamp_ns: (i as i64 + 1) * 1_000_000, // 1 ms apart
                kind: EventKind::Trade,
                side: Side::Buy,
                price: 100.0 + i as f64 * 0.12,
                size: 100,
                order_id: 0,
                level: 0,
            })
            .collect()
    }

    fn driver_with(config: BacktestConfig, events: Vec<HistoricalEvent>) -> BacktestDriver {
        let mut driver = BacktestDriver::new(config).unwrap();
        driver.set_events(events);
        driver
    }

    #[test]
    fn test_replay_produces_trades_on_persistent_flow() {
        let mut driver = driver_with(BacktestConfig::default(), trending_events(300));
        let metrics = driver.run().unwrap();

        assert!(driver.orders_submitted() > 0, "persistent flow must quote");
        assert!(driver.fill_count() > 0, "some orders must fill");
        assert_eq!(metrics.total_trades, driver.fill_count());
        assert!(metrics.fill_rate > 0.0 && metrics.fill_rate <= 1.0);
        assert!(!metrics.equity_curve.is_empty());
    }

    #[test]
    fn test_no_orders_without_persistence() {
        // Alternating sides flip the filter every tick.
        let events: Vec<HistoricalEvent> = (0..100)
            .map(|i| HistoricalEvent {
                timestamp_ns: (i as i64 + 1) * 1_000_000,
                kind: EventKind::Trade,
                side: if i % 2 == 0 { Side::Buy } else { Side::Sell },
                price: 100.0,
                size: 100,
                order_id: 0,
                level: 0,
            })
            .collect();

        let mut driver = driver_with(BacktestConfig::default(), events);
        driver.run().unwrap();
        assert_eq!(driver.orders_submitted(), 0);
    }

    #[test]
    fn test_latency_floor_enforced_on_fills() {
        let config = BacktestConfig {
            simulated_latency_ns: 0, // try to go below the floor
            ..Default::default()
        };
        let mut driver = driver_with(config, trending_events(300));
        driver.run().unwrap();

        assert!(driver.fill_count() > 0);
        for &sample in driver.submit_to_fill_latency().samples() {
            assert!(
                sample >= LATENCY_FLOOR_NS,
                "fill at {} ns beat the {} ns floor",
                sample,
                LATENCY_FLOOR_NS
            );
        }
    }

    #[test]
    fn test_identical_seeds_identical_metrics() {
        let run = || {
            let mut driver = driver_with(BacktestConfig::default(), trending_events(300));
            driver.run().unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.total_pnl, b.total_pnl);
        assert_eq!(a.total_trades, b.total_trades);
        assert_eq!(a.equity_curve, b.equity_curve);
    }

    #[test]
    fn test_different_seeds_may_diverge_fills() {
        let metrics_for_seed = |seed| {
            let config = BacktestConfig {
                random_seed: seed,
                ..Default::default()
            };
            let mut driver = driver_with(config, trending_events(300));
            driver.run().unwrap();
            driver.fill_count()
        };
        // Not asserting inequality (they could coincide), only that
        // both seeds run cleanly end to end.
        let _ = metrics_for_seed(42);
        let _ = metrics_for_seed(1337);
    }

    #[test]
    fn test_position_respects_configured_limit() {
        let config = BacktestConfig {
            max_position: 150,
            ..Default::default()
        };
        let mut driver = driver_with(config, trending_events(500));
        driver.run().unwrap();
        assert!(driver.position().abs() <= 150, "position limit breached");
    }

    #[test]
    fn test_sweep_runs_each_latency() {
        let config = BacktestConfig {
            latency_sweep_ns: vec![100, 1_000],
            run_latency_sweep: true,
            ..Default::default()
        };
        let mut driver = driver_with(config, trending_events(200));
        let results = driver.run_latency_sweep().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 100);
        assert_eq!(results[1].0, 1_000);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BacktestConfig {
            initial_capital: -5.0,
            ..Default::default()
        };
        assert!(BacktestDriver::new(config).is_err());
    }
}
