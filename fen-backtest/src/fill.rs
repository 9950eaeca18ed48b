//! Empirical fill-probability and market-impact model
//!
//! A resting order's fill probability starts at a calibrated base and
//! is scaled by queue position, spread, volatility, latency and adverse
//! price movement. Orders priced through the opposite touch are
//! marketable: their probability resets to certainty before the latency
//! and adverse-move penalties; orders far behind the market are
//! penalized hard.
//!
//! The fill decision itself is a uniform draw from the driver's seeded
//! RNG, so identical runs fill identically.

use fen_core::core::types::{Order, Side, Tick};

/// Model coefficients.
#[derive(Debug, Clone, Copy)]
pub struct FillParams {
    pub base_fill_probability: f64,
    pub queue_position_decay: f64,
    pub spread_sensitivity: f64,
    pub volatility_impact: f64,
    pub adverse_selection_penalty: f64,
    pub latency_penalty_per_us: f64,
}

impl Default for FillParams {
    fn default() -> Self {
        Self {
            base_fill_probability: 0.70,
            queue_position_decay: 0.15,
            spread_sensitivity: 0.05,
            volatility_impact: 0.10,
            adverse_selection_penalty: 0.20,
            latency_penalty_per_us: 0.001,
        }
    }
}

/// The probability model. Stateless; all state lives in the driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct FillModel {
    params: FillParams,
}

impl FillModel {
    pub fn new(params: FillParams) -> Self {
        Self { params }
    }

    /// Fill probability for `order` given the market at eligibility
    /// time. `queue_position` is the estimated displayed size ahead of
    /// the order; `volatility` is the current annualized estimate;
    /// `latency_us` is the elapsed submit-to-check time.
    pub fn fill_probability(
        &self,
        order: &Order,
        tick: &Tick,
        queue_position: f64,
        volatility: f64,
        latency_us: i64,
        adverse_selection_enabled: bool,
    ) -> f64 {
        // Price aggressiveness. An order through the opposite touch is
        // marketable: the probability resets to certainty, making the
        // queue, spread and volatility factors moot. The timing
        // penalties below still apply to it.
        let marketable = match order.side {
            Side::Buy => tick.ask_price > 0.0 && order.price >= tick.ask_price,
            Side::Sell => tick.bid_price > 0.0 && order.price <= tick.bid_price,
        };

        let mut prob = if marketable {
            1.0
        } else {
            let mut passive = self.params.base_fill_probability;

            // Price-time priority: deeper queue, lower probability.
            passive *= (-self.params.queue_position_decay * queue_position).exp();

            // Wide markets trade less at the touch.
            passive *= (-self.params.spread_sensitivity * tick.spread_bps()).exp();

            // Volatile markets carry more informed flow.
            passive *= (-self.params.volatility_impact * volatility).exp();

            // Orders far behind the market rarely trade.
            let far_from_market = match order.side {
                Side::Buy => tick.bid_price > 0.0 && order.price < tick.bid_price,
                Side::Sell => tick.ask_price > 0.0 && order.price > tick.ask_price,
            };
            if far_from_market {
                passive *= 0.1;
            }
            passive
        };

        // Stale quotes get picked off, not filled kindly.
        prob *= (-self.params.latency_penalty_per_us * latency_us as f64).exp();

        // Mid moved through the order: informed flow took the other side.
        if adverse_selection_enabled {
            let adverse_move = match order.side {
                Side::Buy => tick.mid_price > order.price,
                Side::Sell => tick.mid_price < order.price,
            };
            if adverse_move {
                prob *= 1.0 - self.params.adverse_selection_penalty;
            }
        }

        prob.clamp(0.0, 1.0)
    }

    /// Square-root market impact in price units, applied in the adverse
    /// direction by the caller: `0.5·√(qty/visible)` bps of mid.
    pub fn slippage(&self, mid_price: f64, order_qty: u64, visible_qty: u64) -> f64 {
        if visible_qty == 0 || mid_price <= 0.0 {
            return 0.0;
        }
        let impact_bps = 0.5 * (order_qty as f64 / visible_qty as f64).sqrt();
        impact_bps / 10_000.0 * mid_price
    }

    /// Queue-position estimate at submission: half the displayed size
    /// on the order's own side.
    pub fn queue_position(&self, side: Side, tick: &Tick) -> f64 {
        match side {
            Side::Buy => tick.bid_size as f64 / 2.0,
            Side::Sell => tick.ask_size as f64 / 2.0,
        }
    }
}
