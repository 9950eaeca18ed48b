//! Latency-aware market-making quote generation
//!
//! Avellaneda-Stoikov reservation-price quoting with two extensions:
//!
//! 1. **Inventory skew** - the half-spread is allocated asymmetrically
//!    via `tanh(2q / Q_max)`, pulling the position toward zero.
//! 2. **Latency gating** - the expected slippage accrued during the
//!    system's own decision-to-wire delay is priced in: the spread is
//!    widened when the latency cost exceeds the half-spread, and
//!    [`QuoteEngine::should_quote`] refuses to quote when the edge does
//!    not clear the cost with a 10% margin.
//!
//! Model, with σ²_sec the per-second variance:
//!
//! ```text
//! r        = m - q · γ · σ²_sec · (T - t)
//! δ_a + δ_b = γ · σ²_sec · (T - t) + (2/γ) · ln(1 + γ/k)
//! bid = r - h·(1 - s),  ask = r + h·(1 + s),  s = tanh(2q/Q_max)
//! ```
//!
//! Volatility is supplied annualized and converted using a trading
//! calendar of 252 days × 6.5 hours × 3600 seconds.

use crate::core::types::{QuotePair, Side};

/// Seconds of trading per year: 252 days × 6.5 hours × 3600 s.
pub const TRADING_SECONDS_PER_YEAR: f64 = 252.0 * 6.5 * 3600.0;

/// Base quote size before inventory scaling.
const BASE_QUOTE_SIZE: f64 = 100.0;

/// Safety margin applied to the latency cost in the quote gate.
const LATENCY_SAFETY_MARGIN: f64 = 1.1;

/// Quote engine parameters.
#[derive(Debug, Clone, Copy)]
pub struct QuoteParams {
    /// Risk aversion γ.
    pub risk_aversion: f64,
    /// Annualized volatility σ.
    pub volatility: f64,
    /// Market order arrival rate k.
    pub order_arrival_rate: f64,
    /// Minimum price increment.
    pub tick_size: f64,
    /// Absolute inventory bound Q_max.
    pub max_inventory: i64,
    /// Round-trip system latency in nanoseconds.
    pub system_latency_ns: i64,
}

impl Default for QuoteParams {
    fn default() -> Self {
        Self {
            risk_aversion: 0.01,
            volatility: 0.20,
            order_arrival_rate: 10.0,
            tick_size: 0.01,
            max_inventory: 1000,
            system_latency_ns: 850,
        }
    }
}

/// Stateless quote computation over a parameter set. The per-second
/// variance is derived once at construction and on volatility updates.
pub struct QuoteEngine {
    params: QuoteParams,
    sigma_sq_per_second: f64,
    min_spread: f64,
}

impl QuoteEngine {
    pub fn new(params: QuoteParams) -> Self {
        let mut engine = Self {
            sigma_sq_per_second: 0.0,
            min_spread: params.tick_size * 2.0,
            params,
        };
        engine.derive_volatility();
        engine
    }

    fn derive_volatility(&mut self) {
        let sigma_per_second = self.params.volatility / TRADING_SECONDS_PER_YEAR.sqrt();
        self.sigma_sq_per_second = sigma_per_second * sigma_per_second;
    }

    /// Compute the bid/ask pair for the current state.
    ///
    /// `inventory` is signed (long positive); `time_remaining` is the
    /// horizon in seconds; `latency_cost` is in price units (see
    /// [`QuoteEngine::latency_cost`]). Non-positive mid or horizon
    /// yields a zero-size pair.
    pub fn quotes(
        &self,
        mid_price: f64,
        inventory: i64,
        time_remaining: f64,
        latency_cost: f64,
        now_ns: i64,
    ) -> QuotePair {
        if mid_price <= 0.0 || time_remaining <= 0.0 {
            return QuotePair::none(mid_price, now_ns);
        }

        let gamma = self.params.risk_aversion;

        // Reservation price shifts against the inventory.
        let inventory_penalty =
            inventory as f64 * gamma * self.sigma_sq_per_second * time_remaining;
        let reservation_price = mid_price - inventory_penalty;

        // Optimal total spread, floored at two ticks.
        let time_component = gamma * self.sigma_sq_per_second * time_remaining;
        let arrival_component =
            (2.0 / gamma) * (1.0 + gamma / self.params.order_arrival_rate).ln();
        let mut total_spread = (time_component + arrival_component).max(self.min_spread);

        // Widen until the half-spread covers the latency cost.
        let mut half_spread = total_spread / 2.0;
        if latency_cost > half_spread {
            total_spread += 2.0 * (latency_cost - half_spread);
            half_spread = total_spread / 2.0;
        }

        // Asymmetric allocation: long inventory tightens the ask side's
        // distance on the bid and widens the ask, and vice versa.
        let skew = self.inventory_skew(inventory);
        let bid_offset = half_spread * (1.0 - skew);
        let ask_offset = half_spread * (1.0 + skew);

        let mut bid_price = self.round_to_tick(reservation_price - bid_offset);
        let ask_price = self.round_to_tick(reservation_price + ask_offset);
        if bid_price >= ask_price {
            bid_price = ask_price - self.params.tick_size;
        }

        QuotePair {
            bid_price,
            ask_price,
            bid_size: self.quote_size(Side::Buy, inventory),
            ask_size: self.quote_size(Side::Sell, inventory),
            spread: ask_price - bid_price,
            mid_price,
            generated_at_ns: now_ns,
        }
    }

    /// Expected slippage over the system's own latency, in price units:
    /// σ_now · √(ℓ seconds) · mid.
    pub fn latency_cost(&self, current_volatility: f64, mid_price: f64) -> f64 {
        let latency_seconds = self.params.system_latency_ns as f64 * 1e-9;
        current_volatility * latency_seconds.sqrt() * mid_price
    }

    /// True when half the spread beats the latency cost with margin.
    #[inline]
    pub fn should_quote(&self, expected_spread: f64, latency_cost: f64) -> bool {
        expected_spread / 2.0 > latency_cost * LATENCY_SAFETY_MARGIN
    }

    /// Inventory skew in [-1, 1]; zero at flat.
    #[inline]
    pub fn inventory_skew(&self, inventory: i64) -> f64 {
        let normalized = inventory as f64 / self.params.max_inventory as f64;
        (normalized * 2.0).tanh()
    }

    fn quote_size(&self, side: Side, inventory: i64) -> f64 {
        // The side that reduces inventory quotes larger.
        let reduces = (side == Side::Sell && inventory > 0)
            || (side == Side::Buy && inventory < 0);
        if reduces {
            let ratio = inventory.unsigned_abs() as f64 / self.params.max_inventory as f64;
            BASE_QUOTE_SIZE * (1.0 + ratio)
        } else {
            BASE_QUOTE_SIZE
        }
    }

    #[inline(always)]
    fn round_to_tick(&self, price: f64) -> f64 {
        (price / self.params.tick_size).round() * self.params.tick_size
    }

    pub fn set_risk_aversion(&mut self, gamma: f64) {
        self.params.risk_aversion = gamma;
    }

    pub fn set_volatility(&mut self, sigma: f64) {
        self.params.volatility = sigma;
        self.derive_volatility();
    }

    pub fn params(&self) -> &QuoteParams {
        &self.params
    }

    pub fn min_spread(&self) -> f64 {
        self.min_spread
    }
}
