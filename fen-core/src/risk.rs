//! Pre-trade risk checks
//!
//! The last gate before an order leaves the pipeline. Four mandatory
//! checks plus one construction-time policy:
//!
//! 1. Resulting absolute position within the limit
//! 2. Order notional within the per-trade cap
//! 3. Accumulated daily loss under the loss cap
//! 4. Regime not halted (size multiplier above zero)
//! 5. Optional: no sells while flat or short (naked-short policy)
//!
//! All checks are plain comparisons on local state; the deny path
//! records the reason and bumps a relaxed atomic breach counter that
//! telemetry reads without driving control flow.

use crate::core::errors::RiskDenial;
use crate::core::types::{MarketRegime, Order, Side};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Risk limits fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct RiskLimits {
    /// Absolute position bound (shares/contracts).
    pub max_position: i64,
    /// Per-trade notional cap (price × quantity).
    pub max_order_notional: f64,
    /// Daily loss cap, positive.
    pub max_daily_loss: f64,
    /// Deny sells when flat or short.
    pub deny_naked_short: bool,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position: 1000,
            max_order_notional: 50_000.0,
            max_daily_loss: 100_000.0,
            deny_naked_short: false,
        }
    }
}

/// The pre-trade gate. Holds realized P&L and the current regime; reads
/// market data only through the order under test.
pub struct RiskGate {
    limits: RiskLimits,
    regime: MarketRegime,
    realized_pnl: f64,
    breaches: AtomicU64,
}

impl RiskGate {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            regime: MarketRegime::Normal,
            realized_pnl: 0.0,
            breaches: AtomicU64::new(0),
        }
    }

    /// Validate an order against the current position.
    #[inline]
    pub fn check(&self, order: &Order, current_position: i64) -> Result<(), RiskDenial> {
        let would_be = current_position + order.signed_quantity();
        let notional = order.notional();
        let loss = -self.realized_pnl;

        let denial = if would_be.abs() > self.limits.max_position {
            Some(RiskDenial::PositionLimit {
                would_be,
                limit: self.limits.max_position,
            })
        } else if notional > self.limits.max_order_notional {
            Some(RiskDenial::NotionalCap {
                notional,
                cap: self.limits.max_order_notional,
            })
        } else if loss > self.limits.max_daily_loss {
            Some(RiskDenial::DailyLossCap {
                loss,
                cap: self.limits.max_daily_loss,
            })
        } else if self.regime.size_multiplier() == 0.0 {
            Some(RiskDenial::RegimeHalted)
        } else if self.limits.deny_naked_short
            && order.side == Side::Sell
            && current_position <= 0
        {
            Some(RiskDenial::NakedShort {
                position: current_position,
            })
        } else {
            None
        };

        match denial {
            None => Ok(()),
            Some(reason) => {
                self.breaches.fetch_add(1, Ordering::Relaxed);
                warn!(order_id = order.order_id, %reason, "risk check denied order");
                Err(reason)
            }
        }
    }

    /// Fold a realized P&L delta into the daily-loss accounting.
    pub fn record_pnl(&mut self, delta: f64) {
        self.realized_pnl += delta;
    }

    /// Reset daily accounting (start of session).
    pub fn reset_daily(&mut self) {
        self.realized_pnl = 0.0;
    }

    pub fn set_regime(&mut self, regime: MarketRegime) {
        if regime != self.regime {
            warn!(from = %self.regime, to = %regime, "market regime changed");
        }
        self.regime = regime;
    }

    #[inline(always)]
    pub fn regime(&self) -> MarketRegime {
        self.regime
    }

    /// Quote-size multiplier of the current regime.
    #[inline(always)]
    pub fn size_multiplier(&self) -> f64 {
        self.regime.size_multiplier()
    }

    /// Total denials since construction.
    pub fn breach_count(&self) -> u64 {
        self.breaches.load(Ordering::Relaxed)
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(side: Side, price: f64, qty: u64) -> Order {
        Order::new(1, 1, side, price, qty, 0)
    }

    fn gate() -> RiskGate {
        RiskGate::new(RiskLimits {
            max_position: 1000,
            max_order_notional: 50_000.0,
            max_daily_loss: 10_000.0,
            deny_naked_short: false,
        })
    }

    #[test]
    fn test_order_within_limits_passes() {
        let gate = gate();
        assert!(gate.check(&order(Side::Buy, 100.0, 100), 0).is_ok());
        assert_eq!(gate.breach_count(), 0);
    }

    #[test]
    fn test_position_limit() {
        let gate = gate();
        // 950 + 100 = 1050 > 1000.
        let err = gate.check(&order(Side::Buy, 100.0, 100), 950);
        assert!(matches!(err, Err(RiskDenial::PositionLimit { .. })));

        // Short side is symmetric.
        let err = gate.check(&order(Side::Sell, 100.0, 100), -950);
        assert!(matches!(err, Err(RiskDenial::PositionLimit { .. })));

        // Reducing an over-limit position is allowed.
        assert!(gate.check(&order(Side::Sell, 100.0, 100), 950).is_ok());
        assert_eq!(gate.breach_count(), 2);
    }

    #[test]
    fn test_notional_cap() {
        let gate = gate();
        // 100.0 × 600 = 60k > 50k.
        let err = gate.check(&order(Side::Buy, 100.0, 600), 0);
        assert!(matches!(err, Err(RiskDenial::NotionalCap { .. })));
    }

    #[test]
    fn test_daily_loss_cap() {
        let mut gate = gate();
        // Loss exactly at the cap still passes; only exceeding denies.
        gate.record_pnl(-10_000.0);
        assert!(gate.check(&order(Side::Buy, 100.0, 10), 0).is_ok());

        gate.record_pnl(-0.01);
        let err = gate.check(&order(Side::Buy, 100.0, 10), 0);
        assert!(matches!(err, Err(RiskDenial::DailyLossCap { .. })));

        // Recovery below the cap re-enables trading.
        gate.record_pnl(5_000.0);
        assert!(gate.check(&order(Side::Buy, 100.0, 10), 0).is_ok());

        gate.reset_daily();
        assert_eq!(gate.realized_pnl(), 0.0);
    }

    #[test]
    fn test_halted_regime_denies() {
        let mut gate = gate();
        gate.set_regime(MarketRegime::Halted);
        let err = gate.check(&order(Side::Buy, 100.0, 10), 0);
        assert_eq!(err, Err(RiskDenial::RegimeHalted));
        assert_eq!(gate.size_multiplier(), 0.0);

        gate.set_regime(MarketRegime::HighStress);
        assert!(gate.check(&order(Side::Buy, 100.0, 10), 0).is_ok());
        assert_eq!(gate.size_multiplier(), 0.4);
    }

    #[test]
    fn test_naked_short_policy() {
        let strict = RiskGate::new(RiskLimits {
            deny_naked_short: true,
            ..Default::default()
        });

        let err = strict.check(&order(Side::Sell, 100.0, 10), 0);
        assert!(matches!(err, Err(RiskDenial::NakedShort { .. })));
        let err = strict.check(&order(Side::Sell, 100.0, 10), -5);
        assert!(matches!(err, Err(RiskDenial::NakedShort { .. })));

        // Long position may sell.
        assert!(strict.check(&order(Side::Sell, 100.0, 10), 5).is_ok());
        // Policy off by default.
        assert!(gate().check(&order(Side::Sell, 100.0, 10), 0).is_ok());
    }

    #[test]
    fn test_breach_counter_accumulates() {
        let gate = gate();
        for _ in 0..3 {
            let _ = gate.check(&order(Side::Buy, 100.0, 600), 0);
        }
        assert_eq!(gate.breach_count(), 3);
    }
}
