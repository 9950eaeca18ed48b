//! Property tests for the quote engine.

use fen_core::quote::{QuoteEngine, QuoteParams};
use proptest::prelude::*;

fn engine(tick_size: f64) -> QuoteEngine {
    QuoteEngine::new(QuoteParams {
        risk_aversion: 0.01,
        volatility: 0.20,
        order_arrival_rate: 10.0,
        tick_size,
        max_inventory: 1000,
        system_latency_ns: 850,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// For any positive mid and horizon: bid < ask, the spread honors
    /// the two-tick floor, and both prices sit on the tick grid.
    #[test]
    fn prop_quote_structure(
        mid in 0.5f64..10_000.0,
        inventory in -1000i64..=1000,
        time_remaining in 0.001f64..3600.0,
        latency_cost in 0.0f64..1.0,
    ) {
        let e = engine(0.01);
        let q = e.quotes(mid, inventory, time_remaining, latency_cost, 0);

        prop_assert!(q.bid_price < q.ask_price);
        prop_assert!(q.spread >= e.min_spread() - 1e-9);

        let bid_ticks = q.bid_price / 0.01;
        let ask_ticks = q.ask_price / 0.01;
        prop_assert!((bid_ticks - bid_ticks.round()).abs() < 1e-6,
            "bid {} off grid", q.bid_price);
        prop_assert!((ask_ticks - ask_ticks.round()).abs() < 1e-6,
            "ask {} off grid", q.ask_price);
    }

    /// Skew is bounded, odd around zero, and saturates toward ±1.
    #[test]
    fn prop_skew_bounds(inventory in -100_000i64..=100_000) {
        let e = engine(0.01);
        let skew = e.inventory_skew(inventory);
        prop_assert!(skew.abs() <= 1.0);
        prop_assert_eq!(skew == 0.0, inventory == 0);
        if inventory > 0 {
            prop_assert!(skew > 0.0);
        }
        if inventory < 0 {
            prop_assert!(skew < 0.0);
        }
    }

    /// Widening for latency cost never produces a half-spread below the
    /// cost itself.
    #[test]
    fn prop_latency_cost_is_covered(
        mid in 10.0f64..1_000.0,
        latency_cost in 0.0f64..5.0,
    ) {
        let e = engine(0.01);
        let q = e.quotes(mid, 0, 300.0, latency_cost, 0);
        // Rounding to tick can shave at most one tick per side.
        prop_assert!(q.spread / 2.0 >= latency_cost - 0.01);
    }

    /// Invalid inputs always produce the zero-size sentinel.
    #[test]
    fn prop_invalid_inputs(mid in -100.0f64..=0.0, t in -10.0f64..=0.0) {
        let e = engine(0.01);
        prop_assert!(!e.quotes(mid, 0, 300.0, 0.0, 0).is_quotable());
        prop_assert!(!e.quotes(100.0, 0, t, 0.0, 0).is_quotable());
    }
}
