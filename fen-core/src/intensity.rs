//! Self-exciting point-process intensity over buy/sell arrivals
//!
//! Multivariate Hawkes process with a power-law kernel:
//!
//! ```text
//! λ_s(t) = μ_s + Σ same-side  α_self  · K(t - t_k)
//!              + Σ cross-side α_cross · K(t - t_k)
//! K(τ)   = (β + τ)^(-γ)   for τ ≥ 0, else 0
//! ```
//!
//! γ > 1 is required for the kernel integral to converge; β > 0 keeps
//! K finite at τ = 0. Out-of-range parameters are clamped at
//! construction rather than rejected, matching how the engine is run in
//! replay (a bad calibration must not abort a session).
//!
//! History is bounded per side; the oldest event is dropped once the
//! cap is reached. Recomputation walks same-side history first, then
//! cross-side, oldest to newest, so summation order is fixed and
//! replays are bit-exact.

use crate::core::types::{Side, TradingEvent};
use std::collections::VecDeque;

/// Intensities are floored here so downstream ratios never divide by
/// zero or see a negative rate.
const INTENSITY_FLOOR: f64 = 1e-10;

/// Engine parameters. Defaults are the replay calibration.
#[derive(Debug, Clone, Copy)]
pub struct IntensityParams {
    /// Baseline buy intensity μ_buy (events/sec).
    pub baseline_buy: f64,
    /// Baseline sell intensity μ_sell (events/sec).
    pub baseline_sell: f64,
    /// Self-excitation coefficient α_self.
    pub alpha_self: f64,
    /// Cross-excitation coefficient α_cross.
    pub alpha_cross: f64,
    /// Power-law kernel offset β (seconds).
    pub beta: f64,
    /// Power-law decay exponent γ.
    pub gamma: f64,
    /// Events retained per side.
    pub max_history: usize,
}

impl Default for IntensityParams {
    fn default() -> Self {
        Self {
            baseline_buy: 0.5,
            baseline_sell: 0.5,
            alpha_self: 0.3,
            alpha_cross: 0.1,
            beta: 1e-6,
            gamma: 1.5,
            max_history: 1000,
        }
    }
}

/// The intensity engine. Owns its event history exclusively.
pub struct IntensityEngine {
    params: IntensityParams,
    buy_events: VecDeque<TradingEvent>,
    sell_events: VecDeque<TradingEvent>,
    current_time_ns: i64,
    intensity_buy: f64,
    intensity_sell: f64,
}

impl IntensityEngine {
    pub fn new(mut params: IntensityParams) -> Self {
        // Clamp rather than reject: γ ≤ 1 diverges, β ≤ 0 is singular.
        if params.gamma <= 1.0 {
            params.gamma = 1.5;
        }
        if params.beta <= 0.0 {
            params.beta = 1e-6;
        }

        Self {
            buy_events: VecDeque::with_capacity(params.max_history),
            sell_events: VecDeque::with_capacity(params.max_history),
            current_time_ns: 0,
            intensity_buy: params.baseline_buy,
            intensity_sell: params.baseline_sell,
            params,
        }
    }

    /// Record an arrival and recompute both intensities at its time.
    pub fn update(&mut self, event: TradingEvent) {
        self.current_time_ns = event.arrival_time_ns;

        let history = match event.side {
            Side::Buy => &mut self.buy_events,
            Side::Sell => &mut self.sell_events,
        };
        history.push_back(event);
        if history.len() > self.params.max_history {
            history.pop_front();
        }

        self.intensity_buy = self.compute_intensity(Side::Buy, self.current_time_ns);
        self.intensity_sell = self.compute_intensity(Side::Sell, self.current_time_ns);
    }

    #[inline(always)]
    pub fn buy_intensity(&self) -> f64 {
        self.intensity_buy
    }

    #[inline(always)]
    pub fn sell_intensity(&self) -> f64 {
        self.intensity_sell
    }

    /// Directional signal in [-1, 1]: positive means buy pressure.
    /// Zero when both intensities are at the floor.
    #[inline]
    pub fn imbalance(&self) -> f64 {
        let total = self.intensity_buy + self.intensity_sell;
        if total < 1e-10 {
            return 0.0;
        }
        (self.intensity_buy - self.intensity_sell) / total
    }

    /// Intensity at `current_time + horizon`, using the same history.
    pub fn predict_buy_intensity(&self, horizon_ns: i64) -> f64 {
        self.compute_intensity(Side::Buy, self.current_time_ns + horizon_ns)
    }

    pub fn predict_sell_intensity(&self, horizon_ns: i64) -> f64 {
        self.compute_intensity(Side::Sell, self.current_time_ns + horizon_ns)
    }

    /// Clear history and return to baselines.
    pub fn reset(&mut self) {
        self.buy_events.clear();
        self.sell_events.clear();
        self.intensity_buy = self.params.baseline_buy;
        self.intensity_sell = self.params.baseline_sell;
        self.current_time_ns = 0;
    }

    pub fn buy_event_count(&self) -> usize {
        self.buy_events.len()
    }

    pub fn sell_event_count(&self) -> usize {
        self.sell_events.len()
    }

    #[inline(always)]
    fn kernel(&self, tau_seconds: f64) -> f64 {
        if tau_seconds < 0.0 {
            return 0.0;
        }
        (self.params.beta + tau_seconds).powf(-self.params.gamma)
    }

    fn compute_intensity(&self, side: Side, eval_time_ns: i64) -> f64 {
        let mut intensity = match side {
            Side::Buy => self.params.baseline_buy,
            Side::Sell => self.params.baseline_sell,
        };

        let (same, cross) = match side {
            Side::Buy => (&self.buy_events, &self.sell_events),
            Side::Sell => (&self.sell_events, &self.buy_events),
        };

        for event in same {
            if event.arrival_time_ns < eval_time_ns {
                let tau = (eval_time_ns - event.arrival_time_ns) as f64 * 1e-9;
                intensity += self.params.alpha_self * self.kernel(tau);
            }
        }
        for event in cross {
            if event.arrival_time_ns < eval_time_ns {
                let tau = (eval_time_ns - event.arrival_time_ns) as f64 * 1e-9;
                intensity += self.params.alpha_cross * self.kernel(tau);
            }
        }

        intensity.max(INTENSITY_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> IntensityEngine {
        IntensityEngine::new(IntensityParams::default())
    }

    #[test]
    fn test_empty_history_is_baseline() {
        let e = engine();
        assert_eq!(e.buy_intensity(), 0.5);
        assert_eq!(e.sell_intensity(), 0.5);
        assert_eq!(e.imbalance(), 0.0);
    }

    #[test]
    fn test_event_raises_same_side_intensity_more() {
        let mut e = engine();
        e.update(TradingEvent::new(1_000_000_000, Side::Buy, 1));

        // α_self > α_cross, so a buy lifts buy intensity above sell.
        assert!(e.buy_intensity() > e.sell_intensity());
        assert!(e.sell_intensity() > 0.5, "cross-excitation also raises sell");
        assert!(e.imbalance() > 0.0);
    }

    #[test]
    fn test_intensity_decays_with_horizon() {
        let mut e = engine();
        e.update(TradingEvent::new(1_000_000_000, Side::Buy, 1));

        let now = e.buy_intensity();
        let later = e.predict_buy_intensity(1_000_000_000); // +1s
        let much_later = e.predict_buy_intensity(60_000_000_000); // +60s

        assert!(later < now, "excitation must decay");
        assert!(much_later < later);
        assert!(much_later >= 0.5 - 1e-12, "never below baseline by much");
    }

    #[test]
    fn test_monotone_decay_grid() {
        let mut e = engine();
        e.update(TradingEvent::new(0, Side::Sell, 1));

        let mut previous = f64::MAX;
        for step in 1..=50 {
            let lambda = e.predict_sell_intensity(step * 100_000_000);
            assert!(lambda <= previous, "intensity rose at step {}", step);
            previous = lambda;
        }
    }

    #[test]
    fn test_parameter_clamping() {
        let e = IntensityEngine::new(IntensityParams {
            gamma: 0.5,
            beta: -1.0,
            ..Default::default()
        });
        assert_eq!(e.params.gamma, 1.5);
        assert_eq!(e.params.beta, 1e-6);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut e = IntensityEngine::new(IntensityParams {
            max_history: 10,
            ..Default::default()
        });
        for i in 0..100 {
            e.update(TradingEvent::new(i * 1_000_000, Side::Buy, 1));
        }
        assert_eq!(e.buy_event_count(), 10);
        assert_eq!(e.sell_event_count(), 0);
    }

    #[test]
    fn test_reset_restores_baselines() {
        let mut e = engine();
        for i in 0..5 {
            e.update(TradingEvent::new(i * 1_000_000, Side::Buy, 1));
        }
        assert!(e.buy_intensity() > 0.5);

        e.reset();
        assert_eq!(e.buy_intensity(), 0.5);
        assert_eq!(e.sell_intensity(), 0.5);
        assert_eq!(e.buy_event_count(), 0);
    }

    #[test]
    fn test_intensity_floor() {
        let mut e = IntensityEngine::new(IntensityParams {
            baseline_buy: 0.0,
            baseline_sell: 0.0,
            ..Default::default()
        });
        e.update(TradingEvent::new(0, Side::Buy, 1));
        // Far future: excitation gone, baseline zero, floor applies.
        let lambda = e.predict_buy_intensity(3_600_000_000_000);
        assert!(lambda >= 1e-10);
        assert!(lambda.is_finite());
    }

    #[test]
    fn test_imbalance_zero_denominator() {
        let e = IntensityEngine::new(IntensityParams {
            baseline_buy: 0.0,
            baseline_sell: 0.0,
            ..Default::default()
        });
        // Both at floor: denominator below threshold, imbalance defined 0.
        assert_eq!(e.imbalance(), 0.0);
    }

    #[test]
    fn test_determinism_across_runs() {
        let run = || {
            let mut e = engine();
            for i in 0..200i64 {
                let side = if i % 3 == 0 { Side::Sell } else { Side::Buy };
                e.update(TradingEvent::new(i * 7_000_000, side, 1));
            }
            (e.buy_intensity(), e.sell_intensity())
        };
        assert_eq!(run(), run());
    }
}
