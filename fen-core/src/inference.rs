//! Feature assembly and the inference-oracle interface
//!
//! The directional model itself is external hardware/software treated
//! as a fixed-latency black box: it consumes a [`FeatureVector`] and
//! produces a [`Prediction`]. This module owns the feature layout
//! contract and ships a deterministic stand-in used by the backtester
//! and the benchmark harness.

use crate::core::types::Tick;

/// Number of model inputs.
pub const FEATURE_DIM: usize = 12;
/// Number of model outputs.
pub const PREDICTION_DIM: usize = 8;

/// Model input vector. Slot layout (the oracle is trained against this
/// exact order):
///
/// | idx | feature                                  |
/// |-----|------------------------------------------|
/// | 0   | mid price                                |
/// | 1   | one-tick mid return                      |
/// | 2   | bid-ask spread                           |
/// | 3   | top-of-book size imbalance               |
/// | 4   | last trade volume                        |
/// | 5   | last trade side (+1 buy / -1 sell)       |
/// | 6   | buy intensity λ_b                        |
/// | 7   | sell intensity λ_s                       |
/// | 8   | intensity imbalance                      |
/// | 9   | mid return vs. reference tick            |
/// | 10  | available depth levels                   |
/// | 11  | bias (1.0)                               |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_DIM]);

impl FeatureVector {
    /// Assemble the vector from the current tick, the previous tick, a
    /// session reference tick and the two intensities.
    pub fn assemble(
        current: &Tick,
        previous: &Tick,
        reference: &Tick,
        buy_intensity: f64,
        sell_intensity: f64,
    ) -> Self {
        let mid = current.mid_price;

        let tick_return = if previous.mid_price > 0.0 {
            (mid - previous.mid_price) / previous.mid_price
        } else {
            0.0
        };
        let reference_return = if reference.mid_price > 0.0 {
            (mid - reference.mid_price) / reference.mid_price
        } else {
            0.0
        };

        let size_total = (current.bid_size + current.ask_size) as f64;
        let size_imbalance = if size_total > 0.0 {
            (current.bid_size as f64 - current.ask_size as f64) / size_total
        } else {
            0.0
        };

        let intensity_total = buy_intensity + sell_intensity;
        let intensity_imbalance = if intensity_total > 1e-10 {
            (buy_intensity - sell_intensity) / intensity_total
        } else {
            0.0
        };

        Self([
            mid,
            tick_return,
            current.ask_price - current.bid_price,
            size_imbalance,
            current.trade_volume as f64,
            current.trade_side.sign() as f64,
            buy_intensity,
            sell_intensity,
            intensity_imbalance,
            reference_return,
            current.depth_levels as f64,
            1.0,
        ])
    }
}

/// Model output vector. Index 0 carries the buy score, index 2 the sell
/// score; the remaining slots are model-internal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction(pub [f64; PREDICTION_DIM]);

impl Prediction {
    #[inline(always)]
    pub fn buy_score(&self) -> f64 {
        self.0[0]
    }

    #[inline(always)]
    pub fn sell_score(&self) -> f64 {
        self.0[2]
    }
}

/// The external model boundary. Implementations must be deterministic
/// for a given feature vector and report their fixed inference latency.
pub trait InferenceOracle {
    fn predict(&mut self, features: &FeatureVector) -> Prediction;

    /// Inference latency in nanoseconds, constant per instance.
    fn latency_ns(&self) -> u64;
}

/// Deterministic stand-in for the hardware model: a fixed squashing of
/// the imbalance features with a constant reported latency. Carries no
/// trained weights; exists so replays and benchmarks exercise the real
/// call boundary.
pub struct FixedLatencyOracle {
    latency_ns: u64,
}

impl FixedLatencyOracle {
    pub fn new(latency_ns: u64) -> Self {
        Self { latency_ns }
    }
}

impl Default for FixedLatencyOracle {
    /// 400 ns, the budgeted hardware inference time.
    fn default() -> Self {
        Self::new(400)
    }
}

impl InferenceOracle for FixedLatencyOracle {
    fn predict(&mut self, features: &FeatureVector) -> Prediction {
        let f = &features.0;
        // Squash the directional inputs into [0, 1] scores.
        let directional = f[8] + f[3] * 0.5 + f[1] * 100.0;
        let buy = 0.5 * (1.0 + directional.tanh());
        let sell = 1.0 - buy;

        let mut out = [0.0; PREDICTION_DIM];
        out[0] = buy;
        out[1] = 1.0 - (buy - sell).abs();
        out[2] = sell;
        Prediction(out)
    }

    fn latency_ns(&self) -> u64 {
        self.latency_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Side;

    fn ticks() -> (Tick, Tick, Tick) {
        let reference = Tick::quote(0, 1, 99.50, 10, 99.52, 10);
        let previous = Tick::quote(1_000, 1, 99.99, 10, 100.01, 10);
        let mut current = Tick::quote(2_000, 1, 100.00, 20, 100.02, 10);
        current.trade_volume = 7;
        current.trade_side = Side::Sell;
        (current, previous, reference)
    }

    #[test]
    fn test_feature_layout() {
        let (current, previous, reference) = ticks();
        let f = FeatureVector::assemble(&current, &previous, &reference, 0.8, 0.4);

        assert_eq!(f.0[0], 100.01); // mid
        assert!(f.0[1] > 0.0); // rose vs previous
        assert!((f.0[2] - 0.02).abs() < 1e-12); // spread
        assert!((f.0[3] - 10.0 / 30.0).abs() < 1e-12); // size imbalance
        assert_eq!(f.0[4], 7.0);
        assert_eq!(f.0[5], -1.0);
        assert_eq!(f.0[6], 0.8);
        assert_eq!(f.0[7], 0.4);
        assert!((f.0[8] - (0.4 / 1.2)).abs() < 1e-12);
        assert!(f.0[9] > 0.0); // rose vs reference
        assert_eq!(f.0[10], 1.0);
        assert_eq!(f.0[11], 1.0);
    }

    #[test]
    fn test_zero_previous_mid_is_safe() {
        let current = Tick::quote(0, 1, 100.0, 1, 100.02, 1);
        let empty = Tick::empty(0, 1);
        let f = FeatureVector::assemble(&current, &empty, &empty, 0.5, 0.5);
        assert_eq!(f.0[1], 0.0);
        assert_eq!(f.0[9], 0.0);
        assert!(f.0.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_oracle_is_deterministic() {
        let (current, previous, reference) = ticks();
        let features = FeatureVector::assemble(&current, &previous, &reference, 0.8, 0.4);

        let mut oracle = FixedLatencyOracle::default();
        let a = oracle.predict(&features);
        let b = oracle.predict(&features);
        assert_eq!(a, b);
        assert_eq!(oracle.latency_ns(), 400);
    }

    #[test]
    fn test_scores_bounded_and_opposed() {
        let (current, previous, reference) = ticks();
        let features = FeatureVector::assemble(&current, &previous, &reference, 2.0, 0.1);
        let mut oracle = FixedLatencyOracle::new(100);
        let p = oracle.predict(&features);

        assert!((0.0..=1.0).contains(&p.buy_score()));
        assert!((0.0..=1.0).contains(&p.sell_score()));
        assert!((p.buy_score() + p.sell_score() - 1.0).abs() < 1e-12);
        // Heavy buy intensity imbalance: buy score dominates.
        assert!(p.buy_score() > p.sell_score());
    }
}
