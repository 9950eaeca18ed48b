//! Temporal persistence filter over the intensity imbalance
//!
//! A directional signal is only acted on once it has survived a minimum
//! number of consecutive confirming ticks while keeping its strength.
//! This removes the toxic sub-persistence flow that flips direction
//! inside the execution window: a signal that cannot hold for ~1.2 µs
//! of tick time is one we would be adversely selected on.
//!
//! Rules, per observed imbalance value:
//! - |OBI| at or below the threshold resets the filter.
//! - A direction flip restarts tracking from the current tick.
//! - Otherwise the tick confirms: strength accumulates, the counter
//!   advances, and the running average and peak update.
//! - The signal is persistent once the counter reaches the minimum AND
//!   the current strength is still at least the quality ratio of the
//!   running average.

/// Filter tuning.
#[derive(Debug, Clone, Copy)]
pub struct TemporalFilterParams {
    /// |OBI| activation threshold.
    pub obi_threshold: f64,
    /// Consecutive confirming ticks required.
    pub min_persistence_ticks: u32,
    /// Current strength must be ≥ this fraction of the running average.
    pub quality_ratio: f64,
}

impl Default for TemporalFilterParams {
    fn default() -> Self {
        Self {
            obi_threshold: 0.09,
            min_persistence_ticks: 12,
            quality_ratio: 0.60,
        }
    }
}

/// Per-driver filter state.
#[derive(Debug, Clone)]
pub struct TemporalFilter {
    params: TemporalFilterParams,
    accumulated_obi: f64,
    confirmation_ticks: u32,
    direction: f64,
    avg_strength: f64,
    peak_strength: f64,
    signal_start_ns: i64,
}

impl TemporalFilter {
    pub fn new(params: TemporalFilterParams) -> Self {
        Self {
            params,
            accumulated_obi: 0.0,
            confirmation_ticks: 0,
            direction: 0.0,
            avg_strength: 0.0,
            peak_strength: 0.0,
            signal_start_ns: 0,
        }
    }

    /// Feed one tick's imbalance; returns whether the signal is now
    /// persistent.
    pub fn observe(&mut self, obi: f64, now_ns: i64) -> bool {
        if obi.abs() <= self.params.obi_threshold {
            self.reset();
            return false;
        }

        let direction = if obi > 0.0 { 1.0 } else { -1.0 };
        let consistent = direction == self.direction || self.confirmation_ticks == 0;

        if !consistent {
            // Flip: restart tracking from this tick.
            self.reset();
            self.seed(obi, direction, now_ns);
            return false;
        }

        if self.confirmation_ticks == 0 {
            self.signal_start_ns = now_ns;
            self.direction = direction;
        }

        self.accumulated_obi += obi;
        self.confirmation_ticks += 1;
        self.peak_strength = self.peak_strength.max(obi.abs());
        self.avg_strength = (self.accumulated_obi / self.confirmation_ticks as f64).abs();

        self.confirmation_ticks >= self.params.min_persistence_ticks
            && obi.abs() >= self.params.quality_ratio * self.avg_strength
    }

    fn seed(&mut self, obi: f64, direction: f64, now_ns: i64) {
        self.signal_start_ns = now_ns;
        self.direction = direction;
        self.accumulated_obi = obi;
        self.confirmation_ticks = 1;
        self.peak_strength = obi.abs();
        self.avg_strength = obi.abs();
    }

    pub fn reset(&mut self) {
        self.accumulated_obi = 0.0;
        self.confirmation_ticks = 0;
        self.direction = 0.0;
        self.avg_strength = 0.0;
        self.peak_strength = 0.0;
        self.signal_start_ns = 0;
    }

    /// Confirming ticks so far.
    pub fn confirmation_ticks(&self) -> u32 {
        self.confirmation_ticks
    }

    /// Running average |OBI| of the current streak.
    pub fn average_strength(&self) -> f64 {
        self.avg_strength
    }

    /// Peak |OBI| of the current streak.
    pub fn peak_strength(&self) -> f64 {
        self.peak_strength
    }

    /// +1 / -1 while tracking, 0 when idle.
    pub fn direction(&self) -> f64 {
        self.direction
    }

    /// Age of the current streak.
    pub fn persistence_ns(&self, now_ns: i64) -> i64 {
        if self.confirmation_ticks == 0 {
            0
        } else {
            now_ns - self.signal_start_ns
        }
    }
}

impl Default for TemporalFilter {
    fn default() -> Self {
        Self::new(TemporalFilterParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twelve_confirming_ticks_emit() {
        let mut filter = TemporalFilter::default();
        for i in 0..11 {
            assert!(
                !filter.observe(0.10, i * 100),
                "tick {} must not emit yet",
                i
            );
        }
        // Twelfth tick: counter reaches 12 and 0.10 ≥ 0.6·0.10.
        assert!(filter.observe(0.10, 1_100));
        assert_eq!(filter.confirmation_ticks(), 12);
    }

    #[test]
    fn test_direction_flip_resets_counter() {
        let mut filter = TemporalFilter::default();
        for i in 0..11 {
            filter.observe(0.10, i * 100);
        }
        // Flip on what would have been the twelfth confirmation.
        assert!(!filter.observe(-0.10, 1_100));
        assert_eq!(filter.confirmation_ticks(), 1);
        assert_eq!(filter.direction(), -1.0);

        // Eleven more of the new direction emit again.
        for i in 0..10 {
            assert!(!filter.observe(-0.10, 1_200 + i * 100));
        }
        assert!(filter.observe(-0.10, 2_300));
    }

    #[test]
    fn test_weak_obi_resets() {
        let mut filter = TemporalFilter::default();
        for i in 0..11 {
            filter.observe(0.10, i * 100);
        }
        // Below threshold: full reset.
        assert!(!filter.observe(0.05, 1_100));
        assert_eq!(filter.confirmation_ticks(), 0);
        assert_eq!(filter.direction(), 0.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut filter = TemporalFilter::default();
        // Exactly at the threshold does not activate.
        assert!(!filter.observe(0.09, 0));
        assert_eq!(filter.confirmation_ticks(), 0);
        // Just above does.
        assert!(!filter.observe(0.0901, 100));
        assert_eq!(filter.confirmation_ticks(), 1);
    }

    #[test]
    fn test_fading_signal_fails_quality_check() {
        let mut filter = TemporalFilter::default();
        for i in 0..11 {
            filter.observe(0.30, i * 100);
        }
        // Twelfth tick fades to 0.10: the counter is satisfied but the
        // running average is ~0.283, so the 0.6 quality bound (~0.17)
        // rejects the emission.
        assert!(!filter.observe(0.10, 1_100));
        assert_eq!(filter.confirmation_ticks(), 12);

        // A strong tick right after clears the quality bar.
        assert!(filter.observe(0.30, 1_200));
    }

    #[test]
    fn test_persistence_age() {
        let mut filter = TemporalFilter::default();
        assert_eq!(filter.persistence_ns(5_000), 0);
        filter.observe(0.20, 1_000);
        filter.observe(0.20, 1_500);
        assert_eq!(filter.persistence_ns(2_200), 1_200);
    }
}
