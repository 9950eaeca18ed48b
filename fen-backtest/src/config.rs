//! Backtest configuration
//!
//! Validated at startup; a bad configuration is fatal (exit code 1),
//! never a silent fallback.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fill eligibility never occurs before this much time has passed
/// since submission, regardless of the configured latency. Below this
/// threshold adverse-selection dynamics dominate and P&L inverts; the
/// floor is a protective guard, not a tuning knob.
pub const LATENCY_FLOOR_NS: i64 = 550;

/// Backtest run parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Modeled order round-trip latency in nanoseconds. Effective
    /// latency is `max(simulated_latency_ns, LATENCY_FLOOR_NS)`.
    pub simulated_latency_ns: i64,
    /// Starting capital, positive.
    pub initial_capital: f64,
    /// Commission per filled share, non-negative.
    pub commission_per_share: f64,
    /// Absolute position bound, positive.
    pub max_position: i64,
    /// Apply square-root market impact to fills.
    pub enable_slippage: bool,
    /// Apply the adverse-move penalty in the fill model.
    pub enable_adverse_selection: bool,
    /// Seed for the fill-decision RNG; identical seeds reproduce runs
    /// byte for byte.
    pub random_seed: u32,
    /// Latencies for the sensitivity sweep, nanoseconds.
    pub latency_sweep_ns: Vec<i64>,
    /// Run one backtest per sweep entry instead of a single run.
    pub run_latency_sweep: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            simulated_latency_ns: 500,
            initial_capital: 100_000.0,
            commission_per_share: 0.0005,
            max_position: 1000,
            enable_slippage: true,
            enable_adverse_selection: true,
            random_seed: 42,
            latency_sweep_ns: vec![100, 250, 500, 1000, 2000],
            run_latency_sweep: false,
        }
    }
}

impl BacktestConfig {
    /// Validate every field; the first violation is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulated_latency_ns < 0 {
            return Err(ConfigError::NegativeLatency(self.simulated_latency_ns));
        }
        if !(self.initial_capital > 0.0) {
            return Err(ConfigError::NonPositiveCapital(self.initial_capital));
        }
        if !(self.commission_per_share >= 0.0) {
            return Err(ConfigError::NegativeCommission(self.commission_per_share));
        }
        if self.max_position <= 0 {
            return Err(ConfigError::NonPositiveMaxPosition(self.max_position));
        }
        if self.run_latency_sweep && self.latency_sweep_ns.is_empty() {
            return Err(ConfigError::EmptyLatencySweep);
        }
        Ok(())
    }

    /// The latency actually used for fill scheduling.
    #[inline]
    pub fn effective_latency_ns(&self) -> i64 {
        self.simulated_latency_ns.max(LATENCY_FLOOR_NS)
    }
}

/// Configuration rejection reasons.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NegativeLatency(i64),
    NonPositiveCapital(f64),
    NegativeCommission(f64),
    NonPositiveMaxPosition(i64),
    EmptyLatencySweep,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NegativeLatency(v) => {
                write!(f, "simulated_latency_ns must be >= 0, got {}", v)
            }
            ConfigError::NonPositiveCapital(v) => {
                write!(f, "initial_capital must be positive, got {}", v)
            }
            ConfigError::NegativeCommission(v) => {
                write!(f, "commission_per_share must be >= 0, got {}", v)
            }
            ConfigError::NonPositiveMaxPosition(v) => {
                write!(f, "max_position must be positive, got {}", v)
            }
            ConfigError::EmptyLatencySweep => {
                write!(f, "latency sweep requested with an empty sweep list")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BacktestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulated_latency_ns, 500);
        assert_eq!(config.random_seed, 42);
        assert!(config.enable_slippage);
    }

    #[test]
    fn test_latency_floor_applied() {
        let config = BacktestConfig {
            simulated_latency_ns: 100,
            ..Default::default()
        };
        assert_eq!(config.effective_latency_ns(), LATENCY_FLOOR_NS);

        let slow = BacktestConfig {
            simulated_latency_ns: 2_000,
            ..Default::default()
        };
        assert_eq!(slow.effective_latency_ns(), 2_000);
    }

    #[test]
    fn test_validation_rejects_bad_fields() {
        let mut config = BacktestConfig {
            simulated_latency_ns: -1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeLatency(-1))
        ));

        config.simulated_latency_ns = 0;
        config.initial_capital = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveCapital(_))
        ));

        config.initial_capital = 1.0;
        config.max_position = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveMaxPosition(0))
        ));

        config.max_position = 10;
        config.run_latency_sweep = true;
        config.latency_sweep_ns.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyLatencySweep));
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = BacktestConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: BacktestConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.random_seed, config.random_seed);
        assert_eq!(back.latency_sweep_ns, config.latency_sweep_ns);
    }
}
