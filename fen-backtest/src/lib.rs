//! fen-backtest - deterministic event replay for the fen pipeline
//!
//! Replays a time-sorted historical capture through the same intensity,
//! quoting and risk components the live pipeline uses, with a
//! probabilistic fill simulator in place of a venue. Three properties
//! are load-bearing:
//!
//! - **Determinism.** One seeded RNG consumed in a fixed order; fixed
//!   summation order everywhere. Same input, config and seed ⇒
//!   byte-identical logs and identical metrics.
//! - **Persistence gating.** Quotes are only placed when the intensity
//!   imbalance has held direction and strength for a minimum streak
//!   ([`temporal::TemporalFilter`]); transient flow is toxic at this
//!   horizon.
//! - **The latency floor.** Fill eligibility never occurs before
//!   [`config::LATENCY_FLOOR_NS`] after submission, whatever the
//!   configured latency: below that point faster fills are adversely
//!   selected and P&L inverts.
//!
//! Run output is auditable: a JSON header binds the configuration to a
//! SHA-256 of the input, and every submit / fill / cancel appends one
//! log line ([`replay`]).

pub mod config;
pub mod driver;
pub mod event;
pub mod fill;
pub mod replay;
pub mod report;
pub mod temporal;

pub use config::{BacktestConfig, ConfigError, LATENCY_FLOOR_NS};
pub use driver::BacktestDriver;
pub use event::{EventKind, HistoricalEvent, LoadedEvents};
pub use fill::{FillModel, FillParams};
pub use replay::{file_sha256, BreachLogger, ReplayLogger};
pub use report::{
    FillRecord, LatencyDistribution, LatencyStats, MetricInputs, PerformanceMetrics,
    SlippageAnalyzer, SlippageReport,
};
pub use temporal::{TemporalFilter, TemporalFilterParams};
