//! fen-core - single-threaded tick-to-trade pipeline
//!
//! The hot path of an electronic market maker, built for deterministic
//! sub-microsecond stage budgets:
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────────┐   ┌─────────┐
//! │ feed SPSC│──▶│ OrderBook │──▶│ Intensity   │──▶│ feature │
//! │  (ticks) │   │ + deep OFI│   │ engine      │   │ vector  │
//! └──────────┘   └───────────┘   └─────────────┘   └────┬────┘
//!                                                       ▼
//! ┌──────────┐   ┌───────────┐   ┌─────────────┐   ┌─────────┐
//! │order SPSC│◀──│ RiskGate  │◀──│ QuoteEngine │◀──│ oracle  │
//! └──────────┘   └───────────┘   └─────────────┘   └─────────┘
//! ```
//!
//! ## Design rules
//!
//! - **One thread, one core.** The whole pipeline is confined to a
//!   pinned thread ([`perf::cpu`]); the only cross-thread structures
//!   are the three SPSC rings ([`queue::SpscQueue`]) and the relaxed
//!   metric counters ([`perf::metrics`]).
//! - **No allocation after construction.** Books, rings and windows are
//!   pre-sized; the hash overlays are reserved to capacity.
//! - **Errors are values.** Hot-path failures are `Copy` enums handled
//!   at the stage that produced them ([`core::errors`]); `anyhow` only
//!   appears on startup paths.
//! - **Deterministic numerics.** Primitive f64 arithmetic with fixed
//!   summation order everywhere; replaying the same updates bit-exactly
//!   reproduces every feature and quote.
//!
//! ## Modules
//!
//! - [`core`] - shared types ([`Tick`], [`Order`], [`QuotePair`], …)
//! - [`queue`] - the lock-free SPSC ring
//! - [`book`] - order-book reconstruction and deep-OFI features
//! - [`intensity`] - self-exciting buy/sell arrival intensities
//! - [`quote`] - inventory- and latency-aware quote generation
//! - [`risk`] - pre-trade checks
//! - [`inference`] - feature assembly and the external-oracle boundary
//! - [`engine`] - the composed pipeline
//! - [`perf`], [`shutdown`], [`utils`] - runtime plumbing

pub mod book;
pub mod core;
pub mod engine;
pub mod inference;
pub mod intensity;
pub mod perf;
pub mod queue;
pub mod quote;
pub mod risk;
pub mod shutdown;
pub mod utils;

pub use crate::core::{
    fixed_point, BookError, MarketRegime, Order, PriceLevel, QuotePair, RiskDenial, Side, Tick,
    TradingEvent, DEPTH_LEVELS,
};
pub use book::{BookSnapshot, BookUpdate, DeepOfiFeatures, OrderBook, UpdateKind};
pub use engine::{Pipeline, PipelineConfig, PipelineStats, QuoteDecision};
pub use inference::{FeatureVector, FixedLatencyOracle, InferenceOracle, Prediction};
pub use intensity::{IntensityEngine, IntensityParams};
pub use queue::SpscQueue;
pub use quote::{QuoteEngine, QuoteParams};
pub use risk::{RiskGate, RiskLimits};
pub use shutdown::ShutdownFlag;

/// Convenience imports for binaries and tests.
pub mod prelude {
    pub use crate::book::{BookSnapshot, BookUpdate, OrderBook, UpdateKind};
    pub use crate::core::{MarketRegime, Order, QuotePair, Side, Tick, TradingEvent};
    pub use crate::engine::{Pipeline, PipelineConfig, QuoteDecision};
    pub use crate::inference::{FixedLatencyOracle, InferenceOracle};
    pub use crate::intensity::{IntensityEngine, IntensityParams};
    pub use crate::queue::SpscQueue;
    pub use crate::quote::{QuoteEngine, QuoteParams};
    pub use crate::risk::{RiskGate, RiskLimits};
    pub use crate::shutdown::ShutdownFlag;
}
