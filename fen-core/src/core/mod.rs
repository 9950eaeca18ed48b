//! Core types and error values shared by every pipeline stage.

pub mod errors;
pub mod types;

pub use errors::{BookError, RiskDenial};
pub use types::{
    fixed_point, MarketRegime, Order, PriceLevel, QuotePair, Side, Tick, TradingEvent,
    DEPTH_LEVELS,
};
