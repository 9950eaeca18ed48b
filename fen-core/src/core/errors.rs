//! Hot-path error values
//!
//! Every error that can occur while processing a tick is a small `Copy`
//! value handled at the stage that produced it. Nothing here allocates,
//! and nothing unwinds across stages; `anyhow` is reserved for startup
//! and shutdown paths in the binaries.

use std::fmt;

/// Rejection reasons for an order-book update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookError {
    /// The update's sequence number is not `last + 1`. The book has set
    /// its gap flag and needs a snapshot before accepting more updates.
    SequenceGap { expected: u64, got: u64 },

    /// A gap was detected earlier and no snapshot has arrived yet.
    GapPending,

    /// DELETE referenced an order id the book has never seen. The book
    /// is left untouched.
    UnknownOrder { order_id: u64 },

    /// Non-positive price, or a snapshot with bid >= ask.
    InvalidPrice { key: i64 },

    /// Both sides of the book are at capacity at distinct prices.
    BookFull,
}

impl fmt::Display for BookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookError::SequenceGap { expected, got } => {
                write!(f, "sequence gap: expected {}, got {}", expected, got)
            }
            BookError::GapPending => {
                write!(f, "updates rejected until snapshot recovery completes")
            }
            BookError::UnknownOrder { order_id } => {
                write!(f, "unknown order id {}", order_id)
            }
            BookError::InvalidPrice { key } => {
                write!(f, "invalid price (key {})", key)
            }
            BookError::BookFull => write!(f, "price-level capacity exhausted"),
        }
    }
}

impl std::error::Error for BookError {}

/// Reasons the risk gate can deny an order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskDenial {
    /// Resulting position would exceed the absolute limit.
    PositionLimit { would_be: i64, limit: i64 },

    /// Order notional exceeds the per-trade cap.
    NotionalCap { notional: f64, cap: f64 },

    /// Accumulated daily loss has reached the loss cap.
    DailyLossCap { loss: f64, cap: f64 },

    /// Trading is halted (regime multiplier is zero).
    RegimeHalted,

    /// Sell while flat or short, with the no-naked-short policy active.
    NakedShort { position: i64 },
}

impl fmt::Display for RiskDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskDenial::PositionLimit { would_be, limit } => {
                write!(f, "position {} would exceed limit {}", would_be, limit)
            }
            RiskDenial::NotionalCap { notional, cap } => {
                write!(f, "notional {:.2} exceeds per-trade cap {:.2}", notional, cap)
            }
            RiskDenial::DailyLossCap { loss, cap } => {
                write!(f, "daily loss {:.2} at cap {:.2}", loss, cap)
            }
            RiskDenial::RegimeHalted => write!(f, "market regime is HALTED"),
            RiskDenial::NakedShort { position } => {
                write!(f, "naked short denied at position {}", position)
            }
        }
    }
}

impl std::error::Error for RiskDenial {}
