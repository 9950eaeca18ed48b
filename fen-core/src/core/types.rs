//! Shared market-data and order types for the tick-to-trade pipeline
//!
//! Everything that crosses a stage boundary lives here. Design rules:
//! - `Copy` semantics for anything that crosses a queue (values are
//!   memcpy'd into the ring, never boxed)
//! - Cache-line alignment (64 bytes) for the structures touched on
//!   every tick
//! - Plain `f64` prices and `u64` sizes; the book keys prices by an
//!   exact fixed-point representation (see [`fixed_point`])

use std::fmt;

/// Number of depth levels carried per side in a [`Tick`].
pub const DEPTH_LEVELS: usize = 10;

/// Taker/order side.
///
/// Single byte for minimal size in packed structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// The opposite side.
    #[inline(always)]
    pub const fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// +1 for buys, -1 for sells. Used for signed position deltas.
    #[inline(always)]
    pub const fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Exact fixed-point price keys (9 decimal places).
///
/// `f64` prices cannot be used as hash-map keys directly (NaN, -0.0,
/// representation drift from arithmetic). The order book therefore keys
/// its price → slot overlay by an i64 scaled to 9 decimals, which is
/// exact for any realistic venue tick size.
pub mod fixed_point {
    /// Scale factor for 9 decimal places.
    pub const SCALE: f64 = 1_000_000_000.0;

    /// Convert an f64 price to its exact i64 key.
    #[inline(always)]
    pub fn price_key(price: f64) -> i64 {
        (price * SCALE).round() as i64
    }

    /// Convert a key back to the f64 price it represents.
    #[inline(always)]
    pub fn key_to_price(key: i64) -> f64 {
        key as f64 / SCALE
    }
}

/// One discrete market-data observation (quote or trade), cache-aligned
/// and trivially copyable so it can cross the SPSC ring by value.
///
/// Invariants: `bid_price <= ask_price` whenever both are positive;
/// `bid_prices` strictly descending and `ask_prices` strictly ascending
/// over the first `depth_levels` entries.
#[derive(Debug, Clone, Copy)]
#[repr(C, align(64))]
pub struct Tick {
    /// Monotonic timestamp, nanoseconds.
    pub timestamp_ns: i64,
    /// Best bid price (0.0 when the side is empty).
    pub bid_price: f64,
    /// Best ask price (0.0 when the side is empty).
    pub ask_price: f64,
    /// Mid price, (bid + ask) / 2.
    pub mid_price: f64,
    /// Displayed size at the best bid.
    pub bid_size: u64,
    /// Displayed size at the best ask.
    pub ask_size: u64,
    /// Volume of the last trade, 0 for pure quote updates.
    pub trade_volume: u64,
    /// Taker direction of the last trade.
    pub trade_side: Side,
    /// Asset identifier for cross-asset tracking.
    pub asset_id: u32,
    /// Number of valid depth levels (0..=10).
    pub depth_levels: u8,

    /// Bid prices, best first (descending).
    pub bid_prices: [f64; DEPTH_LEVELS],
    /// Ask prices, best first (ascending).
    pub ask_prices: [f64; DEPTH_LEVELS],
    /// Bid sizes per level.
    pub bid_sizes: [u64; DEPTH_LEVELS],
    /// Ask sizes per level.
    pub ask_sizes: [u64; DEPTH_LEVELS],
}

impl Tick {
    /// An empty tick at a given time.
    pub fn empty(timestamp_ns: i64, asset_id: u32) -> Self {
        Self {
            timestamp_ns,
            bid_price: 0.0,
            ask_price: 0.0,
            mid_price: 0.0,
            bid_size: 0,
            ask_size: 0,
            trade_volume: 0,
            trade_side: Side::Buy,
            asset_id,
            depth_levels: 0,
            bid_prices: [0.0; DEPTH_LEVELS],
            ask_prices: [0.0; DEPTH_LEVELS],
            bid_sizes: [0; DEPTH_LEVELS],
            ask_sizes: [0; DEPTH_LEVELS],
        }
    }

    /// Top-of-book constructor; depth arrays mirror level 0.
    pub fn quote(
        timestamp_ns: i64,
        asset_id: u32,
        bid_price: f64,
        bid_size: u64,
        ask_price: f64,
        ask_size: u64,
    ) -> Self {
        let mut tick = Self::empty(timestamp_ns, asset_id);
        tick.bid_price = bid_price;
        tick.ask_price = ask_price;
        tick.mid_price = (bid_price + ask_price) / 2.0;
        tick.bid_size = bid_size;
        tick.ask_size = ask_size;
        tick.depth_levels = 1;
        tick.bid_prices[0] = bid_price;
        tick.ask_prices[0] = ask_price;
        tick.bid_sizes[0] = bid_size;
        tick.ask_sizes[0] = ask_size;
        tick
    }

    /// True when both sides are present and not crossed.
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.bid_price > 0.0 && self.ask_price > 0.0 && self.bid_price <= self.ask_price
    }

    /// Spread in basis points of mid; 0 when the tick is not valid.
    #[inline]
    pub fn spread_bps(&self) -> f64 {
        if !self.is_valid() || self.mid_price <= 0.0 {
            return 0.0;
        }
        (self.ask_price - self.bid_price) / self.mid_price * 10_000.0
    }
}

/// A live order emitted by the quote engine, sized for one cache line.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C, align(64))]
pub struct Order {
    /// Session-unique order id.
    pub order_id: u64,
    /// Asset identifier.
    pub asset_id: u32,
    /// Buy or sell.
    pub side: Side,
    /// Limit price; positive and tick-aligned.
    pub price: f64,
    /// Quantity; positive.
    pub quantity: u64,
    /// Submission timestamp, nanoseconds.
    pub submit_time_ns: i64,
    /// Cleared on fill or cancel.
    pub is_active: bool,
}

impl Order {
    pub fn new(
        order_id: u64,
        asset_id: u32,
        side: Side,
        price: f64,
        quantity: u64,
        submit_time_ns: i64,
    ) -> Self {
        Self {
            order_id,
            asset_id,
            side,
            price,
            quantity,
            submit_time_ns,
            is_active: true,
        }
    }

    /// Price × quantity.
    #[inline(always)]
    pub fn notional(&self) -> f64 {
        self.price * self.quantity as f64
    }

    /// Position delta if this order fills completely.
    #[inline(always)]
    pub fn signed_quantity(&self) -> i64 {
        self.side.sign() * self.quantity as i64
    }
}

/// One aggregated price level of the book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
    pub order_count: u32,
    pub last_update_ns: i64,
}

impl PriceLevel {
    pub fn new(price: f64, quantity: f64, order_count: u32, last_update_ns: i64) -> Self {
        Self {
            price,
            quantity,
            order_count,
            last_update_ns,
        }
    }
}

/// A buy/sell arrival consumed by the intensity engine.
#[derive(Debug, Clone, Copy)]
pub struct TradingEvent {
    /// Arrival time, nanoseconds.
    pub arrival_time_ns: i64,
    /// Taker direction.
    pub side: Side,
    /// Asset identifier.
    pub asset_id: u32,
    /// Intensity on `side` at the moment the event was recorded.
    pub intensity: f64,
}

impl TradingEvent {
    pub fn new(arrival_time_ns: i64, side: Side, asset_id: u32) -> Self {
        Self {
            arrival_time_ns,
            side,
            asset_id,
            intensity: 0.0,
        }
    }
}

/// Bid/ask quote produced by the quote engine.
///
/// Invariant for non-empty pairs: `bid_price < ask_price` and
/// `spread >= 2 * tick_size`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuotePair {
    pub bid_price: f64,
    pub ask_price: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    pub spread: f64,
    pub mid_price: f64,
    pub generated_at_ns: i64,
}

impl QuotePair {
    /// A zero-size pair signalling "do not quote".
    pub fn none(mid_price: f64, generated_at_ns: i64) -> Self {
        Self {
            mid_price,
            generated_at_ns,
            ..Self::default()
        }
    }

    /// True when this pair carries tradable prices on both sides.
    #[inline(always)]
    pub fn is_quotable(&self) -> bool {
        self.bid_price > 0.0 && self.ask_price > 0.0 && self.bid_price < self.ask_price
    }
}

/// Market stress regime; scales quote sizes down as stress rises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MarketRegime {
    Normal = 0,
    ElevatedVolatility = 1,
    HighStress = 2,
    Halted = 3,
}

impl MarketRegime {
    /// Quote-size multiplier for this regime.
    #[inline(always)]
    pub const fn size_multiplier(self) -> f64 {
        match self {
            MarketRegime::Normal => 1.0,
            MarketRegime::ElevatedVolatility => 0.7,
            MarketRegime::HighStress => 0.4,
            MarketRegime::Halted => 0.0,
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegime::Normal => write!(f, "NORMAL"),
            MarketRegime::ElevatedVolatility => write!(f, "ELEVATED"),
            MarketRegime::HighStress => write!(f, "HIGH_STRESS"),
            MarketRegime::Halted => write!(f, "HALTED"),
        }
    }
}
