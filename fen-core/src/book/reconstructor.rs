//! Tick-by-tick limit-order-book reconstruction
//!
//! Applies sequenced ADD / MODIFY / DELETE / EXECUTE updates against two
//! flat-array sides plus an order-id index, and publishes a deep-OFI
//! feature snapshot after every applied update.
//!
//! ## Sequencing
//!
//! Sequence tracking uses an explicit `initialized` flag: the first
//! accepted update (or a snapshot) arms the tracker, and from then on
//! any update whose sequence is not `last + 1` sets the gap flag and is
//! rejected. While gapped, every update is rejected until
//! [`OrderBook::apply_snapshot`] reloads the book and clears the flag.
//! There is no magic zero sentinel: a spurious `seq = 1` after a gap is
//! rejected like any other out-of-sequence update.
//!
//! ## Feature timing
//!
//! The per-side top-ten quantities are snapshotted strictly before the
//! update mutates the book; OFI deltas are current-minus-previous over
//! those arrays. Summation order is fixed, so replays are bit-exact.

use crate::book::levels::FlatLevelBook;
use crate::book::ofi::{DeepOfiFeatures, FeatureObserver, PressureWindow};
use crate::core::errors::BookError;
use crate::core::types::{fixed_point::price_key, PriceLevel, DEPTH_LEVELS};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Initial capacity of the order-id index.
const ORDER_INDEX_CAPACITY: usize = 4096;

/// Kind of book mutation carried by a [`BookUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Add,
    Modify,
    Delete,
    Execute,
}

/// One sequenced order-book update from the feed.
#[derive(Debug, Clone, Copy)]
pub struct BookUpdate {
    pub kind: UpdateKind,
    pub order_id: u64,
    pub price: f64,
    pub quantity: f64,
    pub is_bid: bool,
    pub sequence: u64,
    pub timestamp_ns: i64,
}

/// Full book state used for gap recovery.
#[derive(Debug, Clone, Default)]
pub struct BookSnapshot {
    /// Bid levels, sorted descending by price.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, sorted ascending by price.
    pub asks: Vec<PriceLevel>,
    pub sequence: u64,
    pub timestamp_ns: i64,
}

/// Resting order resolved by id for MODIFY / DELETE / EXECUTE.
#[derive(Debug, Clone, Copy)]
struct TrackedOrder {
    price: f64,
    quantity: f64,
    is_bid: bool,
}

/// Sequence tracking with an explicit armed state.
#[derive(Debug, Clone, Copy, Default)]
struct SequenceTracker {
    last: u64,
    initialized: bool,
    gapped: bool,
}

impl SequenceTracker {
    /// Validate an incoming sequence. Does not advance; call
    /// [`SequenceTracker::accept`] once the update is consumed.
    #[inline(always)]
    fn check(&self, sequence: u64) -> Result<(), BookError> {
        if self.gapped {
            return Err(BookError::GapPending);
        }
        if self.initialized && sequence != self.last.wrapping_add(1) {
            return Err(BookError::SequenceGap {
                expected: self.last.wrapping_add(1),
                got: sequence,
            });
        }
        Ok(())
    }

    #[inline(always)]
    fn accept(&mut self, sequence: u64) {
        self.last = sequence;
        self.initialized = true;
    }

    fn reset_at(&mut self, sequence: u64) {
        self.last = sequence;
        self.initialized = true;
        self.gapped = false;
    }
}

/// Book-level statistics for telemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookStats {
    pub total_updates: u64,
    pub missed_updates: u64,
    pub snapshot_requests: u64,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub last_mid_price: f64,
    pub last_spread: f64,
}

/// The order-book reconstructor.
pub struct OrderBook {
    bids: FlatLevelBook,
    asks: FlatLevelBook,
    orders: HashMap<u64, TrackedOrder>,

    sequence: SequenceTracker,
    total_updates: u64,
    missed_updates: u64,
    snapshot_requests: u64,

    previous_bid_quantities: [f64; DEPTH_LEVELS],
    previous_ask_quantities: [f64; DEPTH_LEVELS],
    buy_pressure: PressureWindow,
    sell_pressure: PressureWindow,

    current_features: DeepOfiFeatures,
    observers: Vec<FeatureObserver>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: FlatLevelBook::new(),
            asks: FlatLevelBook::new(),
            orders: HashMap::with_capacity(ORDER_INDEX_CAPACITY),
            sequence: SequenceTracker::default(),
            total_updates: 0,
            missed_updates: 0,
            snapshot_requests: 0,
            previous_bid_quantities: [0.0; DEPTH_LEVELS],
            previous_ask_quantities: [0.0; DEPTH_LEVELS],
            buy_pressure: PressureWindow::new(),
            sell_pressure: PressureWindow::new(),
            current_features: DeepOfiFeatures::default(),
            observers: Vec::new(),
        }
    }

    /// Register an observer invoked with every published feature
    /// snapshot. Registration happens at wiring time, never per tick.
    pub fn register_observer(&mut self, observer: FeatureObserver) {
        self.observers.push(observer);
    }

    /// Apply one sequenced update.
    ///
    /// On success the book state, the OFI feature snapshot and the
    /// sequence position all advance together. A sequence gap rejects
    /// the update, arms the gap flag and requests snapshot recovery;
    /// content errors (unknown DELETE, bad price) consume the sequence
    /// number but leave the book untouched.
    pub fn apply_update(&mut self, update: &BookUpdate) -> Result<(), BookError> {
        if let Err(err) = self.sequence.check(update.sequence) {
            if let BookError::SequenceGap { expected, got } = err {
                self.sequence.gapped = true;
                self.missed_updates += got.saturating_sub(expected);
                self.snapshot_requests += 1;
                warn!(
                    expected,
                    got, "sequence gap detected; rejecting updates until snapshot"
                );
            }
            return Err(err);
        }

        // Content validation happens after sequencing: a well-sequenced
        // but malformed update consumes its sequence number.
        if matches!(update.kind, UpdateKind::Add | UpdateKind::Modify) && update.price <= 0.0 {
            self.sequence.accept(update.sequence);
            return Err(BookError::InvalidPrice {
                key: price_key(update.price),
            });
        }

        self.store_previous_state();

        let result = match update.kind {
            UpdateKind::Add => self.handle_add(update),
            UpdateKind::Modify => self.handle_modify(update),
            UpdateKind::Delete => self.handle_delete(update),
            UpdateKind::Execute => self.handle_execute(update),
        };

        self.sequence.accept(update.sequence);

        match result {
            Ok(()) => {
                self.total_updates += 1;
                let features = self.compute_features(update.timestamp_ns);
                self.current_features = features;
                for observer in &self.observers {
                    observer(&features);
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Replace the whole book from a snapshot and clear the gap flag.
    pub fn apply_snapshot(&mut self, snapshot: &BookSnapshot) -> Result<(), BookError> {
        if let (Some(best_bid), Some(best_ask)) = (snapshot.bids.first(), snapshot.asks.first()) {
            if best_bid.price >= best_ask.price {
                return Err(BookError::InvalidPrice {
                    key: price_key(best_bid.price),
                });
            }
        }

        self.bids.clear();
        self.asks.clear();
        self.orders.clear();

        for level in &snapshot.bids {
            if level.price <= 0.0 {
                continue;
            }
            self.bids.adjust(
                price_key(level.price),
                level.price,
                level.quantity,
                level.order_count.max(1) as i32,
                snapshot.timestamp_ns,
            )?;
        }
        for level in &snapshot.asks {
            if level.price <= 0.0 {
                continue;
            }
            self.asks.adjust(
                price_key(level.price),
                level.price,
                level.quantity,
                level.order_count.max(1) as i32,
                snapshot.timestamp_ns,
            )?;
        }

        self.sequence.reset_at(snapshot.sequence);
        self.store_previous_state();
        debug!(
            sequence = snapshot.sequence,
            bids = self.bids.len(),
            asks = self.asks.len(),
            "book reloaded from snapshot"
        );
        Ok(())
    }

    fn handle_add(&mut self, update: &BookUpdate) -> Result<(), BookError> {
        self.orders.insert(
            update.order_id,
            TrackedOrder {
                price: update.price,
                quantity: update.quantity,
                is_bid: update.is_bid,
            },
        );

        let side = if update.is_bid {
            &mut self.bids
        } else {
            &mut self.asks
        };
        side.adjust(
            price_key(update.price),
            update.price,
            update.quantity,
            1,
            update.timestamp_ns,
        )
    }

    fn handle_modify(&mut self, update: &BookUpdate) -> Result<(), BookError> {
        let Some(order) = self.orders.get(&update.order_id).copied() else {
            // Unknown MODIFY is promoted to ADD.
            return self.handle_add(update);
        };

        let side = if order.is_bid {
            &mut self.bids
        } else {
            &mut self.asks
        };
        side.adjust(
            price_key(order.price),
            order.price,
            -order.quantity,
            -1,
            update.timestamp_ns,
        )?;

        self.orders.insert(
            update.order_id,
            TrackedOrder {
                price: update.price,
                quantity: update.quantity,
                is_bid: order.is_bid,
            },
        );

        let side = if order.is_bid {
            &mut self.bids
        } else {
            &mut self.asks
        };
        side.adjust(
            price_key(update.price),
            update.price,
            update.quantity,
            1,
            update.timestamp_ns,
        )
    }

    fn handle_delete(&mut self, update: &BookUpdate) -> Result<(), BookError> {
        let Some(order) = self.orders.remove(&update.order_id) else {
            return Err(BookError::UnknownOrder {
                order_id: update.order_id,
            });
        };

        let side = if order.is_bid {
            &mut self.bids
        } else {
            &mut self.asks
        };
        side.adjust(
            price_key(order.price),
            order.price,
            -order.quantity,
            -1,
            update.timestamp_ns,
        )
    }

    fn handle_execute(&mut self, update: &BookUpdate) -> Result<(), BookError> {
        let Some(order) = self.orders.get(&update.order_id).copied() else {
            // Aggressive trade against the book: consume displayed
            // liquidity on the opposite side and record taker pressure.
            let (side, window) = if update.is_bid {
                (&mut self.asks, &mut self.buy_pressure)
            } else {
                (&mut self.bids, &mut self.sell_pressure)
            };
            side.adjust(
                price_key(update.price),
                update.price,
                -update.quantity,
                0,
                update.timestamp_ns,
            )?;
            window.push(update.quantity);
            return Ok(());
        };

        let fully_executed = update.quantity >= order.quantity;
        let side = if order.is_bid {
            &mut self.bids
        } else {
            &mut self.asks
        };
        side.adjust(
            price_key(order.price),
            order.price,
            -update.quantity,
            if fully_executed { -1 } else { 0 },
            update.timestamp_ns,
        )?;

        if fully_executed {
            self.orders.remove(&update.order_id);
        } else if let Some(order) = self.orders.get_mut(&update.order_id) {
            order.quantity -= update.quantity;
        }
        Ok(())
    }

    /// Best bid and ask by natural side ordering.
    pub fn top_of_book(&self) -> (Option<PriceLevel>, Option<PriceLevel>) {
        (
            self.bids.best_max().map(|s| s.as_price_level()),
            self.asks.best_min().map(|s| s.as_price_level()),
        )
    }

    /// Project the current book into a [`Tick`], allocation-free. Trade
    /// fields are left for the caller to fill from the triggering
    /// update.
    pub fn as_tick(&self, timestamp_ns: i64, asset_id: u32) -> crate::core::types::Tick {
        use crate::core::types::Tick;

        let mut tick = Tick::empty(timestamp_ns, asset_id);

        let mut bid_levels = [(0.0, 0.0); DEPTH_LEVELS];
        let mut ask_levels = [(0.0, 0.0); DEPTH_LEVELS];
        let bid_count = self.bids.top_levels(true, &mut bid_levels);
        let ask_count = self.asks.top_levels(false, &mut ask_levels);

        for i in 0..bid_count {
            tick.bid_prices[i] = bid_levels[i].0;
            tick.bid_sizes[i] = bid_levels[i].1 as u64;
        }
        for i in 0..ask_count {
            tick.ask_prices[i] = ask_levels[i].0;
            tick.ask_sizes[i] = ask_levels[i].1 as u64;
        }
        tick.depth_levels = bid_count.max(ask_count) as u8;

        if bid_count > 0 {
            tick.bid_price = bid_levels[0].0;
            tick.bid_size = bid_levels[0].1 as u64;
        }
        if ask_count > 0 {
            tick.ask_price = ask_levels[0].0;
            tick.ask_size = ask_levels[0].1 as u64;
        }
        if bid_count > 0 && ask_count > 0 {
            tick.mid_price = (tick.bid_price + tick.ask_price) / 2.0;
        }
        tick
    }

    /// Top `n` levels per side; bids descending, asks ascending.
    pub fn depth(&self, n: usize) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        (
            self.bids.sorted_levels(n, true),
            self.asks.sorted_levels(n, false),
        )
    }

    /// The feature snapshot from the most recent applied update.
    #[inline(always)]
    pub fn current_features(&self) -> &DeepOfiFeatures {
        &self.current_features
    }

    /// True while a sequence gap is unrecovered.
    #[inline(always)]
    pub fn needs_snapshot_recovery(&self) -> bool {
        self.sequence.gapped
    }

    pub fn stats(&self) -> BookStats {
        let (bid, ask) = self.top_of_book();
        let (mid, spread) = match (bid, ask) {
            (Some(b), Some(a)) => ((b.price + a.price) / 2.0, a.price - b.price),
            _ => (0.0, 0.0),
        };
        BookStats {
            total_updates: self.total_updates,
            missed_updates: self.missed_updates,
            snapshot_requests: self.snapshot_requests,
            bid_levels: self.bids.len(),
            ask_levels: self.asks.len(),
            last_mid_price: mid,
            last_spread: spread,
        }
    }

    fn store_previous_state(&mut self) {
        let mut bid_levels = [(0.0, 0.0); DEPTH_LEVELS];
        let mut ask_levels = [(0.0, 0.0); DEPTH_LEVELS];
        let bid_count = self.bids.top_levels(true, &mut bid_levels);
        let ask_count = self.asks.top_levels(false, &mut ask_levels);

        for i in 0..DEPTH_LEVELS {
            self.previous_bid_quantities[i] = if i < bid_count { bid_levels[i].1 } else { 0.0 };
            self.previous_ask_quantities[i] = if i < ask_count { ask_levels[i].1 } else { 0.0 };
        }
    }

    fn compute_features(&self, timestamp_ns: i64) -> DeepOfiFeatures {
        let mut features = DeepOfiFeatures {
            timestamp_ns,
            ..Default::default()
        };

        let mut bid_levels = [(0.0, 0.0); DEPTH_LEVELS];
        let mut ask_levels = [(0.0, 0.0); DEPTH_LEVELS];
        let bid_count = self.bids.top_levels(true, &mut bid_levels);
        let ask_count = self.asks.top_levels(false, &mut ask_levels);

        // Per-level deltas; a vanished level contributes its full
        // previous quantity as negative flow.
        for i in 0..DEPTH_LEVELS {
            let bid_qty = if i < bid_count { bid_levels[i].1 } else { 0.0 };
            let ask_qty = if i < ask_count { ask_levels[i].1 } else { 0.0 };
            features.bid_ofi[i] = bid_qty - self.previous_bid_quantities[i];
            features.ask_ofi[i] = ask_qty - self.previous_ask_quantities[i];
        }

        for i in 0..DEPTH_LEVELS {
            let level_ofi = features.bid_ofi[i] - features.ask_ofi[i];
            features.total_ofi += level_ofi;
            if i < 5 {
                features.top_5_ofi += level_ofi;
            }
        }
        features.top_1_ofi = features.bid_ofi[0] - features.ask_ofi[0];

        // Volume-weighted OFI over the visible ten levels.
        let mut total_volume = 0.0;
        let mut weighted = 0.0;
        for i in 0..bid_count {
            weighted += features.bid_ofi[i] * bid_levels[i].1;
            total_volume += bid_levels[i].1;
        }
        for i in 0..ask_count {
            weighted -= features.ask_ofi[i] * ask_levels[i].1;
            total_volume += ask_levels[i].1;
        }
        if total_volume > 0.0 {
            features.weighted_ofi = weighted / total_volume;
        }

        // Book-wide imbalances.
        let bid_volume = self.bids.total_quantity();
        let ask_volume = self.asks.total_quantity();
        if bid_volume + ask_volume > 0.0 {
            features.volume_imbalance = (bid_volume - ask_volume) / (bid_volume + ask_volume);
        }

        let depth_total = (self.bids.len() + self.asks.len()) as f64;
        if depth_total > 0.0 {
            features.depth_imbalance =
                (self.bids.len() as f64 - self.asks.len() as f64) / depth_total;
        }

        if bid_count > 0 && ask_count > 0 {
            let (best_bid, bid_qty) = bid_levels[0];
            let (best_ask, ask_qty) = ask_levels[0];
            features.bid_ask_spread = best_ask - best_bid;
            features.mid_price = (best_bid + best_ask) / 2.0;
            features.weighted_mid_price = if bid_qty + ask_qty > 0.0 {
                (best_bid * ask_qty + best_ask * bid_qty) / (bid_qty + ask_qty)
            } else {
                features.mid_price
            };
        }

        features.buy_pressure = self.buy_pressure.sum();
        features.sell_pressure = self.sell_pressure.sum();
        features.net_pressure = features.buy_pressure - features.sell_pressure;

        features
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
