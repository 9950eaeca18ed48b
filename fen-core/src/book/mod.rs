//! Level-indexed order book with deep order-flow-imbalance features.
//!
//! - [`levels`] - flat cache-aligned slot storage per side
//! - [`ofi`] - feature types and bounded pressure windows
//! - [`reconstructor`] - the sequenced update engine

pub mod levels;
pub mod ofi;
pub mod reconstructor;

pub use levels::{FlatLevelBook, LevelSlot, MAX_LEVELS};
pub use ofi::{DeepOfiFeatures, FeatureObserver, PressureWindow};
pub use reconstructor::{BookSnapshot, BookStats, BookUpdate, OrderBook, UpdateKind};
