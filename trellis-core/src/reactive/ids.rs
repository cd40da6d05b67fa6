//! Identifier types for the reactive system.
//!
//! Cells (signals and computed values) and subscribers (computed values,
//! effect adapters, and other tracked computations) are identified by small
//! copyable ids minted from atomic counters. A computed value owns both: a
//! `CellId` for the observable side it exposes to readers, and a
//! `SubscriberId` for the dependent side it presents to the runtime.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for an observable cell (signal or computed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(u64);

impl CellId {
    /// Generate a new unique cell ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a subscriber.
///
/// Each subscriber (computed value, effect adapter, or other tracked
/// computation) gets a unique ID when created. This ID is used to track
/// dependencies and avoid duplicate subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}
