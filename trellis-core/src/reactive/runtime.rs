//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects cells to the
//! computations that read them. It owns the dependency graph and fans
//! staleness out when a cell changes.
//!
//! # How It Works
//!
//! 1. When a computed value or effect adapter is created, it registers with
//!    the runtime as a dependent.
//!
//! 2. When a computation reads a cell inside a tracked evaluation, the
//!    runtime records the dependency edge (cell → subscriber).
//!
//! 3. When a cell's value changes, the runtime looks up the cell's
//!    dependents and calls `mark_stale` on each. Derived cells propagate
//!    staleness to their own dependents transitively; watched computations
//!    additionally report to the scheduler through their stale hook.
//!
//! Recomputation is never performed here: staleness propagates eagerly at
//! write time, values are pulled lazily at read time. This split is what
//! keeps derived reads glitch-free.
//!
//! # Thread Safety
//!
//! The dependency maps are process-wide and guarded by `parking_lot` locks.
//! Guards are always released before invoking dependent callbacks, so
//! `mark_stale` implementations are free to call back into the runtime.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use smallvec::SmallVec;

use super::ids::{CellId, SubscriberId};

/// A trait for computations that can be notified when a cell they read
/// changes.
pub trait Dependent: Send + Sync {
    /// Get the subscriber ID for this dependent.
    fn subscriber_id(&self) -> SubscriberId;

    /// Mark this dependent as stale.
    ///
    /// Called with no runtime locks held; implementations may read or write
    /// runtime state, including notifying further cells.
    fn mark_stale(&self);
}

/// Handle to a registered dependent.
///
/// Dropping this handle unregisters the dependent from the runtime.
pub struct RegistrationHandle {
    subscriber_id: SubscriberId,
}

impl Drop for RegistrationHandle {
    fn drop(&mut self) {
        unregister(self.subscriber_id);
    }
}

// Global registry of dependents.
// Maps subscriber IDs to weak references to avoid preventing cleanup.
static REGISTRY: OnceLock<RwLock<HashMap<SubscriberId, Weak<dyn Dependent>>>> = OnceLock::new();
static CELL_DEPENDENTS: OnceLock<RwLock<HashMap<CellId, SmallVec<[SubscriberId; 4]>>>> =
    OnceLock::new();

fn registry() -> &'static RwLock<HashMap<SubscriberId, Weak<dyn Dependent>>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn cell_dependents() -> &'static RwLock<HashMap<CellId, SmallVec<[SubscriberId; 4]>>> {
    CELL_DEPENDENTS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a dependent with the runtime.
///
/// Returns a handle that unregisters the dependent when dropped.
pub fn register(dependent: Arc<dyn Dependent>) -> RegistrationHandle {
    let id = dependent.subscriber_id();

    registry().write().insert(id, Arc::downgrade(&dependent));

    RegistrationHandle { subscriber_id: id }
}

/// Unregister a dependent and drop all of its dependency edges.
fn unregister(id: SubscriberId) {
    registry().write().remove(&id);
    clear_dependencies(id);
}

/// Record that a subscriber depends on a cell.
///
/// Called automatically when a cell is read within a tracked evaluation.
pub fn add_dependency(cell_id: CellId, subscriber_id: SubscriberId) {
    let mut dependents = cell_dependents().write();
    let subs = dependents.entry(cell_id).or_default();
    if !subs.contains(&subscriber_id) {
        subs.push(subscriber_id);
    }
}

/// Remove all dependency edges for a subscriber.
///
/// Called before re-running a computation to clear stale dependencies.
pub fn clear_dependencies(subscriber_id: SubscriberId) {
    let mut dependents = cell_dependents().write();

    dependents.retain(|_, subs| {
        subs.retain(|s| *s != subscriber_id);
        !subs.is_empty()
    });
}

/// Notify all dependents that a cell changed.
///
/// This is the core staleness propagation mechanism. Dependents are
/// collected under the locks, but `mark_stale` runs with no lock held so
/// implementations can notify their own cells in turn.
pub fn notify_cell_changed(cell_id: CellId) {
    let subscriber_ids = {
        let dependents = cell_dependents().read();
        match dependents.get(&cell_id) {
            Some(subs) => subs.clone(),
            None => return,
        }
    };

    let stale: Vec<Arc<dyn Dependent>> = {
        let registry = registry().read();
        subscriber_ids
            .iter()
            .filter_map(|id| registry.get(id).and_then(Weak::upgrade))
            .collect()
    };

    // Both locks are released before any dependent code runs.
    for dependent in stale {
        dependent.mark_stale();
    }
}

/// Number of dependents currently recorded for a cell.
///
/// Diagnostic accessor, used by cell `Debug` impls and tests.
pub fn dependent_count(cell_id: CellId) -> usize {
    cell_dependents()
        .read()
        .get(&cell_id)
        .map(|subs| subs.len())
        .unwrap_or(0)
}
