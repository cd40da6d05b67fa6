//! Watcher Implementation
//!
//! A Watcher observes a set of tracked computations and coalesces their
//! staleness into notify callbacks. It is the subscription surface the
//! bridge scheduler is built on.
//!
//! # How Watching Works
//!
//! 1. `watch` installs a stale hook on the computation. When the computation
//!    goes stale, the hook moves it into the watcher's pending set.
//!
//! 2. The first staleness since the watcher was last re-armed fires the
//!    notify callback exactly once; every further staleness before the next
//!    `rearm` only accumulates in the pending set.
//!
//! 3. A flush takes the pending computations (in the order they became
//!    pending), refreshes them, and re-arms. If new staleness arrived during
//!    the flush, `rearm` fires the notify callback again so the next cycle
//!    picks it up; pending work is deferred, never re-entered.
//!
//! # Invariants
//!
//! - At most one notify per armed period.
//! - `unwatch` removes the computation from both the watched and pending
//!   sets synchronously, so a flush scheduled before the unwatch never
//!   touches it.

use std::sync::{Arc, Weak};

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;

use super::ids::SubscriberId;

/// Callback installed on a watched computation; invoked when it goes stale.
pub type StaleHook = Box<dyn Fn(SubscriberId) + Send + Sync>;

/// A unit of re-evaluable logic that a [`Watcher`] can observe.
///
/// Implemented by derived cells and by the bridge's effect adapter.
pub trait Tracked: Send + Sync {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Force re-evaluation, re-establishing the dependency set.
    ///
    /// A no-op when the computation is not stale or has been torn down.
    fn refresh(&self);

    /// Install or clear the hook invoked when this computation goes stale.
    fn set_stale_hook(&self, hook: Option<StaleHook>);
}

struct WatcherInner {
    /// Watched computations, in watch order.
    watched: IndexMap<SubscriberId, Weak<dyn Tracked>>,

    /// Computations that went stale since the last flush, in the order they
    /// became pending.
    pending: IndexSet<SubscriberId>,

    /// Whether the next staleness should fire the notify callback.
    armed: bool,
}

/// Coalesces staleness from watched computations into notify callbacks.
pub struct Watcher {
    notify: Box<dyn Fn() + Send + Sync>,
    inner: Mutex<WatcherInner>,
}

impl Watcher {
    /// Create a new armed watcher with the given notify callback.
    pub fn new<F>(notify: F) -> Arc<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Arc::new(Self {
            notify: Box::new(notify),
            inner: Mutex::new(WatcherInner {
                watched: IndexMap::new(),
                pending: IndexSet::new(),
                armed: true,
            }),
        })
    }

    /// Start watching a computation.
    pub fn watch(self: &Arc<Self>, computation: &Arc<dyn Tracked>) {
        let id = computation.subscriber_id();

        self.inner
            .lock()
            .watched
            .insert(id, Arc::downgrade(computation));

        let watcher = Arc::downgrade(self);
        computation.set_stale_hook(Some(Box::new(move |id| {
            if let Some(watcher) = watcher.upgrade() {
                watcher.on_stale(id);
            }
        })));
    }

    /// Stop watching a computation.
    ///
    /// Removes it from both the watched and pending sets before returning,
    /// and clears its stale hook.
    pub fn unwatch(&self, id: SubscriberId) {
        let weak = {
            let mut inner = self.inner.lock();
            inner.pending.shift_remove(&id);
            inner.watched.shift_remove(&id)
        };

        if let Some(computation) = weak.and_then(|w| w.upgrade()) {
            computation.set_stale_hook(None);
        }
    }

    /// Record that a watched computation went stale.
    fn on_stale(&self, id: SubscriberId) {
        let should_notify = {
            let mut inner = self.inner.lock();
            if !inner.watched.contains_key(&id) {
                return;
            }
            inner.pending.insert(id);

            let fire = inner.armed;
            inner.armed = false;
            fire
        };

        if should_notify {
            (self.notify)();
        }
    }

    /// Take the currently pending computations, in the order they became
    /// pending.
    ///
    /// The watcher stays disarmed: staleness arriving while the caller
    /// processes the returned computations accumulates for the next cycle.
    pub fn take_pending(&self) -> Vec<Arc<dyn Tracked>> {
        let mut inner = self.inner.lock();
        let ids: Vec<SubscriberId> = inner.pending.drain(..).collect();

        ids.iter()
            .filter_map(|id| inner.watched.get(id).and_then(Weak::upgrade))
            .collect()
    }

    /// Re-arm the watcher after a flush.
    ///
    /// If staleness accumulated during the flush, the notify callback fires
    /// immediately so the deferred work gets its own cycle.
    pub fn rearm(&self) {
        let fire = {
            let mut inner = self.inner.lock();
            if inner.pending.is_empty() {
                inner.armed = true;
                false
            } else {
                true
            }
        };

        if fire {
            (self.notify)();
        }
    }

    /// Number of computations currently pending.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Number of computations currently watched.
    pub fn watched_count(&self) -> usize {
        self.inner.lock().watched.len()
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Watcher")
            .field("watched", &inner.watched.len())
            .field("pending", &inner.pending.len())
            .field("armed", &inner.armed)
            .finish()
    }
}
