//! Effect Adapter
//!
//! The effect adapter turns an arbitrary side-effecting callback with
//! optional cleanup into a tracked computation driven by the scheduler.
//!
//! # How Effects Work
//!
//! 1. [`bind_effect`] wraps the callback, registers it with the runtime and
//!    the scheduler, and runs it once immediately so first-run side effects
//!    happen without waiting for a flush.
//!
//! 2. Each run executes inside a tracking context: any cell the callback
//!    reads becomes a dependency for the next round.
//!
//! 3. When a dependency changes, the scheduler refreshes the effect on the
//!    next flush: the previous cleanup (if any) runs first, then the
//!    callback, and whatever it returns becomes the new cleanup.
//!
//! 4. [`EffectBinding::unbind`] tears the effect down: it is removed from
//!    the scheduler's pending set synchronously, the outstanding cleanup
//!    runs exactly once, and the effect never runs again. `unbind` is
//!    idempotent, and the binding also unbinds on drop.
//!
//! This adapter is the sole mechanism wiring host lifecycle to the
//! observable graph: the host's own effect hook calls `bind_effect` once on
//! mount and `unbind` once on unmount; all re-run logic is driven by the
//! scheduler, not by the host.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use std::sync::RwLock;

use crate::reactive::{
    clear_dependencies, register, Dependent, RegistrationHandle, StaleHook, SubscriberId,
    Tracked, TrackingContext,
};

use super::scheduler;

/// Cleanup returned by an effect body; runs before the next body run and on
/// unbind.
pub type Cleanup = Box<dyn FnOnce() + Send>;

struct EffectInner {
    subscriber_id: SubscriberId,

    /// The effect body. `FnMut` so bodies can own mutable state across runs.
    body: Mutex<Box<dyn FnMut() -> Option<Cleanup> + Send>>,

    /// Cleanup from the previous run, if any.
    cleanup: Mutex<Option<Cleanup>>,

    /// Installed by the scheduler's watcher.
    stale_hook: RwLock<Option<StaleHook>>,

    /// Set once by `unbind`; a disposed effect never runs again.
    disposed: AtomicBool,

    /// Number of completed body runs.
    runs: AtomicU64,
}

impl Dependent for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_stale(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        if let Some(hook) = &*self.stale_hook.read().expect("stale_hook lock poisoned") {
            hook(self.subscriber_id);
        }
    }
}

impl Tracked for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn refresh(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        // Cleanup for run n completes before the body of run n+1 begins.
        if let Some(cleanup) = self.cleanup.lock().take() {
            cleanup();
        }

        clear_dependencies(self.subscriber_id);

        let new_cleanup = {
            let _ctx = TrackingContext::enter(self.subscriber_id);
            let mut body = self.body.lock();
            (*body)()
        };

        *self.cleanup.lock() = new_cleanup;
        self.runs.fetch_add(1, Ordering::SeqCst);

        tracing::trace!(id = ?self.subscriber_id, "effect ran");
    }

    fn set_stale_hook(&self, hook: Option<StaleHook>) {
        *self.stale_hook.write().expect("stale_hook lock poisoned") = hook;
    }
}

/// Handle to a bound effect.
///
/// Unbinds on drop; call [`unbind`](EffectBinding::unbind) for explicit
/// teardown from host lifecycle.
pub struct EffectBinding {
    inner: Arc<EffectInner>,

    /// Runtime registration; dropped with the binding.
    _registration: RegistrationHandle,
}

impl EffectBinding {
    /// Tear the effect down.
    ///
    /// Idempotent. Removes the effect from the scheduler's pending set
    /// before returning and runs the outstanding cleanup exactly once; the
    /// effect body never runs again. Safe to call from within a flush.
    pub fn unbind(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        scheduler::drop_interest(self.inner.subscriber_id);
        clear_dependencies(self.inner.subscriber_id);

        if let Some(cleanup) = self.inner.cleanup.lock().take() {
            cleanup();
        }

        tracing::trace!(id = ?self.inner.subscriber_id, "effect unbound");
    }

    /// Whether the effect has been unbound.
    pub fn is_unbound(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of completed body runs.
    pub fn run_count(&self) -> u64 {
        self.inner.runs.load(Ordering::SeqCst)
    }

    /// The effect's subscriber ID.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }
}

impl Drop for EffectBinding {
    fn drop(&mut self) {
        self.unbind();
    }
}

impl std::fmt::Debug for EffectBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectBinding")
            .field("id", &self.inner.subscriber_id)
            .field("runs", &self.run_count())
            .field("unbound", &self.is_unbound())
            .finish()
    }
}

/// Bind a side-effecting callback to the observable graph.
///
/// The callback runs once immediately (establishing its dependency set) and
/// again on every flush in which one of its dependencies changed. It may
/// return a cleanup, which runs before the next invocation and on unbind.
pub fn bind_effect<F>(body: F) -> EffectBinding
where
    F: FnMut() -> Option<Cleanup> + Send + 'static,
{
    let inner = Arc::new(EffectInner {
        subscriber_id: SubscriberId::new(),
        body: Mutex::new(Box::new(body)),
        cleanup: Mutex::new(None),
        stale_hook: RwLock::new(None),
        disposed: AtomicBool::new(false),
        runs: AtomicU64::new(0),
    });

    let registration = register(inner.clone());
    scheduler::register_interest(&(inner.clone() as Arc<dyn Tracked>));

    // First run happens synchronously, before any flush.
    inner.refresh();

    EffectBinding {
        inner,
        _registration: registration,
    }
}
