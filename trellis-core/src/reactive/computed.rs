//! Computed Implementation
//!
//! A Computed is a cached derived cell that re-evaluates only when one of
//! its dependencies has changed.
//!
//! # How Computed Cells Work
//!
//! 1. On first access, the cell runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependency has changed, returns the cache.
//!
//! 3. When a dependency changes, the cell is marked "maybe dirty" and the
//!    staleness propagates to the cell's own dependents immediately. No
//!    recomputation happens at write time.
//!
//! 4. On next access, the cell recomputes, re-establishing its dependency
//!    set for the next round.
//!
//! # Why This Matters
//!
//! Write-time staleness propagation plus read-time lazy pull is what makes
//! derived reads glitch-free: by the time anything is recomputed, the whole
//! downstream cone of the write is already marked, so a pull always descends
//! through stale intermediates and never observes a half-updated graph.
//!
//! # Thread Safety
//!
//! The cached value and dirty state are protected by locks. The computation
//! itself runs with no lock held.

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use super::context::TrackingContext;
use super::ids::{CellId, SubscriberId};
use super::runtime::{self, Dependent, RegistrationHandle};
use super::watcher::{StaleHook, Tracked};
use super::Observable;

/// Dirty state for a computed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed since the last evaluation. Needs recompute.
    MaybeDirty,

    /// The cell has never been evaluated.
    Dirty,
}

struct ComputedInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Identifier for the observable side (what readers depend on).
    cell_id: CellId,

    /// Identifier for the dependent side (what this cell depends through).
    subscriber_id: SubscriberId,

    /// The computation function.
    compute: Box<dyn Fn() -> T + Send + Sync>,

    /// The cached value (None if never computed).
    value: RwLock<Option<T>>,

    /// Current dirty state.
    state: RwLock<ComputedState>,

    /// Cell IDs this computation read during its last evaluation.
    dependencies: RwLock<HashSet<CellId>>,

    /// Installed by a `Watcher` when this cell is watched.
    stale_hook: RwLock<Option<StaleHook>>,
}

impl<T> ComputedInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn get_value(&self) -> T {
        if TrackingContext::is_active() {
            TrackingContext::record_read(self.cell_id);

            if let Some(subscriber_id) = TrackingContext::current_subscriber() {
                runtime::add_dependency(self.cell_id, subscriber_id);
            }
        }

        let state = *self.state.read().expect("state lock poisoned");

        match state {
            ComputedState::Clean => self
                .value
                .read()
                .expect("value lock poisoned")
                .clone()
                .expect("clean computed should have a value"),
            ComputedState::MaybeDirty | ComputedState::Dirty => self.recompute(),
        }
    }

    /// Recompute the cached value.
    ///
    /// Runs the computation within a tracking context so the dependency set
    /// is re-established from scratch. No lock is held while the computation
    /// runs.
    fn recompute(&self) -> T {
        runtime::clear_dependencies(self.subscriber_id);

        let new_value = {
            let _ctx = TrackingContext::enter(self.subscriber_id);
            let value = (self.compute)();

            let new_deps: HashSet<CellId> =
                TrackingContext::current_reads().into_iter().collect();
            *self.dependencies.write().expect("dependencies lock poisoned") = new_deps;

            value
        };

        let value_changed = {
            let current = self.value.read().expect("value lock poisoned");
            current.as_ref() != Some(&new_value)
        };

        *self.value.write().expect("value lock poisoned") = Some(new_value.clone());
        *self.state.write().expect("state lock poisoned") = ComputedState::Clean;

        tracing::trace!(
            cell = ?self.cell_id,
            changed = value_changed,
            "computed cell recomputed"
        );

        new_value
    }

    fn current_state(&self) -> ComputedState {
        *self.state.read().expect("state lock poisoned")
    }
}

impl<T> Dependent for ComputedInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_stale(&self) {
        let transitioned = {
            let mut state = self.state.write().expect("state lock poisoned");
            if *state == ComputedState::Clean {
                *state = ComputedState::MaybeDirty;
                true
            } else {
                false
            }
        };

        // Propagate only on the clean-to-stale edge; an already-stale cell
        // has already marked its downstream cone.
        if transitioned {
            runtime::notify_cell_changed(self.cell_id);

            if let Some(hook) = &*self.stale_hook.read().expect("stale_hook lock poisoned") {
                hook(self.subscriber_id);
            }
        }
    }
}

impl<T> Tracked for ComputedInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn refresh(&self) {
        if self.current_state() != ComputedState::Clean {
            let _ = self.recompute();
        }
    }

    fn set_stale_hook(&self, hook: Option<StaleHook>) {
        *self.stale_hook.write().expect("stale_hook lock poisoned") = hook;
    }
}

/// A cached derived cell that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Must be Clone + Send + Sync +
///   PartialEq. The PartialEq bound is used to detect whether a
///   recomputation actually produced a new value.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(2);
/// let doubled = Computed::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    inner: Arc<ComputedInner<T>>,

    /// Keeps the runtime registration alive for as long as any clone exists.
    _registration: Arc<RegistrationHandle>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a new computed cell with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new(ComputedInner {
            cell_id: CellId::new(),
            subscriber_id: SubscriberId::new(),
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: RwLock::new(ComputedState::Dirty),
            dependencies: RwLock::new(HashSet::new()),
            stale_hook: RwLock::new(None),
        });

        let registration = runtime::register(inner.clone());

        Self {
            inner,
            _registration: Arc::new(registration),
        }
    }

    /// Get the cell's observable ID.
    pub fn id(&self) -> CellId {
        self.inner.cell_id
    }

    /// Get the subscriber ID for this cell.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// If called within a tracked evaluation, this also registers the
    /// current computation as a dependent of this cell.
    pub fn get(&self) -> T {
        self.inner.get_value()
    }

    /// Get the current dirty state.
    pub fn state(&self) -> ComputedState {
        self.inner.current_state()
    }

    /// Check if the cell has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().expect("value lock poisoned").is_some()
    }

    /// Number of cells this computation read during its last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .dependencies
            .read()
            .expect("dependencies lock poisoned")
            .len()
    }

    /// Erase to a tracked computation, suitable for watching.
    pub fn as_tracked(&self) -> Arc<dyn Tracked> {
        self.inner.clone()
    }
}

impl<T> Observable<T> for Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn get(&self) -> T {
        Computed::get(self)
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _registration: Arc::clone(&self._registration),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.cell_id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}
