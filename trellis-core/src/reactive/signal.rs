//! Signal Implementation
//!
//! A Signal is the mutable state cell. It holds a value and participates in
//! dependency tracking through the runtime.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a tracked evaluation (a computed value's
//!    recomputation or an effect adapter's body), the signal registers that
//!    evaluation as a dependent.
//!
//! 2. When a signal's value changes, the runtime marks all dependents stale.
//!
//! 3. Staleness reaches the scheduler through watched computations; nothing
//!    recomputes until it is pulled or flushed.
//!
//! # Thread Safety
//!
//! Signals are thread-safe: the value lives behind an `RwLock` and can be
//! shared across threads. Writes must still happen on the thread that pumps
//! the deferred queue for their staleness to be flushed there.

use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use super::context::TrackingContext;
use super::ids::CellId;
use super::runtime;
use super::Observable;

/// A reactive state cell holding a value of type T.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (marks dependents stale)
/// count.set(5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique identifier for this signal.
    id: CellId,

    /// The current value, protected by RwLock for thread safety.
    value: Arc<RwLock<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: CellId::new(),
            value: Arc::new(RwLock::new(value)),
        }
    }

    /// Get the signal's cell ID.
    pub fn id(&self) -> CellId {
        self.id
    }

    /// Get the current value.
    ///
    /// If called within a tracked evaluation, this also registers the
    /// current computation as a dependent.
    pub fn get(&self) -> T {
        if TrackingContext::is_active() {
            TrackingContext::record_read(self.id);

            if let Some(subscriber_id) = TrackingContext::current_subscriber() {
                runtime::add_dependency(self.id, subscriber_id);
            }
        }

        self.value.read().expect("value lock poisoned").clone()
    }

    /// Get the current value without tracking dependencies.
    ///
    /// Use this when you need to read the value without establishing
    /// a reactive dependency.
    pub fn get_untracked(&self) -> T {
        self.value.read().expect("value lock poisoned").clone()
    }

    /// Set a new value and mark dependents stale.
    ///
    /// The write itself is synchronous; dependent re-evaluation is deferred
    /// to the next flush.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.value.write().expect("value lock poisoned");
            *guard = value;
        }

        runtime::notify_cell_changed(self.id);
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read().expect("value lock poisoned");
            f(&guard)
        };
        self.set(new_value);
    }
}

impl<T> Observable<T> for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Signal::get(self)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("dependent_count", &runtime::dependent_count(self.id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ids::SubscriberId;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn tracked_read_registers_dependency() {
        let signal = Signal::new(0);
        let subscriber = SubscriberId::new();

        {
            let _ctx = TrackingContext::enter(subscriber);
            let _ = signal.get();
        }

        assert_eq!(runtime::dependent_count(signal.id()), 1);
        runtime::clear_dependencies(subscriber);
    }

    #[test]
    fn untracked_read_registers_nothing() {
        let signal = Signal::new(0);
        let subscriber = SubscriberId::new();

        {
            let _ctx = TrackingContext::enter(subscriber);
            let _ = signal.get_untracked();
        }

        assert_eq!(runtime::dependent_count(signal.id()), 0);
    }

    #[test]
    fn read_outside_context_registers_nothing() {
        let signal = Signal::new(7);
        let _ = signal.get();

        assert_eq!(runtime::dependent_count(signal.id()), 0);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        let s3 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }
}
