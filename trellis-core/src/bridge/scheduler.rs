//! Flush Scheduler
//!
//! The scheduler is the singleton that turns staleness notifications into
//! one coalesced flush per tick. It owns the UI thread's [`Watcher`]: the
//! first computation to go stale since the last flush defers exactly one
//! flush job onto the deferred queue; every further staleness notification
//! before that job runs is a no-op.
//!
//! The flush drains the pending computations in the order they became
//! pending and refreshes each one. A computation that goes stale *during*
//! the flush (a body writing a signal synchronously) lands in the pending
//! set and is picked up by the next flush, never re-entered recursively,
//! which bounds flush depth and keeps evaluation order predictable.
//!
//! # Lifecycle
//!
//! One scheduler per UI thread, initialized on first use, never torn down.
//! The cooperative model is single-threaded (see the crate docs): signals
//! may be shared across threads, but writes must happen on the thread that
//! pumps the deferred queue.
//!
//! # Failure Semantics
//!
//! Each pending computation refreshes under panic isolation: a panicking
//! body is logged and counted, and the remaining computations still run.
//! The manual [`flush`] entry point reports the aggregate as a
//! [`FlushError`]; the queue-driven flush logs it, since there is no caller
//! to surface it to.

use std::cell::OnceCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;

use crate::reactive::{SubscriberId, Tracked, Watcher};

use super::queue;

thread_local! {
    static WATCHER: OnceCell<Arc<Watcher>> = OnceCell::new();
}

fn with_watcher<R>(f: impl FnOnce(&Arc<Watcher>) -> R) -> R {
    WATCHER.with(|cell| {
        let watcher = cell.get_or_init(|| {
            Watcher::new(|| {
                queue::defer(|| {
                    if let Err(err) = flush() {
                        tracing::warn!(%err, "scheduled flush completed with failures");
                    }
                });
            })
        });
        f(watcher)
    })
}

/// One or more computations panicked during a flush.
#[derive(Debug, Error)]
#[error("flush failed for {failed} tracked computation(s)")]
pub struct FlushError {
    /// Number of computations whose refresh panicked.
    pub failed: usize,
}

/// Start watching a computation.
///
/// Once registered, staleness in the computation's dependency set schedules
/// a flush that will refresh it.
pub fn register_interest(computation: &Arc<dyn Tracked>) {
    with_watcher(|watcher| watcher.watch(computation));
}

/// Stop watching a computation.
///
/// The computation is removed from the pending set before this returns, so
/// a flush scheduled earlier in the tick will not touch it.
pub fn drop_interest(id: SubscriberId) {
    WATCHER.with(|cell| {
        if let Some(watcher) = cell.get() {
            watcher.unwatch(id);
        }
    });
}

/// Run one flush: refresh every pending computation, then re-arm.
///
/// Normally driven by the deferred queue; exposed for hosts that want to
/// force a synchronous flush and observe failures.
pub fn flush() -> Result<(), FlushError> {
    let pending = with_watcher(|watcher| watcher.take_pending());

    if !pending.is_empty() {
        tracing::trace!(count = pending.len(), "flushing tracked computations");
    }

    let mut failed = 0;
    for computation in pending {
        let id = computation.subscriber_id();
        if catch_unwind(AssertUnwindSafe(|| computation.refresh())).is_err() {
            failed += 1;
            tracing::error!(?id, "tracked computation panicked during flush");
        }
    }

    with_watcher(|watcher| watcher.rearm());

    if failed == 0 {
        Ok(())
    } else {
        Err(FlushError { failed })
    }
}

/// Number of computations currently pending on this thread's scheduler.
pub fn pending_count() -> usize {
    WATCHER.with(|cell| cell.get().map(|w| w.pending_count()).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Computed, Signal};
    use std::sync::atomic::{AtomicI32, Ordering};

    fn watch_computed<T>(computed: &Computed<T>)
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        register_interest(&computed.as_tracked());
    }

    #[test]
    fn staleness_defers_exactly_one_flush_job() {
        let signal = Signal::new(0);
        let computed = Computed::new({
            let signal = signal.clone();
            move || signal.get() + 1
        });
        let _ = computed.get();
        watch_computed(&computed);

        let before = queue::pending_jobs();
        signal.set(1);
        signal.set(2);
        signal.set(3);
        assert_eq!(queue::pending_jobs(), before + 1);

        queue::run_deferred();
        drop_interest(computed.subscriber_id());
    }

    #[test]
    fn flush_refreshes_pending_in_order() {
        let runs = Arc::new(AtomicI32::new(0));

        let signal = Signal::new(0);
        let computed = Computed::new({
            let signal = signal.clone();
            let runs = runs.clone();
            move || {
                runs.fetch_add(1, Ordering::SeqCst);
                signal.get() * 10
            }
        });
        let _ = computed.get();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        watch_computed(&computed);

        signal.set(7);
        queue::run_deferred();

        // Refreshed by the flush, so the read is already clean.
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(computed.get(), 70);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        drop_interest(computed.subscriber_id());
    }

    #[test]
    fn writes_during_flush_defer_to_next_flush() {
        let relay = Signal::new(0);
        let source = Signal::new(0);

        // First computation writes another signal while refreshing.
        let forwarder = Computed::new({
            let source = source.clone();
            let relay = relay.clone();
            move || {
                let v = source.get();
                if v > 0 {
                    relay.set(v * 100);
                }
                v
            }
        });
        let _ = forwarder.get();
        watch_computed(&forwarder);

        let sink = Computed::new({
            let relay = relay.clone();
            move || relay.get()
        });
        let _ = sink.get();
        watch_computed(&sink);

        source.set(2);
        // The first drain runs the first flush; the relay write re-arms a
        // second flush in the same drain.
        queue::run_deferred();

        assert_eq!(sink.get(), 200);
        assert_eq!(pending_count(), 0);

        drop_interest(forwarder.subscriber_id());
        drop_interest(sink.subscriber_id());
    }

    #[test]
    fn panicking_computation_does_not_starve_others() {
        let signal = Signal::new(0);

        let bomb = Computed::new({
            let signal = signal.clone();
            move || {
                if signal.get() > 0 {
                    panic!("boom");
                }
                0
            }
        });
        let _ = bomb.get();
        watch_computed(&bomb);

        let healthy = Computed::new({
            let signal = signal.clone();
            move || signal.get() + 1
        });
        let _ = healthy.get();
        watch_computed(&healthy);

        signal.set(5);
        let err = flush().expect_err("bomb should fail the flush");
        assert_eq!(err.failed, 1);

        // The healthy computation still refreshed.
        assert_eq!(healthy.get(), 6);

        drop_interest(bomb.subscriber_id());
        drop_interest(healthy.subscriber_id());
        queue::run_deferred();
    }

    #[test]
    fn drop_interest_removes_pending_synchronously() {
        let signal = Signal::new(0);
        let computed = Computed::new({
            let signal = signal.clone();
            move || signal.get()
        });
        let _ = computed.get();
        watch_computed(&computed);

        signal.set(1);
        assert_eq!(pending_count(), 1);

        drop_interest(computed.subscriber_id());
        assert_eq!(pending_count(), 0);

        // The already-deferred flush finds nothing to do.
        queue::run_deferred();
        assert_eq!(pending_count(), 0);
    }
}
