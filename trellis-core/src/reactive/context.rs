//! Tracking Context
//!
//! The tracking context records which computation is currently evaluating.
//! This enables automatic dependency tracking: when a cell is read, we can
//! register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a tracked evaluation (recomputing a derived cell, running an
//! effect adapter body), we push the subscriber onto the stack. When the
//! evaluation completes, we pop it.
//!
//! This design supports nested tracked evaluations (a derived cell that reads
//! from another derived cell).
//!
//! # Invariant
//!
//! Reading a cell outside of any tracked evaluation never registers a
//! dependency; reading one inside a tracked evaluation always does.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::ids::{CellId, SubscriberId};

/// The tracking context stack.
///
/// Each thread has its own stack to track which computation is evaluating.
/// This thread-local approach avoids the need for synchronization in the
/// common case of single-threaded reactivity.
thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

/// An entry in the tracking context stack.
#[derive(Debug)]
struct Frame {
    /// The subscriber ID of the evaluating computation.
    subscriber_id: SubscriberId,
    /// Cells read during this evaluation, in read order.
    reads: SmallVec<[CellId; 8]>,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if the
/// evaluation panics.
pub struct TrackingContext {
    subscriber_id: SubscriberId,
}

impl TrackingContext {
    /// Enter a tracked evaluation for the given subscriber.
    ///
    /// While this context is active, any cells that are read will register
    /// the subscriber as a dependent.
    ///
    /// The context is automatically exited when the returned guard is dropped.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                subscriber_id,
                reads: SmallVec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if there is an active tracked evaluation on this thread.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the subscriber ID of the innermost tracked evaluation, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|frame| frame.subscriber_id))
    }

    /// Record a read of the given cell.
    ///
    /// This is called by cells when they are read inside a tracked evaluation.
    pub fn record_read(cell_id: CellId) {
        CONTEXT_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                if !frame.reads.contains(&cell_id) {
                    frame.reads.push(cell_id);
                }
            }
        });
    }

    /// Get the cells read so far in the innermost tracked evaluation.
    pub fn current_reads() -> SmallVec<[CellId; 8]> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|frame| frame.reads.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for TrackingContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Verify we're popping the right context.
            // This helps catch bugs where contexts are mismatched.
            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.subscriber_id, self.subscriber_id,
                    "TrackingContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, frame.subscriber_id
                );
            }
        });
    }
}
