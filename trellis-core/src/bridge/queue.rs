//! Deferred Job Queue
//!
//! Rust has no ambient microtask queue, so the host event loop's microtask
//! checkpoint is modeled as a thread-local FIFO of jobs. The scheduler
//! defers its flush here, and the host runtime defers instance re-renders
//! here; the embedding event loop (or a test) pumps the queue once per tick
//! with [`run_deferred`].
//!
//! Jobs enqueued while the queue is draining run in the same drain, which
//! matches how a microtask checkpoint processes the queue to exhaustion
//! before yielding.

use std::cell::RefCell;
use std::collections::VecDeque;

/// A deferred unit of work.
pub type Job = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Job>> = RefCell::new(VecDeque::new());
}

/// Enqueue a job to run at the next [`run_deferred`] checkpoint.
pub fn defer<F>(job: F)
where
    F: FnOnce() + 'static,
{
    QUEUE.with(|queue| {
        queue.borrow_mut().push_back(Box::new(job));
    });
}

/// Run deferred jobs until the queue is empty.
///
/// Returns the number of jobs that ran. Jobs are popped one at a time so a
/// running job can safely enqueue more work.
pub fn run_deferred() -> usize {
    let mut ran = 0;

    loop {
        let job = QUEUE.with(|queue| queue.borrow_mut().pop_front());
        match job {
            Some(job) => {
                job();
                ran += 1;
            }
            None => break,
        }
    }

    if ran > 0 {
        tracing::trace!(jobs = ran, "drained deferred queue");
    }
    ran
}

/// Number of jobs currently queued on this thread.
pub fn pending_jobs() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn runs_jobs_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        defer(move || l.borrow_mut().push(1));
        let l = log.clone();
        defer(move || l.borrow_mut().push(2));

        assert_eq!(run_deferred(), 2);
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn jobs_enqueued_while_draining_run_in_same_drain() {
        let count = Rc::new(Cell::new(0));

        let c = count.clone();
        defer(move || {
            c.set(c.get() + 1);
            let c2 = c.clone();
            defer(move || c2.set(c2.get() + 1));
        });

        assert_eq!(run_deferred(), 2);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn empty_queue_drains_to_zero() {
        assert_eq!(run_deferred(), 0);
        assert_eq!(pending_jobs(), 0);
    }
}
