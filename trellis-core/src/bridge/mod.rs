//! The Bridge
//!
//! This module connects the observable graph to a host that owns its own
//! scheduling:
//!
//! - `queue`: the thread-local deferred job queue standing in for the host
//!   event loop's microtask checkpoint.
//! - `scheduler`: the per-UI-thread singleton that coalesces staleness into
//!   one flush per tick.
//! - `effect`: the adapter that turns a callback-with-cleanup into a
//!   tracked computation driven by the scheduler.
//!
//! Writes are synchronous; everything downstream of a write is deferred.
//! Multiple synchronous writes in one tick coalesce into a single flush, so
//! tracked computations only ever observe the final combined state of a
//! synchronous block.

pub mod effect;
pub mod queue;
pub mod scheduler;

pub use effect::{bind_effect, Cleanup, EffectBinding};
pub use queue::{defer, run_deferred};
pub use scheduler::{flush, FlushError};
