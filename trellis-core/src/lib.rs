//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis observable-to-UI
//! bridge. It implements:
//!
//! - Observable primitives (signals, computed values) with automatic
//!   dependency tracking
//! - A coalescing flush scheduler that batches observable changes into one
//!   pass per tick
//! - An effect adapter with cleanup semantics, driven by the scheduler
//! - A prop classifier and the notifiable wrapper that let components
//!   accept static values, lazy producers, or observable cells for any prop
//!   and stay synchronized
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - `reactive`: signals, computed values, dependency tracking, and the
//!   watcher surface the scheduler subscribes through
//! - `bridge`: the deferred queue, the flush scheduler, and the effect
//!   adapter
//! - `ui`: the prop classifier, the host component runtime, the notifiable
//!   wrapper, and the tag-bound component registries
//!
//! # Update Model
//!
//! A write to a signal is synchronous and marks the downstream cone stale;
//! re-evaluation is deferred to the next pump of the deferred queue, so any
//! number of synchronous writes in one tick coalesce into a single flush
//! that observes only the final combined state. A wrapped component's
//! adapter is one such tracked computation: when it re-resolves to a new
//! value, only that wrapper instance re-renders, never the component that
//! constructed it.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::reactive::Signal;
//! use trellis_core::ui::{mount, PropValue, Props};
//! use trellis_core::tags::notifiable;
//! use trellis_core::bridge::run_deferred;
//!
//! let count = Signal::new(0);
//!
//! let mut props = Props::new();
//! props.insert("children".into(), PropValue::observable(&count));
//!
//! let tree = mount(&notifiable::div(), props);
//! assert_eq!(tree.node().text_content(), "0");
//!
//! count.set(1);
//! run_deferred();
//! assert_eq!(tree.node().text_content(), "1");
//! ```

pub mod bridge;
pub mod reactive;
pub mod ui;

pub use bridge::{bind_effect, flush, run_deferred, Cleanup, EffectBinding, FlushError};
pub use reactive::{Computed, Observable, Signal, Tracked, Watcher};
pub use ui::tags;
pub use ui::{
    classify, mount, wrap, wrap_with, Component, Node, PropKind, PropValue, Props, RenderStrategy,
    Scope, Tree, Value,
};
