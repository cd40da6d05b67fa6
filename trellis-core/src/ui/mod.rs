//! UI Surface
//!
//! Everything the bridge exposes to component code:
//!
//! - `props`: the nominal prop value variants and the classifier that
//!   partitions a prop bag into observable / lazy / plain.
//! - `node`: the immutable tree description a render produces.
//! - `host`: the minimal retained component runtime (components, hook
//!   scope, mounting, reconciliation).
//! - `notifiable`: the wrapper that keeps observable and lazy props
//!   synchronized while re-rendering only its own instance.
//! - `tags`: the primitive tag set, raw and pre-wrapped.

pub mod host;
pub mod node;
pub mod notifiable;
pub mod props;
pub mod tags;

pub use host::{mount, Component, HostError, Scope, SetState, TrackedSource, Tree};
pub use node::{Element, Node};
pub use notifiable::{wrap, wrap_with, RenderStrategy};
pub use props::{
    classify, is_event_key, resolve, EventHandler, LazyRef, ObservableRef, PropKind, PropValue,
    Props, Value, EVENT_PREFIX, KEY_PROP,
};
pub use tags::{element, notifiable_tag, CHILDREN_PROP, TAG_NAMES};
