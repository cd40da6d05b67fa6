//! Prop Values and Classification
//!
//! Components take a dynamic prop bag. Each entry is one of four nominal
//! variants: an observable reference (re-resolved when the underlying cell
//! changes), a lazy producer (re-invoked on every tracked re-resolution), a
//! plain value, or an event handler (consumed by reference, never by
//! value).
//!
//! The classifier partitions a bag by kind. Two key-level rules override
//! the variant, and are checked first:
//!
//! - keys with the reserved event prefix (`on`) are always Plain, whatever
//!   their variant, so callback slots are passed through untouched;
//! - the `key` prop (host list identity) is always Plain, so it can never
//!   become a tracked dependency.
//!
//! Every key lands in exactly one partition.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::reactive::Observable;

/// Dynamic prop value payload.
pub type Value = serde_json::Value;

/// Event handler payload: invoked with the event value, consumed by
/// reference.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Reserved prefix marking event-callback prop keys.
pub const EVENT_PREFIX: &str = "on";

/// Prop key carrying host list identity; never tracked.
pub const KEY_PROP: &str = "key";

/// Whether a prop key names an event-callback slot.
pub fn is_event_key(key: &str) -> bool {
    key.starts_with(EVENT_PREFIX)
}

/// An erased reference to an observable cell.
///
/// Constructible only from [`Observable`] implementors, so a prop can only
/// be observable on purpose; there is no shape probing.
#[derive(Clone)]
pub struct ObservableRef {
    read: Arc<dyn Fn() -> Value + Send + Sync>,
}

impl ObservableRef {
    /// Erase an observable cell into a prop reference.
    pub fn new<T, O>(source: &O) -> Self
    where
        O: Observable<T> + Clone + Send + Sync + 'static,
        T: Into<Value>,
    {
        let source = source.clone();
        Self {
            read: Arc::new(move || source.get().into()),
        }
    }

    /// Read the current value.
    ///
    /// Tracked when called inside a tracked evaluation, plain otherwise.
    /// The cell itself decides, exactly as a direct `get` would.
    pub fn read(&self) -> Value {
        (self.read)()
    }
}

impl std::fmt::Debug for ObservableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableRef").finish_non_exhaustive()
    }
}

/// A zero-argument producer for a prop value.
///
/// Has no subscription of its own: it becomes dependency-tracked only by
/// being invoked inside a tracked evaluation, so it must be re-invoked on
/// every re-resolution, never cached.
#[derive(Clone)]
pub struct LazyRef {
    eval: Arc<dyn Fn() -> Value + Send + Sync>,
}

impl LazyRef {
    /// Wrap a producer closure.
    pub fn new<F, T>(eval: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        Self {
            eval: Arc::new(move || eval().into()),
        }
    }

    /// Invoke the producer.
    pub fn call(&self) -> Value {
        (self.eval)()
    }
}

impl std::fmt::Debug for LazyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyRef").finish_non_exhaustive()
    }
}

/// One prop entry.
#[derive(Clone)]
pub enum PropValue {
    /// Reference to an observable cell; re-resolved on change.
    Observable(ObservableRef),

    /// Zero-argument producer; re-invoked on every tracked resolution.
    Lazy(LazyRef),

    /// Plain value, used as-is.
    Value(Value),

    /// Event handler, consumed by reference.
    Handler(EventHandler),
}

impl PropValue {
    /// Erase an observable cell into a prop entry.
    pub fn observable<T, O>(source: &O) -> Self
    where
        O: Observable<T> + Clone + Send + Sync + 'static,
        T: Into<Value>,
    {
        Self::Observable(ObservableRef::new(source))
    }

    /// Wrap a producer closure into a prop entry.
    pub fn lazy<F, T>(eval: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        Self::Lazy(LazyRef::new(eval))
    }

    /// Wrap a plain value into a prop entry.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Wrap an event handler into a prop entry.
    pub fn handler<F>(handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self::Handler(Arc::new(handler))
    }

    /// The plain value, if this entry is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The handler, if this entry is one.
    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            Self::Handler(handler) => Some(handler),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    /// Plain values compare structurally; the reference variants compare by
    /// identity, which is what host reconciliation needs.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Observable(a), Self::Observable(b)) => Arc::ptr_eq(&a.read, &b.read),
            (Self::Lazy(a), Self::Lazy(b)) => Arc::ptr_eq(&a.eval, &b.eval),
            (Self::Handler(a), Self::Handler(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for PropValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Observable(_) => f.write_str("Observable(..)"),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
            Self::Value(value) => write!(f, "Value({value})"),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// An ordered prop bag.
pub type Props = IndexMap<String, PropValue>;

/// The three disjoint prop partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropKind {
    /// Observable-valued props, re-resolved when their cell changes.
    Observable,

    /// Lazy-function-valued props, re-invoked on every resolution.
    Lazy,

    /// Everything else: plain values, handlers, and any entry under an
    /// event-prefixed key or the `key` prop.
    Plain,
}

fn kind_of(key: &str, value: &PropValue) -> PropKind {
    // Key-level overrides are absolute and checked first.
    if is_event_key(key) || key == KEY_PROP {
        return PropKind::Plain;
    }

    match value {
        PropValue::Observable(_) => PropKind::Observable,
        PropValue::Lazy(_) => PropKind::Lazy,
        PropValue::Value(_) | PropValue::Handler(_) => PropKind::Plain,
    }
}

/// Partition a prop bag, keeping the entries of the requested kind.
///
/// The three partitions of a bag are disjoint and cover every key exactly
/// once. Entry order follows the input bag.
pub fn classify(props: &Props, kind: PropKind) -> Props {
    props
        .iter()
        .filter(|(key, value)| kind_of(key, value) == kind)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Resolve a partition to current values.
///
/// Observable entries are read, lazy entries are invoked, tracked if the
/// caller is inside a tracked evaluation. Plain values pass through;
/// handlers resolve to null (they are consumed by reference, never by
/// value, and never appear in the partitions this is called on).
pub fn resolve(partition: &Props) -> IndexMap<String, Value> {
    partition
        .iter()
        .map(|(key, value)| {
            let resolved = match value {
                PropValue::Observable(cell) => cell.read(),
                PropValue::Lazy(producer) => producer.call(),
                PropValue::Value(value) => value.clone(),
                PropValue::Handler(_) => Value::Null,
            };
            (key.clone(), resolved)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use serde_json::json;

    fn sample_props() -> (Props, Signal<i64>) {
        let count = Signal::new(3);

        let mut props = Props::new();
        props.insert("children".into(), PropValue::observable(&count));
        props.insert("title".into(), PropValue::lazy(|| "hello"));
        props.insert("class".into(), PropValue::value("box"));
        props.insert("onClick".into(), PropValue::handler(|_| {}));
        props.insert("key".into(), PropValue::value(7));

        (props, count)
    }

    #[test]
    fn partitions_cover_every_key_exactly_once() {
        let (props, _count) = sample_props();

        let observable = classify(&props, PropKind::Observable);
        let lazy = classify(&props, PropKind::Lazy);
        let plain = classify(&props, PropKind::Plain);

        assert_eq!(observable.len() + lazy.len() + plain.len(), props.len());

        for key in props.keys() {
            let hits = [&observable, &lazy, &plain]
                .iter()
                .filter(|partition| partition.contains_key(key))
                .count();
            assert_eq!(hits, 1, "key {key} must land in exactly one partition");
        }
    }

    #[test]
    fn classifies_by_variant() {
        let (props, _count) = sample_props();

        assert_eq!(
            classify(&props, PropKind::Observable)
                .keys()
                .collect::<Vec<_>>(),
            vec!["children"]
        );
        assert_eq!(
            classify(&props, PropKind::Lazy).keys().collect::<Vec<_>>(),
            vec!["title"]
        );
        assert_eq!(
            classify(&props, PropKind::Plain).keys().collect::<Vec<_>>(),
            vec!["class", "onClick", "key"]
        );
    }

    #[test]
    fn event_keys_are_plain_whatever_their_variant() {
        let count = Signal::new(0);

        let mut props = Props::new();
        props.insert("onChange".into(), PropValue::observable(&count));
        props.insert("onInput".into(), PropValue::lazy(|| 1));
        props.insert("onClick".into(), PropValue::handler(|_| {}));

        assert!(classify(&props, PropKind::Observable).is_empty());
        assert!(classify(&props, PropKind::Lazy).is_empty());
        assert_eq!(classify(&props, PropKind::Plain).len(), 3);
    }

    #[test]
    fn key_prop_is_plain_whatever_its_variant() {
        let count = Signal::new(0);

        let mut props = Props::new();
        props.insert("key".into(), PropValue::observable(&count));

        assert!(classify(&props, PropKind::Observable).is_empty());
        assert_eq!(classify(&props, PropKind::Plain).len(), 1);
    }

    #[test]
    fn resolve_reads_observables_and_invokes_lazies() {
        let (props, count) = sample_props();

        let observable = resolve(&classify(&props, PropKind::Observable));
        assert_eq!(observable["children"], json!(3));

        count.set(9);
        let observable = resolve(&classify(&props, PropKind::Observable));
        assert_eq!(observable["children"], json!(9));

        let lazy = resolve(&classify(&props, PropKind::Lazy));
        assert_eq!(lazy["title"], json!("hello"));
    }

    #[test]
    fn resolve_outside_tracked_context_registers_nothing() {
        let probe = Signal::new(0);
        let mut props = Props::new();
        props.insert("x".into(), PropValue::observable(&probe));

        let _ = resolve(&classify(&props, PropKind::Observable));

        // No tracked evaluation was active, so the signal has no dependents.
        assert!(
            format!("{probe:?}").contains("dependent_count: 0"),
            "untracked resolution must not register dependencies"
        );
    }

    #[test]
    fn prop_value_equality() {
        let a = PropValue::value(1);
        let b = PropValue::value(1);
        let c = PropValue::value(2);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let h1 = PropValue::handler(|_| {});
        let h2 = h1.clone();
        let h3 = PropValue::handler(|_| {});
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
    }
}
