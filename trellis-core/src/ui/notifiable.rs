//! Notifiable Wrapper
//!
//! [`wrap`] turns any host component into a version whose observable- and
//! lazy-valued props stay synchronized with the observable graph, while the
//! component that constructed it never re-renders on their account.
//!
//! # How the Wrapper Works
//!
//! On each render of the wrapped component:
//!
//! 1. Plain props are re-classified from the incoming bag directly; they
//!    are never tracked.
//! 2. On first mount, observable and lazy props are resolved once
//!    (untracked) to seed local render state.
//! 3. One effect adapter per prop kind is bound on mount. Each re-run
//!    re-classifies and re-resolves from the props of the latest render and
//!    pushes the result into local state only when it changed. The kinds
//!    stay separate because lazy props have no subscription of their own:
//!    they must be re-invoked inside the adapter body on every run, never
//!    cached.
//! 4. Plain and resolved props merge, in original key order, into the bag
//!    the host component receives.
//! 5. Unmount unbinds both adapters.
//!
//! A change to an observable prop's cell therefore re-renders exactly one
//! wrapper instance: never the parent that constructed it, never siblings.
//!
//! # Render Strategies
//!
//! [`RenderStrategy::Element`] (default) emits a child element for the host
//! component, giving it its own instance. [`RenderStrategy::Call`] invokes
//! the host render function directly, skipping one reconciliation layer,
//! an optimization for simple element-producing functions that hold no
//! hook state of their own.

use indexmap::IndexMap;

use crate::bridge::{bind_effect, Cleanup};

use super::host::Component;
use super::node::Node;
use super::props::{classify, resolve, PropKind, PropValue, Props, Value};

/// How a wrapped component hands off to its host component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderStrategy {
    /// Construct a child element for the host component.
    #[default]
    Element,

    /// Call the host component function directly and return its output.
    ///
    /// Only for host components that use no hook state: the call shares the
    /// wrapper's scope.
    Call,
}

/// Wrap a host component with the default element strategy.
pub fn wrap(host: &Component) -> Component {
    wrap_with(host, RenderStrategy::Element)
}

/// Wrap a host component with an explicit render strategy.
pub fn wrap_with(host: &Component, strategy: RenderStrategy) -> Component {
    let host = host.clone();
    let name = format!("notifiable({})", host.name());

    Component::new(name, move |scope, props| {
        let plain = classify(props, PropKind::Plain);

        // Effect bodies re-classify from the props of the latest render,
        // not the mount-time ones.
        let latest = scope.use_ref(|| props.clone());
        *latest.write() = props.clone();

        let (resolved_observable, set_observable) =
            scope.use_state(|| resolve(&classify(props, PropKind::Observable)));
        let (resolved_lazy, set_lazy) =
            scope.use_state(|| resolve(&classify(props, PropKind::Lazy)));

        {
            let latest = latest.clone();
            scope.use_effect(move || {
                let binding = bind_effect(move || {
                    let current = resolve(&classify(&latest.read(), PropKind::Observable));
                    set_observable.set_if_changed(current);
                    None
                });
                Some(Box::new(move || binding.unbind()) as Cleanup)
            });
        }

        {
            let latest = latest.clone();
            scope.use_effect(move || {
                let binding = bind_effect(move || {
                    let current = resolve(&classify(&latest.read(), PropKind::Lazy));
                    set_lazy.set_if_changed(current);
                    None
                });
                Some(Box::new(move || binding.unbind()) as Cleanup)
            });
        }

        let merged = merge_resolved(props, &plain, &resolved_observable, &resolved_lazy);

        match strategy {
            RenderStrategy::Element => Node::component(&host, merged),
            RenderStrategy::Call => host.call(scope, &merged),
        }
    })
}

/// Merge the plain partition with the resolved observable/lazy values, in
/// original key order.
fn merge_resolved(
    original: &Props,
    plain: &Props,
    observable: &IndexMap<String, Value>,
    lazy: &IndexMap<String, Value>,
) -> Props {
    let mut merged = Props::with_capacity(original.len());

    for key in original.keys() {
        if let Some(value) = plain.get(key) {
            merged.insert(key.clone(), value.clone());
        } else if let Some(value) = observable.get(key) {
            merged.insert(key.clone(), PropValue::Value(value.clone()));
        } else if let Some(value) = lazy.get(key) {
            merged.insert(key.clone(), PropValue::Value(value.clone()));
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::queue;
    use crate::reactive::{Computed, Signal};
    use crate::ui::host::mount;
    use serde_json::json;

    /// Host component that renders its merged props as JSON text.
    fn probe_component() -> Component {
        Component::new("probe", |_scope, props| {
            let rendered: serde_json::Map<String, Value> = props
                .iter()
                .filter_map(|(key, value)| {
                    value.as_value().map(|v| (key.clone(), v.clone()))
                })
                .collect();
            Node::text(serde_json::to_string(&Value::Object(rendered)).unwrap())
        })
    }

    fn rendered_json(tree: &crate::ui::host::Tree) -> Value {
        serde_json::from_str(&tree.node().text_content()).unwrap()
    }

    #[test]
    fn observable_props_update_after_flush() {
        let count = Signal::new(1_i64);

        let mut props = Props::new();
        props.insert("count".into(), PropValue::observable(&count));
        props.insert("label".into(), PropValue::value("static"));

        let wrapped = wrap(&probe_component());
        let tree = mount(&wrapped, props);

        assert_eq!(rendered_json(&tree), json!({"count": 1, "label": "static"}));

        count.set(2);
        queue::run_deferred();
        assert_eq!(rendered_json(&tree), json!({"count": 2, "label": "static"}));
    }

    #[test]
    fn lazy_props_reresolve_when_their_reads_change() {
        let base = Signal::new(10_i64);

        let mut props = Props::new();
        props.insert(
            "total".into(),
            PropValue::lazy({
                let base = base.clone();
                move || base.get() * 2
            }),
        );

        let wrapped = wrap(&probe_component());
        let tree = mount(&wrapped, props);
        assert_eq!(rendered_json(&tree), json!({"total": 20}));

        // The lazy producer reads `base` inside the adapter body, so the
        // write re-resolves it.
        base.set(25);
        queue::run_deferred();
        assert_eq!(rendered_json(&tree), json!({"total": 50}));
    }

    #[test]
    fn derived_cells_work_as_observable_props() {
        let count = Signal::new(2_i64);
        let doubled = Computed::new({
            let count = count.clone();
            move || count.get() * 2
        });

        let mut props = Props::new();
        props.insert("doubled".into(), PropValue::observable(&doubled));

        let wrapped = wrap(&probe_component());
        let tree = mount(&wrapped, props);
        assert_eq!(rendered_json(&tree), json!({"doubled": 4}));

        count.set(5);
        queue::run_deferred();
        assert_eq!(rendered_json(&tree), json!({"doubled": 10}));
    }

    #[test]
    fn wrapper_rerenders_but_parent_does_not() {
        let count = Signal::new(0_i64);

        let wrapped = wrap(&probe_component());
        let parent = {
            let wrapped = wrapped.clone();
            let count = count.clone();
            Component::new("owner", move |_scope, _props| {
                let mut props = Props::new();
                props.insert("count".into(), PropValue::observable(&count));
                Node::component(&wrapped, props)
            })
        };

        let tree = mount(&parent, Props::new());
        let before = tree.render_counts();
        assert_eq!(before[0], ("owner".to_string(), 1));

        count.set(1);
        count.set(2);
        queue::run_deferred();

        let after = tree.render_counts();
        assert_eq!(after[0], ("owner".to_string(), 1), "parent must not re-render");
        assert_eq!(
            after[1].1,
            before[1].1 + 1,
            "wrapper re-renders exactly once per flush"
        );
        assert_eq!(rendered_json(&tree), json!({"count": 2}));
    }

    #[test]
    fn unchanged_resolution_does_not_rerender() {
        let count = Signal::new(5_i64);

        let mut props = Props::new();
        props.insert("count".into(), PropValue::observable(&count));

        let wrapped = wrap(&probe_component());
        let tree = mount(&wrapped, props);
        let before = tree.render_counts();

        // Same value written again: adapter re-runs, state push is gated.
        count.set(5);
        queue::run_deferred();

        assert_eq!(tree.render_counts(), before);
    }

    #[test]
    fn unmount_unbinds_the_adapters() {
        let count = Signal::new(0_i64);

        let mut props = Props::new();
        props.insert("count".into(), PropValue::observable(&count));

        let wrapped = wrap(&probe_component());
        let tree = mount(&wrapped, props);
        tree.unmount();

        // Writes after unmount find no live adapter; the flush touches
        // nothing torn down.
        count.set(9);
        queue::run_deferred();
        assert_eq!(crate::bridge::scheduler::pending_count(), 0);
    }

    #[test]
    fn handlers_pass_through_untouched() {
        use std::sync::atomic::{AtomicI32, Ordering};
        use std::sync::Arc;

        let clicks = Arc::new(AtomicI32::new(0));
        let clicks_clone = clicks.clone();

        let mut props = Props::new();
        props.insert(
            "onClick".into(),
            PropValue::handler(move |_| {
                clicks_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let host = Component::new("clicky", |_scope, props| {
            // The handler arrives as a handler, not a resolved value.
            let handler = props["onClick"].as_handler().expect("handler prop").clone();
            let mut element = crate::ui::node::Element::new("button");
            element.handlers.insert("onClick".into(), handler);
            Node::Element(element)
        });

        let tree = mount(&wrap(&host), props);

        if let Node::Element(element) = tree.node() {
            (element.handlers["onClick"])(&json!(null));
        } else {
            panic!("expected element output");
        }
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn call_strategy_skips_the_extra_instance() {
        let count = Signal::new(3_i64);

        let mut props = Props::new();
        props.insert("count".into(), PropValue::observable(&count));

        let wrapped = wrap_with(&probe_component(), RenderStrategy::Call);
        let tree = mount(&wrapped, props);

        // One instance total: the wrapper called the host directly.
        assert_eq!(tree.render_counts().len(), 1);
        assert_eq!(rendered_json(&tree), json!({"count": 3}));

        count.set(4);
        queue::run_deferred();
        assert_eq!(rendered_json(&tree), json!({"count": 4}));
    }
}
