//! Tag-Bound Components
//!
//! The closed set of primitive element tags, as raw components and as
//! ready-made notifiable versions. Both registries are memoized: repeated
//! lookups return the identical component, which the reconciler relies on
//! to treat a tag as a stable component type across renders.
//!
//! A raw tag component renders one [`Element`] from its merged props:
//! `children` becomes child nodes, event-prefixed handler props become
//! element handlers, `key` is consumed by reconciliation and dropped, and
//! everything else becomes an attribute. Observable or lazy entries reaching
//! a raw tag are resolved once, untracked; wrap the tag (as the
//! [`notifiable`] registry does) to keep them live.

use std::collections::HashMap;
use std::sync::OnceLock;

use super::host::{Component, HostError};
use super::node::{Element, Node};
use super::notifiable::wrap;
use super::props::{is_event_key, PropValue, Value, KEY_PROP};

/// Prop key whose value renders as child nodes.
pub const CHILDREN_PROP: &str = "children";

macro_rules! primitive_tags {
    ($($tag:ident),* $(,)?) => {
        /// The closed set of primitive element tag names.
        pub const TAG_NAMES: &[&str] = &[$(stringify!($tag)),*];

        /// Ready-made notifiable element components, one per primitive tag.
        ///
        /// Every accessor returns the same memoized wrapped component on
        /// every call.
        pub mod notifiable {
            use super::Component;

            pub use super::notifiable_tag as tag;

            $(
                /// The notifiable component for this tag.
                pub fn $tag() -> Component {
                    super::notifiable_tag(stringify!($tag))
                        .expect("primitive tag registered")
                }
            )*
        }
    };
}

primitive_tags![
    a, article, aside, audio, br, button, canvas, code, div, em, footer, form, h1, h2, h3, h4,
    h5, h6, header, hr, iframe, img, input, label, li, main, nav, ol, option, p, pre, section,
    select, span, strong, table, tbody, td, textarea, th, thead, tr, ul, video,
];

/// Convert a `children` prop value into child nodes.
fn children_from_value(value: &Value) -> Vec<Node> {
    match value {
        Value::Null => Vec::new(),
        Value::String(text) => vec![Node::text(text.clone())],
        Value::Array(items) => items.iter().flat_map(children_from_value).collect(),
        other => vec![Node::text(other.to_string())],
    }
}

fn build_tag_component(tag: &'static str) -> Component {
    Component::new(tag, move |_scope, props| {
        let mut element = Element::new(tag);

        for (key, value) in props {
            if key.as_str() == KEY_PROP {
                continue;
            }

            let resolved = match value {
                PropValue::Handler(handler) => {
                    if is_event_key(key) {
                        element.handlers.insert(key.clone(), handler.clone());
                    }
                    None
                }
                PropValue::Value(value) => Some(value.clone()),
                // One-shot resolution; liveness comes from wrapping.
                PropValue::Observable(cell) => Some(cell.read()),
                PropValue::Lazy(producer) => Some(producer.call()),
            };

            if let Some(value) = resolved {
                if key.as_str() == CHILDREN_PROP {
                    element.children = children_from_value(&value);
                } else {
                    element.attrs.insert(key.clone(), value);
                }
            }
        }

        Node::Element(element)
    })
}

fn raw_registry() -> &'static HashMap<&'static str, Component> {
    static RAW: OnceLock<HashMap<&'static str, Component>> = OnceLock::new();
    RAW.get_or_init(|| {
        TAG_NAMES
            .iter()
            .map(|tag| (*tag, build_tag_component(tag)))
            .collect()
    })
}

fn notifiable_registry() -> &'static HashMap<&'static str, Component> {
    static NOTIFIABLE: OnceLock<HashMap<&'static str, Component>> = OnceLock::new();
    NOTIFIABLE.get_or_init(|| {
        raw_registry()
            .iter()
            .map(|(tag, component)| (*tag, wrap(component)))
            .collect()
    })
}

/// Look up the raw (non-notifiable) component for a primitive tag.
pub fn element(tag: &str) -> Result<Component, HostError> {
    raw_registry()
        .get(tag)
        .cloned()
        .ok_or_else(|| HostError::UnknownTag(tag.to_string()))
}

/// Look up the notifiable component for a primitive tag.
pub fn notifiable_tag(tag: &str) -> Result<Component, HostError> {
    notifiable_registry()
        .get(tag)
        .cloned()
        .ok_or_else(|| HostError::UnknownTag(tag.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::host::mount;
    use crate::ui::props::Props;
    use serde_json::json;

    #[test]
    fn repeated_access_returns_the_same_component() {
        assert!(notifiable::div().same_identity(&notifiable::div()));
        assert!(notifiable::tag("input")
            .unwrap()
            .same_identity(&notifiable::input()));
        assert!(element("div").unwrap().same_identity(&element("div").unwrap()));

        // Raw and wrapped are distinct component types.
        assert!(!element("div").unwrap().same_identity(&notifiable::div()));
    }

    #[test]
    fn unknown_tag_is_an_error() {
        assert!(matches!(
            element("blink"),
            Err(HostError::UnknownTag(tag)) if tag == "blink"
        ));
        assert!(notifiable_tag("marquee").is_err());
    }

    #[test]
    fn tag_component_renders_attrs_children_and_handlers() {
        use std::sync::atomic::{AtomicI32, Ordering};
        use std::sync::Arc;

        let clicks = Arc::new(AtomicI32::new(0));
        let clicks_clone = clicks.clone();

        let mut props = Props::new();
        props.insert("class".into(), PropValue::value("chip"));
        props.insert("children".into(), PropValue::value("press"));
        props.insert("key".into(), PropValue::value("k1"));
        props.insert(
            "onClick".into(),
            PropValue::handler(move |_| {
                clicks_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let tree = mount(&element("button").unwrap(), props);

        let Node::Element(rendered) = tree.node() else {
            panic!("expected an element");
        };
        assert_eq!(rendered.tag, "button");
        assert_eq!(rendered.attrs.get("class"), Some(&json!("chip")));
        // `key` is reconciliation identity, not an attribute.
        assert!(!rendered.attrs.contains_key("key"));
        assert_eq!(tree.node().text_content(), "press");

        (rendered.handlers["onClick"])(&json!(null));
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn numeric_and_list_children_render_as_text() {
        let mut props = Props::new();
        props.insert("children".into(), PropValue::value(json!([1, " and ", 2])));

        let tree = mount(&element("span").unwrap(), props);
        assert_eq!(tree.node().text_content(), "1 and 2");
    }
}
