//! Rendered Tree Description
//!
//! A [`Node`] is the immutable description a component render produces:
//! text, a primitive element (attributes, event handlers, children), or a
//! reference to a child component for the host reconciler to mount.
//!
//! Committed trees contain only text and elements; component references
//! exist in render output and are substituted by the host. Nodes serialize
//! to the wire/snapshot shape used by tests and external tooling; handlers
//! are identity-only and are never serialized.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::host::Component;
use super::props::{EventHandler, Props, Value};

/// A primitive element description.
#[derive(Clone)]
pub struct Element {
    /// Element tag name.
    pub tag: String,

    /// Value attributes, in prop order.
    pub attrs: IndexMap<String, Value>,

    /// Event handlers, keyed by their full prop name (`onClick`, ...).
    pub handlers: IndexMap<String, EventHandler>,

    /// Child nodes.
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: IndexMap::new(),
            handlers: IndexMap::new(),
            children: Vec::new(),
        }
    }
}

impl PartialEq for Element {
    /// Handlers compare by identity; everything else structurally.
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.attrs == other.attrs
            && self.children == other.children
            && self.handlers.len() == other.handlers.len()
            && self
                .handlers
                .iter()
                .zip(other.handlers.iter())
                .all(|((ka, ha), (kb, hb))| ka == kb && std::sync::Arc::ptr_eq(ha, hb))
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag)
            .field("attrs", &self.attrs)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("children", &self.children)
            .finish()
    }
}

/// A UI description produced by a component render.
#[derive(Clone, PartialEq)]
pub enum Node {
    /// A text node.
    Text(String),

    /// A primitive element.
    Element(Element),

    /// A child component for the host to mount at this position.
    Component {
        /// The component to mount.
        component: Component,
        /// Props to mount it with.
        props: Props,
    },
}

impl Node {
    /// Create a text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a child-component node.
    pub fn component(component: &Component, props: Props) -> Self {
        Self::Component {
            component: component.clone(),
            props,
        }
    }

    /// Concatenated text content of the subtree.
    ///
    /// Component references contribute nothing; they carry no content until
    /// the host substitutes their rendered output.
    pub fn text_content(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Element(element) => element
                .children
                .iter()
                .map(Node::text_content)
                .collect::<Vec<_>>()
                .concat(),
            Self::Component { .. } => String::new(),
        }
    }

    /// Serialize to a JSON value (the snapshot shape).
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).expect("node serialization is infallible")
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => write!(f, "Text({text:?})"),
            Self::Element(element) => element.fmt(f),
            Self::Component { component, .. } => {
                write!(f, "Component({})", component.name())
            }
        }
    }
}

struct AttrsSer<'a>(&'a IndexMap<String, Value>);

impl Serialize for AttrsSer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter())
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("text", text)?;
                map.end()
            }
            Self::Element(element) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("tag", &element.tag)?;
                map.serialize_entry("attrs", &AttrsSer(&element.attrs))?;
                map.serialize_entry("children", &element.children)?;
                map.end()
            }
            Self::Component { component, .. } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("component", component.name())?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_content_concatenates_subtree() {
        let mut root = Element::new("div");
        root.children.push(Node::text("a"));

        let mut span = Element::new("span");
        span.children.push(Node::text("b"));
        root.children.push(Node::Element(span));

        assert_eq!(Node::Element(root).text_content(), "ab");
    }

    #[test]
    fn serializes_to_snapshot_shape() {
        let mut element = Element::new("div");
        element.attrs.insert("class".into(), json!("box"));
        element.children.push(Node::text("hi"));

        let snapshot = Node::Element(element).to_json();
        assert_eq!(
            snapshot,
            json!({
                "tag": "div",
                "attrs": {"class": "box"},
                "children": [{"text": "hi"}],
            })
        );
    }

    #[test]
    fn equality_ignores_handler_contents_but_not_identity() {
        let handler: EventHandler = std::sync::Arc::new(|_| {});

        let mut a = Element::new("button");
        a.handlers.insert("onClick".into(), handler.clone());

        let mut b = Element::new("button");
        b.handlers.insert("onClick".into(), handler);

        assert_eq!(Node::Element(a.clone()), Node::Element(b));

        let mut c = Element::new("button");
        c.handlers
            .insert("onClick".into(), std::sync::Arc::new(|_| {}));
        assert_ne!(Node::Element(a), Node::Element(c));
    }
}
