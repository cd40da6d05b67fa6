//! Host Runtime
//!
//! A minimal retained-mode component runtime: function components over a
//! dynamic prop bag, per-instance local state, a run-once effect hook with
//! cleanup, and a positional reconciler. This is the component model the
//! bridge targets; it deliberately implements only what the bridge
//! consumes.
//!
//! # Model
//!
//! - A [`Component`] is a named render function. Identity is the function
//!   pointer: two clones of a component are the same component type to the
//!   reconciler.
//! - Mounting a component creates an instance holding its local state. A
//!   render produces a [`Node`] description; child-component nodes in the
//!   description are reconciled against the instance's existing children by
//!   position, component identity, and `key` prop.
//! - `use_state` setters invalidate only their own instance. Re-renders run
//!   from the deferred queue, so a burst of state pushes in one tick
//!   coalesces into one re-render.
//! - `use_effect` runs its setup once after the instance's first commit and
//!   its cleanup once on unmount. There is no dependency-array re-run: the
//!   bridge supplies its own re-run mechanism through the scheduler.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::bridge::{queue, Cleanup};
use crate::reactive::Computed;

use super::node::Node;
use super::props::{Props, Value, KEY_PROP};

/// Errors surfaced by the host runtime.
#[derive(Debug, Error)]
pub enum HostError {
    /// A hook was re-entered with a different type than the slot holds.
    #[error("state slot {slot} holds a different type than requested")]
    StateType {
        /// Index of the offending hook slot.
        slot: usize,
    },

    /// A tag name outside the primitive tag set.
    #[error("unknown primitive tag `{0}`")]
    UnknownTag(String),
}

/// Render function: props in, UI description out.
pub type ComponentFn = Arc<dyn Fn(&mut Scope<'_>, &Props) -> Node + Send + Sync>;

/// A named component.
///
/// Cloning is cheap and preserves identity: the reconciler treats two
/// clones as the same component type.
#[derive(Clone)]
pub struct Component {
    name: Arc<str>,
    render: ComponentFn,
}

impl Component {
    /// Create a component from a render function.
    pub fn new<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&mut Scope<'_>, &Props) -> Node + Send + Sync + 'static,
    {
        Self {
            name: name.into().into(),
            render: Arc::new(render),
        }
    }

    /// The component's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether two handles refer to the same component type.
    pub fn same_identity(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.render, &other.render)
    }

    /// Invoke the render function directly.
    pub fn call(&self, scope: &mut Scope<'_>, props: &Props) -> Node {
        (self.render)(scope, props)
    }
}

impl PartialEq for Component {
    /// Identity equality: two handles are equal when they are clones of the
    /// same component.
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

/// Per-instance hook storage.
#[derive(Default)]
struct ScopeState {
    /// Hook slots, in hook call order.
    slots: Vec<Box<dyn Any + Send>>,
    cursor: usize,
    /// Cleanups from completed effect setups, in setup order.
    cleanups: Vec<Option<Cleanup>>,
    /// Setups queued during the first render, run after the first commit.
    pending_setups: Vec<Box<dyn FnOnce() -> Option<Cleanup> + Send>>,
    mounted: bool,
}

/// Hook access for a rendering component.
pub struct Scope<'a> {
    state: &'a mut ScopeState,
    invalidate: Arc<dyn Fn() + Send + Sync>,
}

impl Scope<'_> {
    fn slot_cell<T, F>(&mut self, init: F) -> Arc<RwLock<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let slot = self.state.cursor;
        self.state.cursor += 1;

        if slot == self.state.slots.len() {
            self.state
                .slots
                .push(Box::new(Arc::new(RwLock::new(init()))));
        }

        self.state.slots[slot]
            .downcast_ref::<Arc<RwLock<T>>>()
            .unwrap_or_else(|| panic!("{}", HostError::StateType { slot }))
            .clone()
    }

    /// Local render state: returns the current value and a setter that
    /// re-renders only this instance.
    ///
    /// Hooks must be called in the same order on every render.
    pub fn use_state<T, F>(&mut self, init: F) -> (T, SetState<T>)
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let cell = self.slot_cell(init);
        let current = cell.read().clone();
        (
            current,
            SetState {
                cell,
                invalidate: self.invalidate.clone(),
            },
        )
    }

    /// A stable mutable cell that does not trigger re-renders.
    pub fn use_ref<T, F>(&mut self, init: F) -> Arc<RwLock<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.slot_cell(init)
    }

    /// Register a mount effect.
    ///
    /// `setup` runs once after this instance's first commit; the cleanup it
    /// returns runs once on unmount. Re-runs are the bridge's job, not the
    /// host's.
    pub fn use_effect<F>(&mut self, setup: F)
    where
        F: FnOnce() -> Option<Cleanup> + Send + 'static,
    {
        if !self.state.mounted {
            self.state.pending_setups.push(Box::new(setup));
        }
    }

    /// A derived cell built from a function or a plain value, stable across
    /// renders.
    pub fn use_tracked_value(&mut self, source: impl Into<TrackedSource>) -> Computed<Value> {
        let source = source.into();
        let cell = self.slot_cell(move || match source {
            TrackedSource::Producer(producer) => Computed::new(move || producer()),
            TrackedSource::Constant(value) => Computed::new(move || value.clone()),
        });
        let computed = cell.read().clone();
        computed
    }

    /// Whether this is the instance's first render.
    pub fn is_first_render(&self) -> bool {
        !self.state.mounted
    }
}

/// Input to [`Scope::use_tracked_value`]: a producer function or a plain
/// value.
pub enum TrackedSource {
    /// Zero-argument producer; reads inside it are tracked.
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),

    /// A constant.
    Constant(Value),
}

impl TrackedSource {
    /// Wrap a producer closure.
    pub fn producer<F, T>(producer: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        Self::Producer(Arc::new(move || producer().into()))
    }
}

impl From<Value> for TrackedSource {
    fn from(value: Value) -> Self {
        Self::Constant(value)
    }
}

/// Setter returned by [`Scope::use_state`].
pub struct SetState<T> {
    cell: Arc<RwLock<T>>,
    invalidate: Arc<dyn Fn() + Send + Sync>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            invalidate: Arc::clone(&self.invalidate),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SetState<T> {
    /// Read the current value.
    pub fn get(&self) -> T {
        self.cell.read().clone()
    }

    /// Store a new value and invalidate the owning instance.
    pub fn set(&self, value: T) {
        *self.cell.write() = value;
        (self.invalidate)();
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> SetState<T> {
    /// Store and invalidate only if the value differs. Returns whether it
    /// did.
    pub fn set_if_changed(&self, value: T) -> bool {
        if *self.cell.read() == value {
            return false;
        }
        self.set(value);
        true
    }
}

/// A mounted component.
pub(crate) struct Instance {
    component: Component,
    props: RwLock<Props>,
    scope: Mutex<ScopeState>,
    /// Last render output, with child components unsubstituted.
    template: RwLock<Node>,
    /// Mounted child components, in template traversal order.
    children: Mutex<Vec<Arc<Instance>>>,
    dirty: AtomicBool,
    unmounted: AtomicBool,
    renders: AtomicU64,
}

fn new_instance(component: &Component, props: Props) -> Arc<Instance> {
    Arc::new(Instance {
        component: component.clone(),
        props: RwLock::new(props),
        scope: Mutex::new(ScopeState::default()),
        template: RwLock::new(Node::Text(String::new())),
        children: Mutex::new(Vec::new()),
        dirty: AtomicBool::new(false),
        unmounted: AtomicBool::new(false),
        renders: AtomicU64::new(0),
    })
}

fn invalidator(inst: &Arc<Instance>) -> Arc<dyn Fn() + Send + Sync> {
    let weak = Arc::downgrade(inst);
    Arc::new(move || {
        let Some(inst) = weak.upgrade() else { return };
        if inst.unmounted.load(Ordering::SeqCst) {
            return;
        }
        // One deferred re-render per invalidation burst.
        if !inst.dirty.swap(true, Ordering::SeqCst) {
            let weak = weak.clone();
            queue::defer(move || {
                if let Some(inst) = weak.upgrade() {
                    if inst.dirty.load(Ordering::SeqCst) {
                        render_instance(&inst);
                    }
                }
            });
        }
    })
}

/// Render one instance and reconcile its children.
///
/// Touches only this instance and its subtree, never the parent.
pub(crate) fn render_instance(inst: &Arc<Instance>) {
    if inst.unmounted.load(Ordering::SeqCst) {
        return;
    }
    inst.dirty.store(false, Ordering::SeqCst);
    inst.renders.fetch_add(1, Ordering::SeqCst);
    tracing::trace!(component = inst.component.name(), "render");

    let props = inst.props.read().clone();
    let invalidate = invalidator(inst);

    let desc = {
        let mut state = inst.scope.lock();
        state.cursor = 0;
        let mut scope = Scope {
            state: &mut *state,
            invalidate,
        };
        inst.component.call(&mut scope, &props)
    };

    reconcile_children(inst, &desc);
    *inst.template.write() = desc;

    run_pending_setups(inst);
}

fn collect_child_specs(node: &Node, out: &mut Vec<(Component, Props)>) {
    match node {
        Node::Text(_) => {}
        Node::Element(element) => {
            for child in &element.children {
                collect_child_specs(child, out);
            }
        }
        Node::Component { component, props } => {
            out.push((component.clone(), props.clone()));
        }
    }
}

fn key_of(props: &Props) -> Option<super::props::PropValue> {
    props.get(KEY_PROP).cloned()
}

fn reconcile_children(inst: &Arc<Instance>, desc: &Node) {
    let mut specs = Vec::new();
    collect_child_specs(desc, &mut specs);

    let old: Vec<Arc<Instance>> = std::mem::take(&mut *inst.children.lock());
    let mut old_iter = old.into_iter();
    let mut next = Vec::with_capacity(specs.len());

    for (component, props) in specs {
        match old_iter.next() {
            Some(existing) => {
                let reusable = existing.component.same_identity(&component) && {
                    let old_key = key_of(&existing.props.read());
                    old_key == key_of(&props)
                };
                if reusable {
                    *existing.props.write() = props;
                    next.push(existing);
                } else {
                    unmount_instance(&existing);
                    next.push(new_instance(&component, props));
                }
            }
            None => next.push(new_instance(&component, props)),
        }
    }

    for leftover in old_iter {
        unmount_instance(&leftover);
    }

    *inst.children.lock() = next.clone();
    for child in &next {
        render_instance(child);
    }
}

fn run_pending_setups(inst: &Arc<Instance>) {
    let setups = {
        let mut state = inst.scope.lock();
        state.mounted = true;
        std::mem::take(&mut state.pending_setups)
    };

    for setup in setups {
        let cleanup = setup();
        inst.scope.lock().cleanups.push(cleanup);
    }
}

pub(crate) fn unmount_instance(inst: &Arc<Instance>) {
    if inst.unmounted.swap(true, Ordering::SeqCst) {
        return;
    }
    tracing::debug!(component = inst.component.name(), "unmount");

    let children: Vec<Arc<Instance>> = std::mem::take(&mut *inst.children.lock());
    for child in &children {
        unmount_instance(child);
    }

    let cleanups = std::mem::take(&mut inst.scope.lock().cleanups);
    for cleanup in cleanups.into_iter().rev().flatten() {
        cleanup();
    }
}

fn resolved_node(inst: &Arc<Instance>) -> Node {
    let template = inst.template.read().clone();
    let children = inst.children.lock().clone();
    let mut index = 0;
    substitute(&template, &children, &mut index)
}

fn substitute(node: &Node, children: &[Arc<Instance>], index: &mut usize) -> Node {
    match node {
        Node::Text(text) => Node::Text(text.clone()),
        Node::Element(element) => {
            let mut out = element.clone();
            out.children = element
                .children
                .iter()
                .map(|child| substitute(child, children, index))
                .collect();
            Node::Element(out)
        }
        Node::Component { .. } => {
            let child = &children[*index];
            *index += 1;
            resolved_node(child)
        }
    }
}

/// A mounted component tree.
pub struct Tree {
    root: Arc<Instance>,
}

/// Mount a component, rendering it synchronously.
pub fn mount(component: &Component, props: Props) -> Tree {
    let root = new_instance(component, props);
    render_instance(&root);
    Tree { root }
}

impl Tree {
    /// The committed tree, with all child components substituted.
    pub fn node(&self) -> Node {
        resolved_node(&self.root)
    }

    /// (component name, render count) for every instance, in DFS order.
    ///
    /// Diagnostic accessor; tests use it to assert re-render isolation.
    pub fn render_counts(&self) -> Vec<(String, u64)> {
        fn collect(inst: &Arc<Instance>, out: &mut Vec<(String, u64)>) {
            out.push((
                inst.component.name().to_string(),
                inst.renders.load(Ordering::SeqCst),
            ));
            for child in inst.children.lock().iter() {
                collect(child, out);
            }
        }

        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }

    /// Unmount the tree, running effect cleanups depth-first.
    ///
    /// Idempotent; also happens on drop.
    pub fn unmount(&self) {
        unmount_instance(&self.root);
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        unmount_instance(&self.root);
    }
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("root", &self.root.component.name())
            .finish()
    }
}
