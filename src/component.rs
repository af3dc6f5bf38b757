//! Component hosts: the bridge between a custom element in the tree and
//! the behavior/state that drives it.
//!
//! Upgrading an element creates an [`Instance`]: a state bag owned by a
//! reactive subscriber, a behavior object implementing [`Component`], the
//! captured slot content, and the ref/watcher bookkeeping. The instance's
//! subscriber run is one render pass: evaluate the definition's template
//! against current state and morph the element's children to match.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use cairn_reactive::{Runtime, Store, Subscriber, SubscriberId, Value, Watcher};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::dom::Node;
use crate::event::{self, Event};
use crate::registry::{self, ComponentDef, InstanceKey};
use crate::{eval, morph, render};

/// One binding introduced by a template construct (a loop variable, an
/// index). When the binding aliases a state slot, `path` records which one,
/// so reads through the binding register against the real slot.
#[derive(Clone)]
pub struct Local {
    pub value: Value,
    pub path: Option<Rc<str>>,
}

impl Local {
    pub fn plain(value: Value) -> Local {
        Local { value, path: None }
    }

    pub fn at(value: Value, path: String) -> Local {
        Local {
            value,
            path: Some(Rc::from(path.as_str())),
        }
    }
}

/// An immutable chain of local-binding frames. Extending is cheap and does
/// not disturb sibling scopes, which nested loops rely on.
#[derive(Clone, Default)]
pub struct Locals(Option<Rc<LocalsFrame>>);

struct LocalsFrame {
    bindings: Vec<(String, Local)>,
    parent: Locals,
}

impl Locals {
    pub fn extend(&self, bindings: Vec<(String, Local)>) -> Locals {
        Locals(Some(Rc::new(LocalsFrame {
            bindings,
            parent: self.clone(),
        })))
    }

    pub fn lookup(&self, name: &str) -> Option<Local> {
        let mut frame = self.0.clone();
        while let Some(current) = frame {
            if let Some((_, local)) = current.bindings.iter().find(|(n, _)| n == name) {
                return Some(local.clone());
            }
            frame = current.parent.0.clone();
        }
        None
    }
}

/// The rendering context an element was produced under: which instance's
/// template it came from, plus any loop-local bindings in force. Expression
/// evaluation and delegated event dispatch both resolve through it.
#[derive(Clone, Default)]
pub struct Scope {
    pub(crate) instance: Option<InstanceKey>,
    pub(crate) locals: Locals,
}

impl Scope {
    pub(crate) fn for_instance(key: InstanceKey) -> Scope {
        Scope {
            instance: Some(key),
            locals: Locals::default(),
        }
    }

    pub(crate) fn with_locals(&self, bindings: Vec<(String, Local)>) -> Scope {
        Scope {
            instance: self.instance,
            locals: self.locals.extend(bindings),
        }
    }

    pub(crate) fn lookup_local(&self, name: &str) -> Option<Local> {
        self.locals.lookup(name)
    }

    pub(crate) fn store(&self) -> Option<Store> {
        let instance = registry::instance(self.instance?)?;
        Some(instance.state.clone())
    }

    pub(crate) fn has_method(&self, name: &str) -> bool {
        self.instance
            .and_then(registry::instance)
            .map(|instance| instance.behavior.borrow().has_method(name))
            .unwrap_or(false)
    }

    pub(crate) fn call_method(&self, name: &str, args: &[Value]) -> Value {
        let Some(instance) = self.instance.and_then(registry::instance) else {
            return Value::Null;
        };
        instance.call_method(name, args)
    }
}

/// Behavior attached to a custom element definition.
///
/// Hooks run synchronously at the matching lifecycle point. `call` routes
/// method invocations from template expressions; pair it with `has_method`
/// so the evaluator knows what the component answers to.
pub trait Component: 'static {
    fn initialize(&mut self, ctx: &Ctx) {
        let _ = ctx;
    }

    fn mounted(&mut self, ctx: &Ctx) {
        let _ = ctx;
    }

    fn teardown(&mut self, ctx: &Ctx) {
        let _ = ctx;
    }

    /// Runs in place of `mounted` when rendering to a string on the server.
    fn ssr(&mut self, ctx: &Ctx) {
        let _ = ctx;
    }

    fn has_method(&self, name: &str) -> bool {
        let _ = name;
        false
    }

    fn call(&mut self, ctx: &Ctx, method: &str, args: &[Value]) -> Value {
        let _ = (ctx, method, args);
        Value::Null
    }
}

/// The component's view of its own host, handed to every [`Component`] hook.
pub struct Ctx {
    instance: Rc<Instance>,
}

impl Ctx {
    pub(crate) fn new(instance: &Rc<Instance>) -> Ctx {
        Ctx {
            instance: instance.clone(),
        }
    }

    pub fn state(&self) -> &Store {
        &self.instance.state
    }

    pub fn get(&self, path: &str) -> Value {
        self.instance.state.get(path)
    }

    pub fn set(&self, path: &str, value: impl Into<Value>) {
        self.instance.state.set(path, value.into());
    }

    pub fn push(&self, path: &str, value: impl Into<Value>) {
        self.instance.state.push(path, value.into());
    }

    pub fn remove_index(&self, path: &str, index: usize) {
        self.instance.state.remove_index(path, index);
    }

    pub fn element(&self) -> Node {
        self.instance.element.clone()
    }

    /// The element carrying `x-ref="name"` in the last rendered output.
    pub fn ref_node(&self, name: &str) -> Option<Node> {
        self.instance.refs.borrow().get(name).cloned()
    }

    /// Dispatch a named event from the host element, bubbling through
    /// ancestor handlers.
    pub fn emit(&self, name: &str, detail: Value) {
        event::ensure_delegated(name);
        let event = Event::with_detail(name, &self.instance.element, detail);
        event::dispatch(&event);
    }

    /// Re-evaluate `expr` whenever its dependencies change, invoking
    /// `callback` with the fresh value. The initial evaluation only
    /// establishes dependencies; the callback first fires on a change.
    pub fn watch(&self, expr: &str, callback: impl Fn(&Ctx, &Value) + 'static) {
        self.instance.watch(expr, Rc::new(callback), false);
    }

    /// Like [`Ctx::watch`], but held back until the component has mounted.
    pub fn watch_deferred(&self, expr: &str, callback: impl Fn(&Ctx, &Value) + 'static) {
        self.instance.watch(expr, Rc::new(callback), true);
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Phase {
    Created,
    Initialized,
    Mounted,
    TornDown,
}

/// Authored children of the host element, captured at upgrade for slot
/// substitution. Nodes are cloned on every use so one pass cannot consume
/// another's content.
#[derive(Default)]
pub(crate) struct SlotContent {
    pub(crate) default: Vec<Node>,
    pub(crate) named: FxHashMap<String, Vec<Node>>,
}

/// Attribute names that configure the host element rather than carry
/// state, and so are never promoted into the store.
fn is_reserved_attribute(name: &str) -> bool {
    matches!(name, "class" | "style" | "id" | "key" | "slot")
        || name.starts_with("x-")
        || name.starts_with("data-")
        || name.starts_with('@')
        || name.starts_with(':')
        || name.starts_with('_')
        || name.starts_with('$')
}

pub struct Instance {
    pub(crate) key: InstanceKey,
    subscriber: SubscriberId,
    pub(crate) element: Node,
    pub(crate) def: Rc<ComponentDef>,
    pub(crate) behavior: RefCell<Box<dyn Component>>,
    pub(crate) state: Store,
    refs: RefCell<FxHashMap<String, Node>>,
    slots: RefCell<SlotContent>,
    watchers: RefCell<Vec<Rc<Watcher>>>,
    deferred: RefCell<Vec<Rc<Watcher>>>,
    phase: Cell<Phase>,
    /// Detached on purpose (server rendering); exempt from the
    /// disconnected-instance sweep.
    floating: Cell<bool>,
}

impl Subscriber for Instance {
    fn id(&self) -> SubscriberId {
        self.subscriber
    }

    fn run(&self) {
        if self.phase.get() == Phase::TornDown {
            return;
        }
        if let Some(instance) = registry::instance(self.key) {
            instance.render_pass();
        }
    }
}

impl Instance {
    /// Upgrade `element` into a live instance of `def`: create the state
    /// bag, run `initialize`, promote authored properties, then either
    /// hydrate server-rendered children or render for the first time.
    pub(crate) fn mount(element: &Node, def: &Rc<ComponentDef>) -> Rc<Instance> {
        let subscriber = SubscriberId::next();
        let hydrating = element.has_attr("data-ssr");
        let instance = registry::insert_instance(|key| {
            Rc::new(Instance {
                key,
                subscriber,
                element: element.clone(),
                def: def.clone(),
                behavior: RefCell::new((def.factory)()),
                state: Store::new(subscriber),
                refs: RefCell::new(FxHashMap::default()),
                slots: RefCell::new(SlotContent::default()),
                watchers: RefCell::new(Vec::new()),
                deferred: RefCell::new(Vec::new()),
                phase: Cell::new(Phase::Created),
                floating: Cell::new(false),
            })
        });
        element.set_instance(Some(instance.key));
        let subscriber: Rc<dyn Subscriber> = instance.clone();
        Runtime::register_subscriber(&subscriber);

        if hydrating {
            instance.capture_served_slots();
        } else {
            instance.capture_slots();
        }
        let ctx = Ctx::new(&instance);
        instance.behavior.borrow_mut().initialize(&ctx);
        instance.phase.set(Phase::Initialized);
        instance.promote_properties();
        event::dispatch(&Event::new("initialize", element));

        if hydrating {
            instance.hydrate();
        }
        instance.render_now();
        instance.behavior.borrow_mut().mounted(&ctx);
        instance.phase.set(Phase::Mounted);
        for watcher in instance.deferred.borrow_mut().drain(..) {
            watcher.activate();
        }
        event::dispatch(&Event::new("mounted", element));
        instance
    }

    pub(crate) fn element(&self) -> Node {
        self.element.clone()
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.phase.get() == Phase::TornDown
    }

    pub(crate) fn is_floating(&self) -> bool {
        self.floating.get()
    }

    /// Create an instance for a detached element, for rendering to a
    /// string: state and slots are set up and `initialize` runs, but no
    /// client render happens and `ssr` replaces `mounted`.
    pub(crate) fn mount_floating(element: &Node, def: &Rc<ComponentDef>) -> Rc<Instance> {
        let subscriber = SubscriberId::next();
        let instance = registry::insert_instance(|key| {
            Rc::new(Instance {
                key,
                subscriber,
                element: element.clone(),
                def: def.clone(),
                behavior: RefCell::new((def.factory)()),
                state: Store::new(subscriber),
                refs: RefCell::new(FxHashMap::default()),
                slots: RefCell::new(SlotContent::default()),
                watchers: RefCell::new(Vec::new()),
                deferred: RefCell::new(Vec::new()),
                phase: Cell::new(Phase::Created),
                floating: Cell::new(true),
            })
        });
        element.set_instance(Some(instance.key));
        instance.capture_slots();
        let ctx = Ctx::new(&instance);
        instance.behavior.borrow_mut().initialize(&ctx);
        instance.phase.set(Phase::Initialized);
        instance.promote_properties();
        instance
    }

    /// Run the server-side hook after external data has been merged in.
    pub(crate) fn run_ssr_hook(self: &Rc<Instance>) {
        let ctx = Ctx::new(self);
        self.behavior.borrow_mut().ssr(&ctx);
    }

    pub(crate) fn slots(&self) -> std::cell::Ref<'_, SlotContent> {
        self.slots.borrow()
    }

    fn capture_slots(&self) {
        let mut slots = self.slots.borrow_mut();
        for child in self.element.child_nodes() {
            if child.tag().as_deref() == Some("template") {
                if let Some(name) = child.attr("slot") {
                    slots
                        .named
                        .entry(name)
                        .or_default()
                        .extend(child.child_nodes());
                    continue;
                }
            }
            slots.default.push(child.clone());
        }
        drop(slots);
        self.element.clear_children();
    }

    /// A hydrating host's authored children are gone; its slot content is
    /// recovered from the comment markers the server left around each
    /// filled slot. The served nodes stay in place, only clones are
    /// captured.
    fn capture_served_slots(&self) {
        let mut slots = self.slots.borrow_mut();
        capture_served_slots_into(&self.element, &mut slots);
    }

    /// Copy authored attributes and parent-assigned properties into the
    /// state bag, overriding `initialize` defaults. Unknown names are kept
    /// but flagged, since they usually indicate a typo.
    fn promote_properties(&self) {
        for (name, value) in self.element.attrs() {
            if is_reserved_attribute(&name) {
                continue;
            }
            if !self.state.has(&name) {
                debug!(
                    tag = self.def.tag,
                    property = name,
                    "attribute does not match a declared property"
                );
            }
            self.state.set_silent(&name, Value::str(&value));
        }
        for (name, value) in self.element.props() {
            if is_reserved_attribute(&name) {
                continue;
            }
            if !self.state.has(&name) {
                debug!(
                    tag = self.def.tag,
                    property = name,
                    "property was not declared in initialize"
                );
            }
            self.state.set_silent(&name, value);
        }
    }

    /// Restore serialized server state before the first client render.
    /// Server and client output agree, so that render reconciles against
    /// identical markup and the served nodes survive in place.
    fn hydrate(&self) {
        let Some(payload) = self.element.attr("data-ssr") else {
            return;
        };
        match serde_json::from_str::<serde_json::Value>(&payload) {
            Ok(serde_json::Value::Object(entries)) => {
                for (key, value) in &entries {
                    self.state.set_silent(key, Value::from_json(value));
                }
            }
            Ok(_) => warn!(tag = self.def.tag, "hydration payload is not an object"),
            Err(error) => warn!(tag = self.def.tag, %error, "hydration payload is unreadable"),
        }
        self.element.remove_attr("data-ssr");
    }

    /// Render synchronously, inside a tracking scope.
    pub(crate) fn render_now(self: &Rc<Instance>) {
        let subscriber: Rc<dyn Subscriber> = self.clone();
        Runtime::run_tracked(&subscriber);
    }

    /// One render pass: instantiate the template against current state,
    /// morph the host's children to match, then refresh refs and bring any
    /// newly inserted custom elements to life.
    fn render_pass(self: &Rc<Instance>) {
        let template = self.def.template.clone_node(true);
        let scope = Scope::for_instance(self.key);
        render::render_fragment(&template, &scope, &self.slots.borrow());
        morph::morph_children(&self.element, &template);
        self.collect_refs();
        registry::upgrade_tree(&self.element);
        registry::sweep_disconnected();
    }

    fn collect_refs(&self) {
        let mut refs = self.refs.borrow_mut();
        refs.clear();
        collect_refs_into(&self.element, &mut refs);
    }

    pub(crate) fn call_method(self: &Rc<Instance>, name: &str, args: &[Value]) -> Value {
        let ctx = Ctx::new(self);
        self.behavior.borrow_mut().call(&ctx, name, args)
    }

    fn watch(self: &Rc<Instance>, expr: &str, callback: Rc<dyn Fn(&Ctx, &Value)>, deferred: bool) {
        let weak = Rc::downgrade(self);
        let expr = expr.to_string();
        let first = Cell::new(true);
        let watcher = Watcher::new(move || {
            let Some(instance) = weak.upgrade() else {
                return;
            };
            let scope = Scope::for_instance(instance.key);
            let value = eval::evaluate_or_null(&scope, &expr);
            if first.replace(false) {
                return;
            }
            let ctx = Ctx::new(&instance);
            callback(&ctx, &value);
        });
        if deferred && self.phase.get() != Phase::Mounted {
            self.deferred.borrow_mut().push(watcher.clone());
        } else {
            watcher.activate();
        }
        self.watchers.borrow_mut().push(watcher);
    }

    /// Release everything the instance owns, then run the user hook.
    /// Bookkeeping comes first so a failing hook cannot leave dangling
    /// subscriptions behind.
    pub(crate) fn teardown(self: &Rc<Instance>) {
        if self.phase.get() == Phase::TornDown {
            return;
        }
        self.phase.set(Phase::TornDown);
        registry::remove_instance(self.key);
        Runtime::dispose_owner(self.subscriber);
        for watcher in self.watchers.borrow_mut().drain(..) {
            watcher.dispose();
        }
        self.deferred.borrow_mut().clear();
        self.element.set_instance(None);
        let ctx = Ctx::new(self);
        self.behavior.borrow_mut().teardown(&ctx);
        event::dispatch(&Event::new("teardown", &self.element));
    }
}

/// A run of served nodes between an opening slot marker and its close.
struct SlotCapture {
    name: Option<String>,
    nodes: Vec<Node>,
    /// Open marker pairs nested inside the run, collected verbatim.
    depth: usize,
}

fn capture_served_slots_into(node: &Node, slots: &mut SlotContent) {
    let mut collecting: Option<SlotCapture> = None;
    for child in node.child_nodes() {
        if let Some(text) = child.comment_data() {
            let text = text.trim().to_string();
            let open = render::parse_slot_open_marker(&text);
            let close = text == render::SLOT_CLOSE_MARKER;
            if close && matches!(&collecting, Some(c) if c.depth == 0) {
                if let Some(capture) = collecting.take() {
                    match capture.name {
                        Some(name) => slots.named.entry(name).or_default().extend(capture.nodes),
                        None => slots.default.extend(capture.nodes),
                    }
                }
                continue;
            }
            match &mut collecting {
                None => {
                    if let Some(name) = open {
                        collecting = Some(SlotCapture {
                            name,
                            nodes: Vec::new(),
                            depth: 0,
                        });
                    }
                }
                Some(capture) => {
                    if open.is_some() {
                        capture.depth += 1;
                    } else if close {
                        capture.depth -= 1;
                    }
                    capture.nodes.push(child.clone_node(true));
                }
            }
            continue;
        }
        if let Some(capture) = &mut collecting {
            capture.nodes.push(child.clone_node(true));
            continue;
        }
        if !child.is_element() {
            continue;
        }
        // nested components own their slots
        if child.tag().map(|t| registry::is_custom(&t)).unwrap_or(false) {
            continue;
        }
        capture_served_slots_into(&child, slots);
    }
}

fn collect_refs_into(node: &Node, refs: &mut FxHashMap<String, Node>) {
    for child in node.child_nodes() {
        if !child.is_element() {
            continue;
        }
        if let Some(name) = child.ref_name() {
            refs.insert(name, child.clone());
        }
        // nested components own their refs
        if child.tag().map(|t| registry::is_custom(&t)).unwrap_or(false) {
            continue;
        }
        collect_refs_into(&child, refs);
    }
}
