//! Delegated event dispatch.
//!
//! No per-element listeners: rendering records which event types are in
//! use and moves `@type` attributes onto the nodes as handler expressions.
//! Dispatching an event walks from the target up through its ancestors,
//! running each node's handler in the scope it was rendered under.
//! `x-model` write-back rides the same walk for `input` events, landing in
//! whichever ancestor scope's state declares the bound property.

use std::cell::{Cell, RefCell};

use cairn_reactive::Value;
use rustc_hash::FxHashSet;
use tracing::warn;

use crate::dom::Node;
use crate::eval;

/// A synthetic event travelling the live tree.
pub struct Event {
    name: String,
    target: Node,
    /// Input payload for `input` events, standing in for the control's
    /// current value.
    value: Option<Value>,
    detail: Value,
    prevented: Cell<bool>,
    stopped: Cell<bool>,
}

impl Event {
    pub fn new(name: &str, target: &Node) -> Event {
        Event {
            name: name.to_string(),
            target: target.clone(),
            value: None,
            detail: Value::Null,
            prevented: Cell::new(false),
            stopped: Cell::new(false),
        }
    }

    /// An `input` event carrying the control's new value.
    pub fn input(target: &Node, value: impl Into<Value>) -> Event {
        let mut event = Event::new("input", target);
        event.value = Some(value.into());
        event
    }

    pub fn with_detail(name: &str, target: &Node, detail: Value) -> Event {
        let mut event = Event::new(name, target);
        event.detail = detail;
        event
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> Node {
        self.target.clone()
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }

    pub fn prevent_default(&self) {
        self.prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.stopped.get()
    }

    /// The shape handler expressions see as `event`.
    pub(crate) fn to_value(&self) -> Value {
        let mut map = indexmap::IndexMap::new();
        map.insert("name".to_string(), Value::str(&self.name));
        map.insert(
            "value".to_string(),
            self.value.clone().unwrap_or(Value::Null),
        );
        map.insert("detail".to_string(), self.detail.clone());
        Value::map(map)
    }
}

thread_local! {
    static DELEGATED: RefCell<FxHashSet<String>> = RefCell::new(FxHashSet::default());
}

/// Record that `event_type` has a listener somewhere. Idempotent; the set
/// only ever grows, mirroring one document-level listener per type.
pub(crate) fn ensure_delegated(event_type: &str) {
    DELEGATED.with(|set| {
        set.borrow_mut().insert(event_type.to_string());
    });
}

pub fn is_delegated(event_type: &str) -> bool {
    DELEGATED.with(|set| set.borrow().contains(event_type))
}

pub fn delegated_event_types() -> Vec<String> {
    DELEGATED.with(|set| {
        let mut types: Vec<String> = set.borrow().iter().cloned().collect();
        types.sort();
        types
    })
}

/// Deliver `event`: walk from the target to the root, applying `x-model`
/// write-back and `@name` handlers at each step. A handler calling
/// `preventDefault` or `stopPropagation` halts the walk.
pub fn dispatch(event: &Event) {
    if !is_delegated(&event.name) {
        return;
    }
    let mut node = Some(event.target());
    while let Some(current) = node {
        if event.name == "input" {
            if let Some(bound) = current.model() {
                write_model(&current, &bound, event);
            }
        }
        if let Some(expr) = current.handler(&event.name) {
            match current.scope() {
                Some(scope) => invoke(&scope, &expr, event),
                None => warn!(expression = expr, "handler on an element with no scope"),
            }
        }
        if event.propagation_stopped() || event.default_prevented() {
            break;
        }
        node = current.parent();
    }
}

fn invoke(scope: &crate::component::Scope, expr: &str, event: &Event) {
    // `@click="save"` shorthand: the method gets the event as its argument
    if let Some(name) = eval::bare_ident(expr) {
        if scope.has_method(name) {
            scope.call_method(name, &[event.to_value()]);
            return;
        }
    }
    if let Err(error) = eval::evaluate_with_event(scope, expr, event) {
        warn!(expression = expr, %error, "event handler failed");
    }
}

/// Write the control's value into the nearest enclosing state bag that
/// declares the bound property.
fn write_model(node: &Node, bound: &str, event: &Event) {
    let value = event.value.clone().unwrap_or_else(|| {
        if node.attr("type").as_deref() == Some("checkbox") {
            Value::Bool(node.bool_prop("checked"))
        } else {
            node.prop("value").unwrap_or(Value::Null)
        }
    });
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if let Some(store) = candidate.scope().and_then(|scope| scope.store()) {
            if store.has(bound) {
                store.set(bound, value);
                return;
            }
        }
        current = candidate.parent();
    }
    warn!(property = bound, "x-model write found no declaring state");
}
