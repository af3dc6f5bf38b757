use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

use cairn_reactive::Value;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::component::Scope;
use crate::registry::InstanceKey;

/// Attributes whose presence maps to a boolean IDL property on the live
/// element. Setting or removing one of these as an HTML attribute does not
/// by itself toggle the platform-managed state, so the morph reconciler and
/// the binding directives mirror it into the property explicitly.
pub const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "checked", "disabled", "selected", "readonly", "required", "multiple", "open", "hidden",
    "autofocus", "novalidate",
];

pub fn is_boolean_property(name: &str) -> bool {
    BOOLEAN_ATTRIBUTES.contains(&name)
}

pub(crate) enum NodeKind {
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
        /// Live properties: object-valued bindings and boolean IDL mirrors.
        props: FxHashMap<String, Value>,
    },
    Text(String),
    Comment(String),
    Fragment,
}

pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<Weak<RefCell<NodeData>>>,
    pub(crate) children: Vec<Node>,
    /// The rendering context that produced this element, for delegated
    /// event dispatch. Carried out of band, not as an attribute.
    pub(crate) scope: Option<Scope>,
    /// `@type` handler expressions, consumed off the attribute map by the
    /// renderer and read back during dispatch.
    pub(crate) handlers: Vec<(String, String)>,
    /// The `x-model` target property, likewise consumed at render time.
    pub(crate) model: Option<String>,
    /// The `x-ref` name the renderer recorded for this element.
    pub(crate) ref_name: Option<String>,
    pub(crate) instance: Option<InstanceKey>,
    pub(crate) document_root: bool,
}

/// A handle to one live DOM node. Cloning the handle aliases the node;
/// [`Node::clone_node`] copies it.
#[derive(Clone)]
pub struct Node(pub(crate) Rc<RefCell<NodeData>>);

impl Node {
    fn from_kind(kind: NodeKind) -> Node {
        Node(Rc::new(RefCell::new(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            scope: None,
            handlers: Vec::new(),
            model: None,
            ref_name: None,
            instance: None,
            document_root: false,
        })))
    }

    pub fn element(tag: &str) -> Node {
        Node::from_kind(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: IndexMap::new(),
            props: FxHashMap::default(),
        })
    }

    pub fn text(content: &str) -> Node {
        Node::from_kind(NodeKind::Text(content.to_string()))
    }

    pub fn comment(content: &str) -> Node {
        Node::from_kind(NodeKind::Comment(content.to_string()))
    }

    pub fn fragment() -> Node {
        Node::from_kind(NodeKind::Fragment)
    }

    /// Identity comparison: do two handles alias the same live node?
    pub fn ptr_eq(a: &Node, b: &Node) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Text(_))
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Fragment)
    }

    /// Lowercase tag name, `None` for non-elements.
    pub fn tag(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn text_data(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Text(t) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn comment_data(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Comment(t) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn set_text_data(&self, content: &str) {
        if let NodeKind::Text(t) = &mut self.0.borrow_mut().kind {
            *t = content.to_string();
        }
    }

    // ---- attributes ----

    pub fn attr(&self, name: &str) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).cloned(),
            _ => None,
        }
    }

    pub fn has_attr(&self, name: &str) -> bool {
        match &self.0.borrow().kind {
            NodeKind::Element { attrs, .. } => attrs.contains_key(name),
            _ => false,
        }
    }

    pub fn set_attr(&self, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.0.borrow_mut().kind {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attr(&self, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.0.borrow_mut().kind {
            attrs.shift_remove(name);
        }
    }

    pub fn attrs(&self) -> Vec<(String, String)> {
        match &self.0.borrow().kind {
            NodeKind::Element { attrs, .. } => {
                attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            _ => Vec::new(),
        }
    }

    // ---- live properties ----

    pub fn set_prop(&self, name: &str, value: Value) {
        if let NodeKind::Element { props, .. } = &mut self.0.borrow_mut().kind {
            props.insert(name.to_string(), value);
        }
    }

    pub fn prop(&self, name: &str) -> Option<Value> {
        match &self.0.borrow().kind {
            NodeKind::Element { props, .. } => props.get(name).cloned(),
            _ => None,
        }
    }

    pub fn props(&self) -> Vec<(String, Value)> {
        match &self.0.borrow().kind {
            NodeKind::Element { props, .. } => {
                props.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            _ => Vec::new(),
        }
    }

    /// The boolean IDL property view of `name`: the live property if one was
    /// mirrored, otherwise attribute presence.
    pub fn bool_prop(&self, name: &str) -> bool {
        match self.prop(name) {
            Some(Value::Bool(b)) => b,
            _ => self.has_attr(name),
        }
    }

    // ---- tree structure ----

    pub fn parent(&self) -> Option<Node> {
        let parent = self.0.borrow().parent.clone()?;
        parent.upgrade().map(Node)
    }

    pub fn child_nodes(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    /// Element children only.
    pub fn children(&self) -> Vec<Node> {
        self.0
            .borrow()
            .children
            .iter()
            .filter(|c| c.is_element())
            .cloned()
            .collect()
    }

    pub fn first_element_child(&self) -> Option<Node> {
        self.0.borrow().children.iter().find(|c| c.is_element()).cloned()
    }

    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    pub fn insert_before(&self, child: &Node, anchor: Option<&Node>) {
        child.detach();
        let index = {
            let data = self.0.borrow();
            match anchor {
                Some(anchor) => data
                    .children
                    .iter()
                    .position(|c| Node::ptr_eq(c, anchor))
                    .unwrap_or(data.children.len()),
                None => data.children.len(),
            }
        };
        child.0.borrow_mut().parent = Some(Rc::downgrade(&self.0));
        self.0.borrow_mut().children.insert(index, child.clone());
    }

    pub fn remove_child(&self, child: &Node) {
        let mut data = self.0.borrow_mut();
        if let Some(index) = data.children.iter().position(|c| Node::ptr_eq(c, child)) {
            data.children.remove(index);
            child.0.borrow_mut().parent = None;
        }
    }

    /// Detach this node from its parent, if any.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    pub fn replace_with(&self, replacement: &Node) {
        if let Some(parent) = self.parent() {
            if replacement.is_fragment() {
                for child in replacement.child_nodes() {
                    parent.insert_before(&child, Some(self));
                }
            } else {
                parent.insert_before(replacement, Some(self));
            }
            parent.remove_child(self);
        }
    }

    /// Whether the node's ancestor chain reaches a document root.
    pub fn is_connected(&self) -> bool {
        let mut node = self.clone();
        loop {
            if node.0.borrow().document_root {
                return true;
            }
            match node.parent() {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    pub(crate) fn mark_document_root(&self) {
        self.0.borrow_mut().document_root = true;
    }

    // ---- rendering context ----

    pub(crate) fn set_scope(&self, scope: Scope) {
        self.0.borrow_mut().scope = Some(scope);
    }

    pub(crate) fn scope(&self) -> Option<Scope> {
        self.0.borrow().scope.clone()
    }

    pub(crate) fn set_handler(&self, event_type: &str, expr: &str) {
        let mut data = self.0.borrow_mut();
        if let Some(entry) = data.handlers.iter_mut().find(|(t, _)| t == event_type) {
            entry.1 = expr.to_string();
        } else {
            data.handlers
                .push((event_type.to_string(), expr.to_string()));
        }
    }

    pub(crate) fn handler(&self, event_type: &str) -> Option<String> {
        self.0
            .borrow()
            .handlers
            .iter()
            .find(|(t, _)| t == event_type)
            .map(|(_, expr)| expr.clone())
    }

    pub(crate) fn set_model(&self, property: &str) {
        self.0.borrow_mut().model = Some(property.to_string());
    }

    pub(crate) fn model(&self) -> Option<String> {
        self.0.borrow().model.clone()
    }

    pub(crate) fn set_ref_name(&self, name: &str) {
        self.0.borrow_mut().ref_name = Some(name.to_string());
    }

    pub(crate) fn ref_name(&self) -> Option<String> {
        self.0.borrow().ref_name.clone()
    }

    /// Take over the rendering context recorded on `source`: scope,
    /// handlers, model binding and ref name. The reconciler calls this on
    /// every surviving node so out-of-band state follows the fresh render
    /// even where the markup did not change.
    pub(crate) fn adopt_render_state(&self, source: &Node) {
        if Node::ptr_eq(self, source) {
            return;
        }
        let (scope, handlers, model, ref_name) = {
            let src = source.0.borrow();
            (
                src.scope.clone(),
                src.handlers.clone(),
                src.model.clone(),
                src.ref_name.clone(),
            )
        };
        let mut data = self.0.borrow_mut();
        if scope.is_some() {
            data.scope = scope;
        }
        data.handlers = handlers;
        data.model = model;
        data.ref_name = ref_name;
    }

    pub(crate) fn set_instance(&self, key: Option<InstanceKey>) {
        self.0.borrow_mut().instance = key;
    }

    pub(crate) fn instance_key(&self) -> Option<InstanceKey> {
        self.0.borrow().instance
    }

    // ---- content ----

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        let data = self.0.borrow();
        if let NodeKind::Text(t) = &data.kind {
            out.push_str(t);
        }
        for child in &data.children {
            child.collect_text(out);
        }
    }

    pub fn set_text_content(&self, content: &str) {
        self.clear_children();
        if !content.is_empty() {
            self.append_child(&Node::text(content));
        }
    }

    pub fn clear_children(&self) {
        for child in self.child_nodes() {
            self.remove_child(&child);
        }
    }

    /// A deep (or shallow) copy. Copies attributes, live properties (value
    /// containers are shared, preserving identity) and the rendering
    /// context the node carries; never the component instance association.
    pub fn clone_node(&self, deep: bool) -> Node {
        let data = self.0.borrow();
        let kind = match &data.kind {
            NodeKind::Element { tag, attrs, props } => NodeKind::Element {
                tag: tag.clone(),
                attrs: attrs.clone(),
                props: props.clone(),
            },
            NodeKind::Text(t) => NodeKind::Text(t.clone()),
            NodeKind::Comment(t) => NodeKind::Comment(t.clone()),
            NodeKind::Fragment => NodeKind::Fragment,
        };
        let copy = Node::from_kind(kind);
        {
            let mut copy_data = copy.0.borrow_mut();
            copy_data.scope = data.scope.clone();
            copy_data.handlers = data.handlers.clone();
            copy_data.model = data.model.clone();
            copy_data.ref_name = data.ref_name.clone();
        }
        if deep {
            for child in &data.children {
                copy.append_child(&child.clone_node(true));
            }
        }
        copy
    }

    // ---- queries ----

    /// Pre-order walk over descendant elements, not including `self`.
    pub fn descendant_elements(&self) -> Vec<Node> {
        let mut out = Vec::new();
        self.collect_elements(&mut out);
        out
    }

    fn collect_elements(&self, out: &mut Vec<Node>) {
        for child in self.child_nodes() {
            if child.is_element() {
                out.push(child.clone());
            }
            child.collect_elements(out);
        }
    }

    /// First descendant element with the given tag name.
    pub fn find(&self, tag: &str) -> Option<Node> {
        let tag = tag.to_ascii_lowercase();
        self.descendant_elements()
            .into_iter()
            .find(|el| el.tag().as_deref() == Some(tag.as_str()))
    }

    pub fn find_all(&self, tag: &str) -> Vec<Node> {
        let tag = tag.to_ascii_lowercase();
        self.descendant_elements()
            .into_iter()
            .filter(|el| el.tag().as_deref() == Some(tag.as_str()))
            .collect()
    }

    /// First descendant element carrying `name="value"`.
    pub fn find_by_attr(&self, name: &str, value: &str) -> Option<Node> {
        self.descendant_elements()
            .into_iter()
            .find(|el| el.attr(name).as_deref() == Some(value))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.borrow().kind {
            NodeKind::Element { tag, .. } => write!(f, "Node(<{tag}>)"),
            NodeKind::Text(t) => write!(f, "Node({t:?})"),
            NodeKind::Comment(_) => write!(f, "Node(<!-- -->)"),
            NodeKind::Fragment => write!(f, "Node(#fragment)"),
        }
    }
}
