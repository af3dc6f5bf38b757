//! The component registry: tag definitions and live instances.
//!
//! Definitions map a custom-element tag name to its template, scoped style
//! and behavior factory. Instances live in a slot map keyed by
//! [`InstanceKey`]; DOM nodes carry the key instead of an owning handle, so
//! a detached subtree cannot keep a torn-down instance alive.

use std::{cell::RefCell, rc::Rc};

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use tracing::warn;

use crate::component::{Component, Instance};
use crate::dom::{parse_fragment, Node};

new_key_type! {
    pub struct InstanceKey;
}

pub struct ComponentDef {
    pub tag: String,
    /// Parsed template fragment, cloned for every render pass.
    pub template: Node,
    pub style: String,
    pub(crate) factory: Box<dyn Fn() -> Box<dyn Component>>,
}

#[derive(Default)]
struct RegistryInner {
    defs: FxHashMap<String, Rc<ComponentDef>>,
    instances: SlotMap<InstanceKey, Rc<Instance>>,
}

thread_local! {
    static REGISTRY: RefCell<RegistryInner> = RefCell::new(RegistryInner::default());
}

/// Register a component definition under `tag`. Redefinition replaces the
/// previous definition for future upgrades; live instances keep the one
/// they were created with.
pub fn define(
    tag: &str,
    template: &str,
    style: &str,
    factory: impl Fn() -> Box<dyn Component> + 'static,
) -> Rc<ComponentDef> {
    let tag = tag.to_ascii_lowercase();
    let def = Rc::new(ComponentDef {
        tag: tag.clone(),
        template: parse_fragment(template),
        style: style.to_string(),
        factory: Box::new(factory),
    });
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        if registry.defs.insert(tag.clone(), def.clone()).is_some() {
            warn!(tag, "component redefined");
        }
    });
    def
}

pub fn definition(tag: &str) -> Option<Rc<ComponentDef>> {
    REGISTRY.with(|registry| registry.borrow().defs.get(tag).cloned())
}

/// Whether `tag` names a registered component.
pub fn is_custom(tag: &str) -> bool {
    REGISTRY.with(|registry| registry.borrow().defs.contains_key(tag))
}

pub fn defined_tags() -> Vec<String> {
    REGISTRY.with(|registry| registry.borrow().defs.keys().cloned().collect())
}

/// Drop every definition and instance. Test isolation only; real
/// applications define once at startup.
pub fn reset() {
    let instances: Vec<Rc<Instance>> =
        REGISTRY.with(|registry| registry.borrow().instances.values().cloned().collect());
    for instance in instances {
        instance.teardown();
    }
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        registry.defs.clear();
        registry.instances.clear();
    });
}

pub(crate) fn insert_instance(
    build: impl FnOnce(InstanceKey) -> Rc<Instance>,
) -> Rc<Instance> {
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        let key = registry.instances.insert_with_key(build);
        registry.instances[key].clone()
    })
}

pub fn instance(key: InstanceKey) -> Option<Rc<Instance>> {
    REGISTRY.with(|registry| registry.borrow().instances.get(key).cloned())
}

pub(crate) fn remove_instance(key: InstanceKey) {
    REGISTRY.with(|registry| {
        registry.borrow_mut().instances.remove(key);
    });
}

/// Bring `element` to life if its tag has a definition. Idempotent: an
/// already-upgraded element returns its existing instance.
pub fn upgrade(element: &Node) -> Option<Rc<Instance>> {
    if let Some(existing) = element.instance_key() {
        return instance(existing);
    }
    let tag = element.tag()?;
    let def = definition(&tag)?;
    Some(Instance::mount(element, &def))
}

/// Upgrade every connected, not-yet-upgraded custom element under `root`.
/// Parents upgrade before their descendants.
pub fn upgrade_tree(root: &Node) {
    for element in root.descendant_elements() {
        let Some(tag) = element.tag() else { continue };
        if element.instance_key().is_none() && is_custom(&tag) && element.is_connected() {
            upgrade(&element);
        }
    }
}

/// Tear down instances whose elements have left the document.
pub fn sweep_disconnected() {
    let snapshot: Vec<Rc<Instance>> =
        REGISTRY.with(|registry| registry.borrow().instances.values().cloned().collect());
    for instance in snapshot {
        if instance.is_floating() || instance.is_torn_down() {
            continue;
        }
        if !instance.element().is_connected() {
            instance.teardown();
        }
    }
}
