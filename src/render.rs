//! Template instantiation: walk a cloned template fragment and apply the
//! directive attributes against the rendering scope.
//!
//! Every directive consumes its authoring attribute, so rendered markup
//! carries no template syntax. Handler expressions, model bindings and ref
//! names move onto the nodes themselves, where delegated dispatch and ref
//! collection read them back. A failing expression logs and renders as
//! empty rather than aborting the pass.

use cairn_reactive::{identity_token, Value};
use tracing::warn;

use crate::component::{Local, Scope, SlotContent};
use crate::dom::{is_boolean_property, Node};
use crate::registry;
use crate::{eval, event};

/// Render `fragment` in place against `scope`. Top-level element children
/// are marked with `x-scope`, the boundary styling and tooling key off.
pub(crate) fn render_fragment(fragment: &Node, scope: &Scope, slots: &SlotContent) {
    process_children(fragment, scope, slots);
    for child in fragment.children() {
        child.set_attr("x-scope", "");
    }
}

fn process_children(parent: &Node, scope: &Scope, slots: &SlotContent) {
    // one conditional chain per sibling list
    let mut chain: Option<bool> = None;
    for child in parent.child_nodes() {
        if child.is_element() {
            process_element(&child, scope, slots, &mut chain);
        }
    }
}

fn process_element(el: &Node, scope: &Scope, slots: &SlotContent, chain: &mut Option<bool>) {
    if !apply_conditional(el, scope, slots, chain) {
        return;
    }
    if el.attr("x-for").is_some() {
        expand_loop(el, scope, slots);
        return;
    }
    if el.tag().as_deref() == Some("slot") {
        fill_slot(el, slots);
        return;
    }

    el.set_scope(scope.clone());

    if let Some(expr) = el.attr("x-text") {
        el.remove_attr("x-text");
        let value = eval::evaluate_or_null(scope, &expr);
        el.set_text_content(&value.display_string());
    }
    let mut skip_children = false;
    if let Some(expr) = el.attr("x-html") {
        el.remove_attr("x-html");
        let value = eval::evaluate_or_null(scope, &expr);
        el.set_inner_html(&value.display_string());
        skip_children = true;
    }
    if let Some(expr) = el.attr("x-show") {
        el.remove_attr("x-show");
        if !eval::evaluate_or_null(scope, &expr).truthy() {
            hide(el);
        }
    }
    if let Some(name) = el.attr("x-model") {
        el.remove_attr("x-model");
        apply_model(el, scope, &name);
    }
    if let Some(name) = el.attr("x-ref") {
        el.remove_attr("x-ref");
        el.set_ref_name(&name);
    }
    apply_bindings(el, scope);
    for (name, expr) in el.attrs() {
        if let Some(event_type) = name.strip_prefix('@') {
            event::ensure_delegated(event_type);
            el.set_handler(event_type, &expr);
            el.remove_attr(&name);
        }
    }

    if !skip_children {
        process_children(el, scope, slots);
    }
}

/// Evaluate the `x-if`/`x-else-if`/`x-else` chain position of `el`.
/// Returns false when the element was removed (or unwrapped) and needs no
/// further processing.
fn apply_conditional(
    el: &Node,
    scope: &Scope,
    slots: &SlotContent,
    chain: &mut Option<bool>,
) -> bool {
    let shown = if let Some(expr) = el.attr("x-if") {
        let shown = eval::evaluate_or_null(scope, &expr).truthy();
        *chain = Some(shown);
        shown
    } else if let Some(expr) = el.attr("x-else-if") {
        let Some(passed) = *chain else {
            warn!(expression = expr, "x-else-if without a preceding x-if");
            el.detach();
            return false;
        };
        let shown = !passed && eval::evaluate_or_null(scope, &expr).truthy();
        if shown {
            *chain = Some(true);
        }
        shown
    } else if el.has_attr("x-else") {
        let Some(passed) = chain.take() else {
            warn!("x-else without a preceding x-if");
            el.detach();
            return false;
        };
        !passed
    } else {
        return true;
    };

    if !shown {
        el.detach();
        return false;
    }
    el.remove_attr("x-if");
    el.remove_attr("x-else-if");
    el.remove_attr("x-else");
    // a shown <template> dissolves into its children
    if el.tag().as_deref() == Some("template") {
        let inner = Node::fragment();
        for child in el.child_nodes() {
            inner.append_child(&child);
        }
        process_children(&inner, scope, slots);
        el.replace_with(&inner);
        return false;
    }
    true
}

/// `x-for="item in expr"`: replace the element with one processed clone
/// per entry. The iteration variable carries the entry's state path, so
/// reads through it subscribe to the exact slot; the list's `length` is
/// tracked so growth re-runs the loop.
fn expand_loop(el: &Node, scope: &Scope, slots: &SlotContent) {
    let source = el.attr("x-for").unwrap_or_default();
    let Some((ident, expr)) = parse_loop(&source) else {
        warn!(expression = source, "malformed x-for");
        return;
    };
    let (value, path) = eval::evaluate_traced(scope, expr);
    if let (Some(path), Some(store)) = (&path, scope.store()) {
        store.track(&format!("{path}/length"));
    }
    let items: Vec<Value> = match &value {
        Value::List(items) => items.borrow().clone(),
        Value::Null => Vec::new(),
        other => {
            warn!(expression = expr, value = %other, "x-for source is not a list");
            Vec::new()
        }
    };

    let replacement = Node::fragment();
    for (index, item) in items.into_iter().enumerate() {
        let clone = el.clone_node(true);
        clone.remove_attr("x-for");
        replacement.append_child(&clone);
        let item_local = match &path {
            Some(path) => Local::at(item, format!("{path}/{index}")),
            None => Local::plain(item),
        };
        let iteration = scope.with_locals(vec![
            (ident.to_string(), item_local),
            ("index".to_string(), Local::plain(Value::Int(index as i64))),
        ]);
        let mut chain = None;
        process_element(&clone, &iteration, slots, &mut chain);
    }
    el.replace_with(&replacement);
}

fn parse_loop(source: &str) -> Option<(&str, &str)> {
    let (ident, expr) = source.split_once(" in ")?;
    let ident = ident.trim();
    let expr = expr.trim();
    let valid = !ident.is_empty()
        && ident
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !ident.starts_with(|c: char| c.is_ascii_digit());
    if !valid || expr.is_empty() {
        return None;
    }
    Some((ident, expr))
}

pub(crate) const SLOT_CLOSE_MARKER: &str = "/slot";

pub(crate) fn slot_open_marker(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("slot:{name}"),
        None => "slot".to_string(),
    }
}

/// `Some(slot name)` when `text` is an opening slot marker comment.
pub(crate) fn parse_slot_open_marker(text: &str) -> Option<Option<String>> {
    let text = text.trim();
    if text == "slot" {
        return Some(None);
    }
    text.strip_prefix("slot:").map(|name| Some(name.to_string()))
}

/// Replace a `<slot>`/`<slot name="...">` element with clones of the
/// captured host children, bracketed by comment markers. The markers are
/// invisible to styling and structure but let a hydrating host find its
/// slot content again in served markup. Captured content was already
/// rendered by the parent pass, so it is inserted verbatim.
fn fill_slot(el: &Node, slots: &SlotContent) {
    let name = el.attr("name");
    let content: &[Node] = match &name {
        Some(name) => slots.named.get(name).map(Vec::as_slice).unwrap_or(&[]),
        None => &slots.default,
    };
    let replacement = Node::fragment();
    replacement.append_child(&Node::comment(&slot_open_marker(name.as_deref())));
    for node in content {
        replacement.append_child(&node.clone_node(true));
    }
    replacement.append_child(&Node::comment(SLOT_CLOSE_MARKER));
    el.replace_with(&replacement);
}

fn hide(el: &Node) {
    let mut style = el.attr("style").unwrap_or_default();
    if !style.is_empty() && !style.trim_end().ends_with(';') {
        style.push(';');
    }
    style.push_str("display: none;");
    el.set_attr("style", style.trim());
}

/// Two-way binding: push the bound state slot into the element's
/// value/checked and record the target property for the delegated input
/// listener to write back through.
fn apply_model(el: &Node, scope: &Scope, name: &str) {
    event::ensure_delegated("input");
    el.set_model(name);
    let Some(store) = scope.store() else {
        return;
    };
    if !store.has(name) {
        warn!(
            property = name,
            "x-model binds a property that initialize() never declared"
        );
    }
    let value = store.get(name);
    if el.attr("type").as_deref() == Some("checkbox") {
        let checked = value.truthy();
        if checked {
            el.set_attr("checked", "checked");
        } else {
            el.remove_attr("checked");
        }
        el.set_prop("checked", Value::Bool(checked));
    } else {
        let text = value.display_string();
        el.set_attr("value", &text);
        el.set_prop("value", Value::str(text));
    }
}

/// `:name="expr"` bindings. Booleans toggle attribute presence and mirror
/// the IDL property; objects leave an identity marker in the attribute and
/// the real value in the element property; `:class` merges with the static
/// class list.
fn apply_bindings(el: &Node, scope: &Scope) {
    let custom = el
        .tag()
        .map(|tag| registry::is_custom(&tag))
        .unwrap_or(false);
    for (name, expr) in el.attrs() {
        let Some(attr_name) = name.strip_prefix(':') else {
            continue;
        };
        if attr_name.is_empty() {
            continue;
        }
        el.remove_attr(&name);
        let value = eval::evaluate_or_null(scope, &expr);
        if custom {
            // typed hand-off; promoted into the child's state at upgrade
            el.set_prop(attr_name, value.clone());
        }
        if attr_name == "class" {
            let mut classes = el.attr("class").unwrap_or_default();
            let dynamic = class_list(&value);
            if !dynamic.is_empty() {
                if !classes.is_empty() {
                    classes.push(' ');
                }
                classes.push_str(&dynamic);
            }
            if classes.is_empty() {
                el.remove_attr("class");
            } else {
                el.set_attr("class", &classes);
            }
            continue;
        }
        match &value {
            Value::Bool(true) => {
                el.set_attr(attr_name, attr_name);
                if is_boolean_property(attr_name) {
                    el.set_prop(attr_name, Value::Bool(true));
                }
            }
            Value::Bool(false) | Value::Null => {
                el.remove_attr(attr_name);
                if is_boolean_property(attr_name) {
                    el.set_prop(attr_name, Value::Bool(false));
                }
            }
            Value::List(_) | Value::Map(_) => {
                if let Some(token) = identity_token(&value) {
                    el.set_attr(attr_name, &token);
                }
                el.set_prop(attr_name, value.clone());
            }
            other => el.set_attr(attr_name, &other.display_string()),
        }
    }
}

/// The class-building convention: strings pass through, lists keep their
/// truthy entries, maps keep the keys of truthy values.
pub(crate) fn class_list(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        Value::List(items) => items
            .borrow()
            .iter()
            .map(class_list)
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Map(map) => map
            .borrow()
            .iter()
            .filter(|(_, v)| v.truthy())
            .map(|(k, _)| k.clone())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null | Value::Bool(false) => String::new(),
        other => other.display_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_reactive::Value;
    use indexmap::IndexMap;

    fn render(html: &str) -> Node {
        let fragment = crate::dom::parse_fragment(html);
        render_fragment(&fragment, &Scope::default(), &SlotContent::default());
        fragment
    }

    #[test]
    fn literal_text_and_show() {
        let out = render(r#"<p x-text="'hi ' + 'there'"></p><i x-show="false"></i>"#);
        assert_eq!(out.find("p").unwrap().text_content(), "hi there");
        assert_eq!(
            out.find("i").unwrap().attr("style").as_deref(),
            Some("display: none;")
        );
    }

    #[test]
    fn conditional_chain_is_exclusive() {
        let out = render(concat!(
            r#"<a x-if="false">a</a>"#,
            r#"<b x-else-if="true">b</b>"#,
            r#"<c x-else>c</c>"#,
        ));
        assert!(out.find("a").is_none());
        assert!(out.find("b").is_some());
        assert!(out.find("c").is_none());
    }

    #[test]
    fn shown_template_unwraps() {
        let out = render(r#"<template x-if="true"><em>x</em><em>y</em></template>"#);
        assert!(out.find("template").is_none());
        assert_eq!(out.find_all("em").len(), 2);
    }

    #[test]
    fn else_without_if_is_dropped() {
        let out = render(r#"<div x-else>stray</div>"#);
        assert!(out.find("div").is_none());
    }

    #[test]
    fn loop_over_literal_list() {
        let out = render(r#"<li x-for="n in [1, 2, 3]" x-text="n * 10"></li>"#);
        let items = out.find_all("li");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].text_content(), "10");
        assert_eq!(items[2].text_content(), "30");
        assert!(!items[0].has_attr("x-for"));
    }

    #[test]
    fn loop_exposes_index() {
        let out = render(r#"<i x-for="x in ['a', 'b']" x-text="index + ':' + x"></i>"#);
        let items = out.find_all("i");
        assert_eq!(items[0].text_content(), "0:a");
        assert_eq!(items[1].text_content(), "1:b");
    }

    #[test]
    fn malformed_loop_is_left_alone() {
        let out = render(r#"<li x-for="whatever"></li>"#);
        assert!(out.find("li").unwrap().has_attr("x-for"));
    }

    #[test]
    fn boolean_binding_sets_presence_and_property() {
        let out = render(r#"<input :disabled="true"><button :disabled="false"></button>"#);
        let input = out.find("input").unwrap();
        assert_eq!(input.attr("disabled").as_deref(), Some("disabled"));
        assert!(input.bool_prop("disabled"));
        let button = out.find("button").unwrap();
        assert!(!button.has_attr("disabled"));
        assert!(!button.bool_prop("disabled"));
    }

    #[test]
    fn class_binding_merges_with_static() {
        let out = render(r#"<p class="base" :class="{ active: true, off: false }"></p>"#);
        assert_eq!(
            out.find("p").unwrap().attr("class").as_deref(),
            Some("base active")
        );
    }

    #[test]
    fn class_list_shapes() {
        assert_eq!(class_list(&Value::str("a b")), "a b");
        assert_eq!(
            class_list(&Value::list(vec![
                Value::str("a"),
                Value::Null,
                Value::str("b"),
            ])),
            "a b"
        );
        let mut map = IndexMap::new();
        map.insert("on".to_string(), Value::Bool(true));
        map.insert("off".to_string(), Value::Bool(false));
        assert_eq!(class_list(&Value::map(map)), "on");
    }

    #[test]
    fn object_binding_leaves_identity_marker() {
        let out = render(r#"<div :data="{ a: 1 }"></div>"#);
        let div = out.find("div").unwrap();
        assert!(div.attr(":data").is_none(), "the binding attribute is consumed");
        assert!(div.attr("data").unwrap().starts_with("obj-"));
        assert!(matches!(div.prop("data"), Some(Value::Map(_))));
    }

    #[test]
    fn directives_are_consumed_from_the_output() {
        let out = render(concat!(
            r#"<p x-if="true" x-text="'hi'" x-show="true" @click="go" x-ref="line"></p>"#,
        ));
        let p = out.find("p").unwrap();
        for name in ["x-if", "x-text", "x-show", "@click", "x-ref"] {
            assert!(!p.has_attr(name), "{name} must come off the output");
        }
        assert_eq!(p.handler("click").as_deref(), Some("go"));
        assert_eq!(p.ref_name().as_deref(), Some("line"));
        assert_eq!(p.text_content(), "hi");
    }

    #[test]
    fn slot_is_replaced_by_its_content() {
        let fragment = crate::dom::parse_fragment("<ul><slot></slot></ul>");
        let li = crate::dom::parse_fragment("<li>x</li>")
            .first_element_child()
            .unwrap();
        let mut slots = SlotContent::default();
        slots.default.push(li);
        render_fragment(&fragment, &Scope::default(), &slots);
        let ul = fragment.find("ul").unwrap();
        assert!(ul.find("slot").is_none(), "no wrapper element survives");
        // content sits directly under the slot's parent
        assert!(ul
            .children()
            .iter()
            .any(|c| c.tag().as_deref() == Some("li")));
        assert_eq!(ul.find("li").unwrap().text_content(), "x");
    }

    #[test]
    fn top_level_children_are_scope_marked() {
        let out = render("<header></header><main><span></span></main>");
        assert!(out.find("header").unwrap().has_attr("x-scope"));
        assert!(out.find("main").unwrap().has_attr("x-scope"));
        assert!(!out.find("span").unwrap().has_attr("x-scope"));
    }
}
