//! In-place reconciliation of a live subtree against freshly rendered
//! output.
//!
//! No virtual tree: both sides are real nodes, compared by serialized
//! content. Matching prefixes and suffixes are skipped untouched, keyed
//! components are relocated rather than rebuilt, compatible elements are
//! patched in place, and only genuinely new content is cloned in. Custom
//! elements are treated as black boxes: their attributes and properties
//! are synced (reactively, when the name is a declared state property) and
//! their interiors are left to their own render passes.

use cairn_reactive::Value;

use crate::dom::{is_boolean_property, Node};
use crate::registry;

/// Attributes that never participate in content comparison of component
/// hosts: the scope marker and the hydration payload.
const COMPARISON_EXEMPT: &[&str] = &["x-scope", "data-ssr"];

/// Reconcile the children of `live` to match the children of `target`.
/// `target` is consumed as a source of clones; `live` is mutated in place.
pub(crate) fn morph_children(live: &Node, target: &Node) {
    let mut lc: Vec<Node> = live.child_nodes();
    let rc: Vec<Node> = target.child_nodes();
    let mut ls = 0usize;
    let mut le = lc.len();
    let mut rs = 0usize;
    let mut re = rc.len();

    // untouched matching tail
    while le > ls && re > rs && content(&lc[le - 1]) == content(&rc[re - 1]) {
        adopt_subtree(&lc[le - 1], &rc[re - 1]);
        le -= 1;
        re -= 1;
    }

    loop {
        if rs >= re {
            if ls >= le {
                break;
            }
            // surplus live nodes
            let gone = lc.remove(ls);
            live.remove_child(&gone);
            le -= 1;
            continue;
        }
        if ls >= le {
            // new content, anchored before the preserved tail
            let node = rc[rs].clone_node(true);
            let anchor = lc.get(ls).cloned();
            live.insert_before(&node, anchor.as_ref());
            lc.insert(ls, node);
            ls += 1;
            le += 1;
            rs += 1;
            continue;
        }

        let l = lc[ls].clone();
        let r = rc[rs].clone();
        if content(&l) == content(&r) {
            adopt_subtree(&l, &r);
            ls += 1;
            rs += 1;
            continue;
        }

        // a keyed component further down the live list moves, state intact
        if let Some(wanted) = key(&r) {
            let found = (ls + 1..le).find(|&i| key(&lc[i]).as_deref() == Some(&wanted));
            if let Some(position) = found {
                let moved = lc.remove(position);
                live.insert_before(&moved, Some(&l));
                lc.insert(ls, moved.clone());
                patch(&moved, &r);
                ls += 1;
                rs += 1;
                continue;
            }
        }

        if l.is_text() && r.is_text() {
            if let Some(text) = r.text_data() {
                l.set_text_data(&text);
            }
            ls += 1;
            rs += 1;
            continue;
        }

        if compatible(&l, &r) {
            patch(&l, &r);
            ls += 1;
            rs += 1;
            continue;
        }

        // the live node reappears later in the target: this is an insertion
        let live_key = key(&l);
        if live_key.is_some() && (rs + 1..re).any(|i| key(&rc[i]) == live_key) {
            let node = r.clone_node(true);
            live.insert_before(&node, Some(&l));
            lc.insert(ls, node);
            ls += 1;
            le += 1;
            rs += 1;
            continue;
        }

        // irreconcilable: replace
        let node = r.clone_node(true);
        live.insert_before(&node, Some(&l));
        live.remove_child(&l);
        lc[ls] = node;
        ls += 1;
        rs += 1;
    }
}

/// Whether `live` can be patched in place to become `target`: same tag,
/// and for component hosts, the same key.
fn compatible(live: &Node, target: &Node) -> bool {
    let (Some(lt), Some(rt)) = (live.tag(), target.tag()) else {
        return false;
    };
    if lt != rt {
        return false;
    }
    !registry::is_custom(&lt) || key(live) == key(target)
}

/// Patch a compatible pair in place: attributes, properties, scope, and
/// for plain elements, the children.
fn patch(live: &Node, target: &Node) {
    let custom = live
        .tag()
        .map(|tag| registry::is_custom(&tag))
        .unwrap_or(false);
    if custom && live.instance_key().is_none() && live.is_connected() {
        // properties must land in a live store
        registry::upgrade(live);
    }
    sync_attributes(live, target);
    if !custom {
        morph_children(live, target);
    }
}

/// Carry the rendering context across a pair the content comparison found
/// equal: scope, handlers and the rest of the out-of-band state live on
/// nodes rather than in markup, so even untouched nodes need them
/// refreshed from the new pass. Component hosts stop the walk; their
/// interiors belong to their own passes.
fn adopt_subtree(live: &Node, target: &Node) {
    live.adopt_render_state(target);
    if live
        .tag()
        .map(|tag| registry::is_custom(&tag))
        .unwrap_or(false)
    {
        return;
    }
    for (l, t) in live.child_nodes().iter().zip(target.child_nodes()) {
        adopt_subtree(l, &t);
    }
}

fn sync_attributes(live: &Node, target: &Node) {
    for (name, value) in target.attrs() {
        if live.attr(&name).as_deref() != Some(value.as_str()) {
            live.set_attr(&name, &value);
            if is_boolean_property(&name) {
                assign_prop(live, &name, Value::Bool(true));
            }
        }
    }
    for (name, _) in live.attrs() {
        if !target.has_attr(&name) && !COMPARISON_EXEMPT.contains(&name.as_str()) {
            live.remove_attr(&name);
            if is_boolean_property(&name) {
                assign_prop(live, &name, Value::Bool(false));
            }
        }
    }
    for (name, value) in target.props() {
        assign_prop(live, &name, value);
    }
    live.adopt_render_state(target);
}

/// Property assignment with reactive hand-off: when the element hosts an
/// instance that declares `name`, write through its store so the change
/// schedules the child's render. Everything else is a plain property.
fn assign_prop(live: &Node, name: &str, value: Value) {
    if let Some(instance) = live.instance_key().and_then(registry::instance) {
        if instance.state.has(name) {
            if instance.state.get_untracked(name) != value {
                instance.state.set(name, value);
            }
            return;
        }
    }
    live.set_prop(name, value);
}

/// The comparison identity of a node. Text nodes compare by text,
/// component hosts by tag plus sorted attributes (so their interiors,
/// which belong to their own passes, never cause a mismatch), everything
/// else by serialized markup.
fn content(node: &Node) -> String {
    if let Some(text) = node.text_data() {
        return format!("#text:{text}");
    }
    if let Some(tag) = node.tag() {
        if registry::is_custom(&tag) {
            let mut attrs: Vec<(String, String)> = node
                .attrs()
                .into_iter()
                .filter(|(name, _)| !COMPARISON_EXEMPT.contains(&name.as_str()))
                .collect();
            attrs.sort();
            let mut out = format!("<{tag}");
            for (name, value) in attrs {
                out.push_str(&format!(" {name}=\"{value}\""));
            }
            out.push('>');
            return out;
        }
    }
    node.outer_html()
}

/// Relocation identity: only component hosts with an explicit `key`
/// attribute have one.
fn key(node: &Node) -> Option<String> {
    let tag = node.tag()?;
    if !registry::is_custom(&tag) {
        return None;
    }
    node.attr("key").map(|k| format!("{tag}:{k}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_fragment;

    fn nodes(html: &str) -> Node {
        parse_fragment(html)
    }

    #[test]
    fn equal_trees_are_untouched() {
        let live = nodes("<p>a</p><p>b</p>");
        let before = live.child_nodes();
        morph_children(&live, &nodes("<p>a</p><p>b</p>"));
        let after = live.child_nodes();
        assert_eq!(after.len(), 2);
        for (b, a) in before.iter().zip(&after) {
            assert!(Node::ptr_eq(b, a));
        }
    }

    #[test]
    fn append_keeps_existing_nodes_by_reference() {
        let live = nodes("<li>1</li><li>2</li>");
        let before = live.child_nodes();
        morph_children(&live, &nodes("<li>1</li><li>2</li><li>3</li>"));
        let after = live.child_nodes();
        assert_eq!(after.len(), 3);
        assert!(Node::ptr_eq(&before[0], &after[0]));
        assert!(Node::ptr_eq(&before[1], &after[1]));
        assert_eq!(after[2].text_content(), "3");
    }

    #[test]
    fn removal_from_the_middle() {
        let live = nodes("<li>1</li><li>2</li><li>3</li>");
        let before = live.child_nodes();
        morph_children(&live, &nodes("<li>1</li><li>3</li>"));
        let after = live.child_nodes();
        assert_eq!(after.len(), 2);
        assert!(Node::ptr_eq(&before[0], &after[0]));
        assert!(Node::ptr_eq(&before[2], &after[1]));
    }

    #[test]
    fn compatible_element_is_patched_in_place() {
        let live = nodes(r#"<div class="old">x</div>"#);
        let div = live.child_nodes()[0].clone();
        morph_children(&live, &nodes(r#"<div class="new">y</div>"#));
        assert!(Node::ptr_eq(&div, &live.child_nodes()[0]));
        assert_eq!(div.attr("class").as_deref(), Some("new"));
        assert_eq!(div.text_content(), "y");
    }

    #[test]
    fn boolean_attribute_removal_mirrors_the_property() {
        let live = nodes(r#"<input checked="checked">"#);
        let input = live.child_nodes()[0].clone();
        morph_children(&live, &nodes("<input>"));
        assert!(!input.has_attr("checked"));
        assert_eq!(input.prop("checked"), Some(Value::Bool(false)));
    }

    #[test]
    fn incompatible_node_is_replaced() {
        let live = nodes("<span>x</span>");
        let span = live.child_nodes()[0].clone();
        morph_children(&live, &nodes("<em>x</em>"));
        let after = live.child_nodes();
        assert!(!Node::ptr_eq(&span, &after[0]));
        assert_eq!(after[0].tag().as_deref(), Some("em"));
    }

    #[test]
    fn untouched_nodes_adopt_the_fresh_render_context() {
        let live = nodes("<div><button>go</button></div>");
        let target = nodes("<div><button>go</button></div>");
        target.find("button").unwrap().set_handler("click", "save");
        morph_children(&live, &target);
        let button = live.find("button").unwrap();
        assert_eq!(button.handler("click").as_deref(), Some("save"));
    }

    #[test]
    fn text_change_replaces_only_the_text() {
        let live = nodes("<p><b>keep</b>old</p>");
        let b = live.find("b").unwrap();
        morph_children(&live, &nodes("<p><b>keep</b>new</p>"));
        assert!(Node::ptr_eq(&b, &live.find("b").unwrap()));
        assert_eq!(live.find("p").unwrap().text_content(), "keepnew");
    }
}
