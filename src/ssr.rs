//! Server-side rendering: expand a component tree to markup, with each
//! host element carrying its serialized state for client hydration.
//!
//! The same template processing as the client runs here, just without a
//! tracking scope, so reads register nothing. Nested components are
//! expanded recursively instead of waiting for an upgrade; authored
//! children become their slot content exactly as on the client.

use std::rc::Rc;

use cairn_reactive::Value;
use thiserror::Error;

use crate::component::{Instance, Scope};
use crate::dom::Node;
use crate::registry::{self, ComponentDef};
use crate::{document, render};

#[derive(Debug, Error)]
pub enum SsrError {
    #[error("no component is defined for <{0}>")]
    UnknownComponent(String),
}

pub struct SsrOutput {
    /// The component's markup, hydration payloads included.
    pub html: String,
    /// Scoped styles for every component the output contains.
    pub styles: String,
    pub tag: String,
}

/// Render `<tag>` to markup with `data` merged over the component's
/// declared defaults. `data` should be a map; anything else is ignored.
pub fn render_to_string(tag: &str, data: &Value) -> Result<SsrOutput, SsrError> {
    let tag = tag.to_ascii_lowercase();
    let def =
        registry::definition(&tag).ok_or_else(|| SsrError::UnknownComponent(tag.clone()))?;
    let element = Node::element(&tag);
    let mut rendered_tags: Vec<String> = Vec::new();
    let mut instances: Vec<Rc<Instance>> = Vec::new();
    render_component(&element, &def, Some(data), &mut rendered_tags, &mut instances);
    let html = element.outer_html();
    for instance in instances {
        instance.teardown();
    }
    let styles = rendered_tags
        .iter()
        .filter_map(|tag| {
            let def = registry::definition(tag)?;
            if def.style.trim().is_empty() {
                return None;
            }
            Some(document::scoped_style(tag, &def.style))
        })
        .collect::<Vec<_>>()
        .join("\n");
    Ok(SsrOutput { html, styles, tag })
}

fn render_component(
    element: &Node,
    def: &Rc<ComponentDef>,
    data: Option<&Value>,
    rendered_tags: &mut Vec<String>,
    instances: &mut Vec<Rc<Instance>>,
) {
    if !rendered_tags.contains(&def.tag) {
        rendered_tags.push(def.tag.clone());
    }
    let instance = Instance::mount_floating(element, def);
    instances.push(instance.clone());
    if let Some(Value::Map(entries)) = data {
        for (key, value) in entries.borrow().iter() {
            instance.state.set_silent(key, value.clone());
        }
    }
    instance.run_ssr_hook();

    let template = def.template.clone_node(true);
    render::render_fragment(
        &template,
        &Scope::for_instance(instance.key),
        &instance.slots(),
    );
    element.clear_children();
    for child in template.child_nodes() {
        element.append_child(&child);
    }
    element.set_attr("data-ssr", &hydration_payload(&instance.state.root_value()));
    expand_nested(element, rendered_tags, instances);
}

/// Expand custom elements the render produced. Each takes over its own
/// subtree; everything between component boundaries is walked here.
fn expand_nested(
    root: &Node,
    rendered_tags: &mut Vec<String>,
    instances: &mut Vec<Rc<Instance>>,
) {
    for child in root.child_nodes() {
        if !child.is_element() {
            continue;
        }
        if let Some(tag) = child.tag() {
            if child.instance_key().is_none() {
                if let Some(def) = registry::definition(&tag) {
                    render_component(&child, &def, None, rendered_tags, instances);
                    continue;
                }
            }
        }
        expand_nested(&child, rendered_tags, instances);
    }
}

/// The serialized state a host element ships to the client. Properties
/// with a `_` or `$` prefix are private by convention and stay behind.
fn hydration_payload(state: &Value) -> String {
    let mut payload = serde_json::Map::new();
    if let Value::Map(entries) = state {
        for (key, value) in entries.borrow().iter() {
            if key.starts_with('_') || key.starts_with('$') {
                continue;
            }
            payload.insert(key.clone(), value.to_json());
        }
    }
    serde_json::Value::Object(payload).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn private_properties_stay_out_of_the_payload() {
        let mut entries = IndexMap::new();
        entries.insert("count".to_string(), Value::Int(3));
        entries.insert("_secret".to_string(), Value::str("no"));
        entries.insert("$handle".to_string(), Value::str("no"));
        let payload = hydration_payload(&Value::map(entries));
        assert_eq!(payload, r#"{"count":3}"#);
    }
}
