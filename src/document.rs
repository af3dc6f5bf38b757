//! The top-level handle an application drives the framework through: a
//! document body, the component definitions with their scoped styles, the
//! flush cycle, and optional routing.

use std::cell::RefCell;
use std::rc::Rc;

use cairn_reactive::{Runtime, Value};
use tracing::warn;

use crate::component::Component;
use crate::dom::Node;
use crate::event::{self, Event};
use crate::registry;
use crate::router::Router;

pub struct Document {
    body: Node,
    styles: RefCell<Vec<String>>,
    router: RefCell<Option<Rc<Router>>>,
}

impl Default for Document {
    fn default() -> Document {
        Document::new()
    }
}

impl Document {
    pub fn new() -> Document {
        let body = Node::element("body");
        body.mark_document_root();
        Document {
            body,
            styles: RefCell::new(Vec::new()),
            router: RefCell::new(None),
        }
    }

    pub fn body(&self) -> Node {
        self.body.clone()
    }

    /// Define a component and collect its style, scoped to the tag.
    pub fn define(
        &self,
        tag: &str,
        template: &str,
        style: &str,
        factory: impl Fn() -> Box<dyn Component> + 'static,
    ) {
        registry::define(tag, template, style, factory);
        if !style.trim().is_empty() {
            self.styles
                .borrow_mut()
                .push(scoped_style(&tag.to_ascii_lowercase(), style));
        }
    }

    /// Replace the body content with `html` and bring any custom elements
    /// in it to life.
    pub fn mount(&self, html: &str) {
        self.body.set_inner_html(html);
        registry::upgrade_tree(&self.body);
        self.flush();
    }

    /// Run all deferred render work, then retire instances whose elements
    /// have left the tree. The equivalent of letting the task queue drain.
    pub fn flush(&self) {
        Runtime::drain_pending_work();
        registry::sweep_disconnected();
    }

    /// Dispatch a synthetic event into the tree. Pair with [`Document::flush`]
    /// to observe the renders it provokes.
    pub fn dispatch(&self, event: &Event) {
        event::dispatch(event);
    }

    /// Every scoped component style defined so far, in definition order.
    pub fn style_sheet(&self) -> String {
        self.styles.borrow().join("\n")
    }

    pub fn install_router(&self, router: Rc<Router>) {
        *self.router.borrow_mut() = Some(router);
    }

    pub fn router(&self) -> Option<Rc<Router>> {
        self.router.borrow().clone()
    }

    /// Resolve `location` and render the matched component into every
    /// `<router-view>` in the body. Route params become typed properties
    /// of the created element; the query map lands in a `query` property.
    pub fn navigate(&self, location: &str) {
        let Some(router) = self.router() else {
            warn!(location, "navigate without an installed router");
            return;
        };
        match router.resolve(location) {
            Some(matched) => {
                self.render_route(&matched.tag, Some(&matched));
                router.record_navigation(&matched);
            }
            None => {
                let path = location.split('?').next().unwrap_or(location).to_string();
                if let Some(tag) = router.not_found_tag() {
                    self.render_route(&tag, None);
                }
                router.record_not_found(&path);
            }
        }
    }

    fn render_route(&self, tag: &str, matched: Option<&crate::router::RouteMatch>) {
        for view in self.body.find_all("router-view") {
            let element = Node::element(tag);
            if let Some(matched) = matched {
                for (name, value) in &matched.params {
                    element.set_prop(name, Value::str(value));
                }
                if !matched.query.is_empty() {
                    let query = matched
                        .query
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::str(v)))
                        .collect();
                    element.set_prop("query", Value::map(query));
                }
            }
            view.clear_children();
            view.append_child(&element);
            registry::upgrade(&element);
        }
        self.flush();
    }
}

/// Wrap a component's style so it applies under its tag and releases its
/// grip inside nested component boundaries, which carry the `x-scope`
/// marker.
pub(crate) fn scoped_style(tag: &str, css: &str) -> String {
    format!(
        "@layer {tag} {{\n{tag} {{\n{css}\n}}\n}}\n{tag} [x-scope], {tag} [x-scope] * {{ all: revert-layer; }}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styles_are_scoped_under_the_tag() {
        let sheet = scoped_style("x-card", "p { color: red; }");
        assert!(sheet.starts_with("@layer x-card {"));
        assert!(sheet.contains("x-card [x-scope], x-card [x-scope] * { all: revert-layer; }"));
    }
}
