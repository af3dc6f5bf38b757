//! The live DOM tree the framework renders into and morphs in place.
//!
//! Browser-shaped on purpose: ordered attributes, parent/child links,
//! `clone_node`/`insert_before`/`replace_with`, `inner_html`/`outer_html`,
//! plus the two extensions the engine relies on — live element properties
//! (object-valued bindings, boolean IDL mirrors) and an out-of-band
//! rendering-scope marker for delegated event dispatch.

mod node;
mod parser;
mod serialize;

pub use node::{is_boolean_property, Node, BOOLEAN_ATTRIBUTES};
pub use parser::parse_fragment;
pub use serialize::{inner_html, outer_html};

impl Node {
    pub fn outer_html(&self) -> String {
        serialize::outer_html(self)
    }

    pub fn inner_html(&self) -> String {
        serialize::inner_html(self)
    }

    /// Replace the node's children with parsed markup.
    pub fn set_inner_html(&self, html: &str) {
        self.clear_children();
        for child in parser::parse_fragment(html).child_nodes() {
            self.append_child(&child);
        }
    }
}
