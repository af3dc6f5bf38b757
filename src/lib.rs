//! Cairn is a reactive component framework built around three small
//! pieces: an observable state store with path-level dependency tracking,
//! a template renderer driven by directive attributes, and a reconciler
//! that morphs live DOM in place instead of diffing virtual trees.
//!
//! A component is a custom-element tag, a template, a style and a
//! [`Component`] behavior. Upgrading an element instantiates its state
//! bag; rendering the template registers exactly the state paths it
//! reads; writing a path schedules exactly the render passes that read
//! it. All deferred work runs on [`Document::flush`].
//!
//! ```no_run
//! use cairn::{Component, Ctx, Document, Event};
//!
//! #[derive(Default)]
//! struct Counter;
//!
//! impl Component for Counter {
//!     fn initialize(&mut self, ctx: &Ctx) {
//!         ctx.set("count", 0);
//!     }
//!     fn has_method(&self, name: &str) -> bool {
//!         name == "increment"
//!     }
//!     fn call(&mut self, ctx: &Ctx, method: &str, _args: &[cairn::Value]) -> cairn::Value {
//!         if method == "increment" {
//!             ctx.set("count", ctx.get("count").as_i64().unwrap_or(0) + 1);
//!         }
//!         cairn::Value::Null
//!     }
//! }
//!
//! let doc = Document::new();
//! doc.define(
//!     "x-counter",
//!     r#"<button @click="increment" x-text="count"></button>"#,
//!     "",
//!     || Box::new(Counter),
//! );
//! doc.mount("<x-counter></x-counter>");
//! let button = doc.body().find("button").unwrap();
//! doc.dispatch(&Event::new("click", &button));
//! doc.flush();
//! ```

pub mod component;
pub mod document;
pub mod dom;
pub mod eval;
pub mod event;
mod morph;
pub mod registry;
mod render;
pub mod router;
pub mod ssr;

pub use cairn_reactive as reactive;

pub use component::{Component, Ctx};
pub use document::Document;
pub use dom::Node;
pub use event::Event;
pub use reactive::{Store, Value};
pub use router::{RouteMatch, Router};
pub use ssr::{render_to_string, SsrError, SsrOutput};
