//! Server rendering and client hydration.

use cairn::{dom::parse_fragment, render_to_string, Component, Ctx, Document, Event, Value};

#[derive(Default)]
struct View;

impl Component for View {
    fn initialize(&mut self, ctx: &Ctx) {
        ctx.set("title", "Hello");
        ctx.set(
            "tags",
            Value::list(vec![Value::str("a"), Value::str("b")]),
        );
        ctx.set("hidden", false);
    }
}

const VIEW_TEMPLATE: &str = concat!(
    r#"<h1 x-text="title"></h1>"#,
    r#"<ul><li x-for="t in tags" x-text="t"></li></ul>"#,
    r#"<p x-show="hidden">secret</p>"#,
);

#[test]
fn server_output_matches_client_render() {
    let doc = Document::new();
    doc.define("s1-view", VIEW_TEMPLATE, "", || Box::new(View));
    doc.mount("<s1-view></s1-view>");
    let client_inner = doc.body().find("s1-view").unwrap().inner_html();

    let output = render_to_string("s1-view", &Value::empty_map()).unwrap();
    let parsed = parse_fragment(&output.html);
    let root = parsed.first_element_child().unwrap();
    assert!(root.attr("data-ssr").is_some());
    assert_eq!(root.inner_html(), client_inner);
}

#[test]
fn unknown_tag_is_an_error() {
    assert!(render_to_string("s0-nope", &Value::Null).is_err());
}

#[derive(Default)]
struct HCounter;

impl Component for HCounter {
    fn initialize(&mut self, ctx: &Ctx) {
        ctx.set("count", 0);
    }

    fn has_method(&self, name: &str) -> bool {
        name == "increment"
    }

    fn call(&mut self, ctx: &Ctx, method: &str, _args: &[Value]) -> Value {
        if method == "increment" {
            ctx.set("count", ctx.get("count").as_i64().unwrap_or(0) + 1);
        }
        Value::Null
    }
}

#[test]
fn hydration_restores_server_state() {
    let doc = Document::new();
    doc.define(
        "s2-counter",
        r#"<button @click="increment" x-text="count"></button>"#,
        "",
        || Box::new(HCounter),
    );
    let mut data = indexmap::IndexMap::new();
    data.insert("count".to_string(), Value::Int(5));
    let output = render_to_string("s2-counter", &Value::map(data)).unwrap();
    assert!(output.html.contains("data-ssr="));
    assert!(output.html.contains(">5</button>"));

    doc.mount(&output.html);
    let host = doc.body().find("s2-counter").unwrap();
    assert!(!host.has_attr("data-ssr"), "payload is consumed at upgrade");
    let button = doc.body().find("button").unwrap();
    assert_eq!(button.text_content(), "5", "server state wins over defaults");

    doc.dispatch(&Event::new("click", &button));
    doc.flush();
    assert_eq!(button.text_content(), "6");
}

#[test]
fn hydration_keeps_served_nodes_in_place() {
    let doc = Document::new();
    doc.define("s2b-view", VIEW_TEMPLATE, "", || Box::new(View));
    let output = render_to_string("s2b-view", &Value::empty_map()).unwrap();

    doc.mount(&output.html);
    // grab the nodes as parsed from the server markup, then hydrate again
    let h1 = doc.body().find("h1").unwrap();
    let lis = doc.body().find_all("li");
    doc.flush();
    assert!(cairn::Node::ptr_eq(&h1, &doc.body().find("h1").unwrap()));
    assert_eq!(doc.body().find_all("li").len(), lis.len());
}

#[derive(Default)]
struct PageChild;

impl Component for PageChild {
    fn initialize(&mut self, ctx: &Ctx) {
        ctx.set("label", "");
        ctx.set("n", 0);
    }
}

#[derive(Default)]
struct Page;

impl Component for Page {
    fn initialize(&mut self, ctx: &Ctx) {
        ctx.set("count", 7);
    }
}

#[test]
fn nested_components_expand_with_their_own_payloads() {
    let doc = Document::new();
    doc.define(
        "s3-child",
        r#"<b x-text="label + n"></b>"#,
        "",
        || Box::new(PageChild),
    );
    doc.define(
        "s3-page",
        r#"<s3-child :n="count" label="static"></s3-child>"#,
        "",
        || Box::new(Page),
    );
    drop(doc);

    let output = render_to_string("s3-page", &Value::empty_map()).unwrap();
    assert!(output.html.contains("static7"));
    let parsed = parse_fragment(&output.html);
    let child = parsed.find("s3-child").unwrap();
    let payload: serde_json::Value =
        serde_json::from_str(&child.attr("data-ssr").unwrap()).unwrap();
    assert_eq!(payload["n"], serde_json::json!(7));
    assert_eq!(payload["label"], serde_json::json!("static"));
}

#[derive(Default)]
struct Card;

impl Component for Card {}

#[derive(Default)]
struct CardPage;

impl Component for CardPage {
    fn initialize(&mut self, ctx: &Ctx) {
        ctx.set("msg", "hi");
    }
}

#[test]
fn slot_content_renders_on_the_server() {
    let doc = Document::new();
    doc.define(
        "s4-card",
        r#"<div class="card"><slot></slot></div>"#,
        "",
        || Box::new(Card),
    );
    doc.define(
        "s4-page",
        r#"<s4-card><p x-text="msg"></p></s4-card>"#,
        "",
        || Box::new(CardPage),
    );
    drop(doc);

    let output = render_to_string("s4-page", &Value::empty_map()).unwrap();
    let parsed = parse_fragment(&output.html);
    let card = parsed.find("div").unwrap();
    assert!(card.find("slot").is_none(), "no slot element in served markup");
    assert_eq!(card.find("p").unwrap().text_content(), "hi");
    assert!(
        card.children().iter().any(|c| c.tag().as_deref() == Some("p")),
        "content takes the slot's place in the tree"
    );
}

#[test]
fn hydrated_slot_content_survives_the_first_render() {
    let doc = Document::new();
    doc.define(
        "s6-card",
        r#"<div class="card"><slot></slot></div>"#,
        "",
        || Box::new(Card),
    );
    doc.define(
        "s6-page",
        r#"<s6-card><p x-text="msg"></p></s6-card>"#,
        "",
        || Box::new(CardPage),
    );
    let output = render_to_string("s6-page", &Value::empty_map()).unwrap();

    doc.mount(&output.html);
    doc.flush();
    let card = doc.body().find("div").unwrap();
    assert!(card.find("slot").is_none());
    assert_eq!(card.find("p").unwrap().text_content(), "hi");
}

#[derive(Default)]
struct Styled;

impl Component for Styled {}

#[test]
fn styles_come_back_scoped() {
    let doc = Document::new();
    doc.define("s5-styled", "<p>x</p>", "p { color: red; }", || {
        Box::new(Styled)
    });
    drop(doc);

    let output = render_to_string("s5-styled", &Value::Null).unwrap();
    assert!(output.styles.contains("@layer s5-styled"));
    assert!(output.styles.contains("color: red"));
    assert_eq!(output.tag, "s5-styled");
}
