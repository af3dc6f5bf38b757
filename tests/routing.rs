//! Routing end to end: resolving locations into mounted components.

use std::cell::RefCell;
use std::rc::Rc;

use cairn::{Component, Ctx, Document, Router};

#[derive(Default)]
struct Home;

impl Component for Home {}

#[derive(Default)]
struct Post;

impl Component for Post {
    fn initialize(&mut self, ctx: &Ctx) {
        ctx.set("id", "");
    }
}

#[derive(Default)]
struct Missing;

impl Component for Missing {}

fn routed_document(prefix: &str) -> (Document, Rc<Router>) {
    let doc = Document::new();
    doc.define(
        &format!("{prefix}-home"),
        "<h1>home</h1>",
        "",
        || Box::new(Home),
    );
    doc.define(
        &format!("{prefix}-post"),
        r#"<h1 x-text="id"></h1>"#,
        "",
        || Box::new(Post),
    );
    doc.define(
        &format!("{prefix}-missing"),
        "<h1>missing</h1>",
        "",
        || Box::new(Missing),
    );
    let router = Rc::new(Router::new());
    router.route("/", &format!("{prefix}-home"));
    router.route("/posts/:id", &format!("{prefix}-post"));
    router.not_found(&format!("{prefix}-missing"));
    doc.install_router(router.clone());
    doc.mount("<router-view></router-view>");
    (doc, router)
}

#[test]
fn navigation_renders_into_the_view() {
    let (doc, router) = routed_document("r1");
    doc.navigate("/");
    let view = doc.body().find("router-view").unwrap();
    assert!(view.find("r1-home").is_some());
    assert_eq!(view.find("h1").unwrap().text_content(), "home");
    assert_eq!(router.current().unwrap().pattern, "/");
}

#[test]
fn params_become_component_state() {
    let (doc, _router) = routed_document("r2");
    doc.navigate("/posts/42");
    let h1 = doc.body().find("h1").unwrap();
    assert_eq!(h1.text_content(), "42");
}

#[test]
fn navigating_away_replaces_and_retires_the_old_view() {
    let (doc, router) = routed_document("r3");
    doc.navigate("/posts/7");
    assert!(doc.body().find("r3-post").is_some());

    doc.navigate("/");
    assert!(doc.body().find("r3-post").is_none());
    assert!(doc.body().find("r3-home").is_some());
    assert_eq!(router.current().unwrap().tag, "r3-home");
}

#[test]
fn unmatched_locations_render_the_not_found_component() {
    let (doc, router) = routed_document("r4");
    let misses: Rc<RefCell<Vec<String>>> = Rc::default();
    let log = misses.clone();
    router.on_not_found(move |path| log.borrow_mut().push(path.to_string()));

    doc.navigate("/nope/really");
    assert_eq!(doc.body().find("h1").unwrap().text_content(), "missing");
    assert_eq!(misses.borrow().as_slice(), ["/nope/really"]);
    assert!(router.current().is_none());
}

#[test]
fn navigation_listeners_see_the_match() {
    let (doc, router) = routed_document("r5");
    let seen: Rc<RefCell<Vec<(String, String)>>> = Rc::default();
    let log = seen.clone();
    router.on_navigate(move |m| {
        log.borrow_mut()
            .push((m.pattern.clone(), m.params.get("id").cloned().unwrap_or_default()));
    });

    doc.navigate("/posts/9");
    doc.navigate("/");
    let seen = seen.borrow();
    assert_eq!(seen[0], ("/posts/:id".to_string(), "9".to_string()));
    assert_eq!(seen[1], ("/".to_string(), String::new()));
}

#[test]
fn query_pairs_arrive_as_a_map_property() {
    let doc = Document::new();
    doc.define(
        "r6-search",
        r#"<p x-text="query.tab"></p>"#,
        "",
        || Box::new(Home),
    );
    let router = Rc::new(Router::new());
    router.route("/search", "r6-search");
    doc.install_router(router);
    doc.mount("<router-view></router-view>");

    doc.navigate("/search?tab=open&sort=new");
    assert_eq!(doc.body().find("p").unwrap().text_content(), "open");
}
