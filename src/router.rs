//! Location-to-component routing.
//!
//! Patterns are segment lists, literal or `:param`. Resolution splits the
//! location into path and query, matches segment-wise against the routes
//! in registration order, and yields a [`RouteMatch`] carrying decoded
//! params and query pairs. The document renders the matched component
//! into `router-view` containers and notifies listeners.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

enum Segment {
    Literal(String),
    Param(String),
}

struct Route {
    pattern: String,
    segments: Vec<Segment>,
    tag: String,
}

/// A resolved location.
#[derive(Clone, Debug)]
pub struct RouteMatch {
    pub pattern: String,
    pub tag: String,
    pub path: String,
    pub params: IndexMap<String, String>,
    pub query: IndexMap<String, String>,
}

type NavigateListener = Rc<dyn Fn(&RouteMatch)>;
type NotFoundListener = Rc<dyn Fn(&str)>;

#[derive(Default)]
pub struct Router {
    routes: RefCell<Vec<Route>>,
    not_found_tag: RefCell<Option<String>>,
    current: RefCell<Option<RouteMatch>>,
    navigate_listeners: RefCell<Vec<NavigateListener>>,
    not_found_listeners: RefCell<Vec<NotFoundListener>>,
}

impl Router {
    pub fn new() -> Router {
        Router::default()
    }

    /// Register `pattern` (e.g. `/posts/:id`) to render `tag`. Routes
    /// match in registration order.
    pub fn route(&self, pattern: &str, tag: &str) -> &Self {
        let segments = split_path(pattern)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();
        self.routes.borrow_mut().push(Route {
            pattern: pattern.to_string(),
            segments,
            tag: tag.to_ascii_lowercase(),
        });
        self
    }

    /// The component rendered when nothing matches.
    pub fn not_found(&self, tag: &str) -> &Self {
        *self.not_found_tag.borrow_mut() = Some(tag.to_ascii_lowercase());
        self
    }

    pub fn on_navigate(&self, listener: impl Fn(&RouteMatch) + 'static) {
        self.navigate_listeners.borrow_mut().push(Rc::new(listener));
    }

    pub fn on_not_found(&self, listener: impl Fn(&str) + 'static) {
        self.not_found_listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Match `location` (path plus optional `?query`) against the route
    /// table without side effects.
    pub fn resolve(&self, location: &str) -> Option<RouteMatch> {
        let (path, query_string) = match location.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (location, None),
        };
        let segments: Vec<&str> = split_path(path).collect();
        let routes = self.routes.borrow();
        let route = routes.iter().find_map(|route| {
            let mut params = IndexMap::new();
            if route.segments.len() != segments.len() {
                return None;
            }
            for (pattern, actual) in route.segments.iter().zip(&segments) {
                match pattern {
                    Segment::Literal(expected) if expected == actual => {}
                    Segment::Param(name) => {
                        params.insert(name.clone(), percent_decode(actual));
                    }
                    _ => return None,
                }
            }
            Some((route, params))
        });
        let (route, params) = route?;
        Some(RouteMatch {
            pattern: route.pattern.clone(),
            tag: route.tag.clone(),
            path: path.to_string(),
            params,
            query: parse_query(query_string.unwrap_or("")),
        })
    }

    pub fn not_found_tag(&self) -> Option<String> {
        self.not_found_tag.borrow().clone()
    }

    pub fn current(&self) -> Option<RouteMatch> {
        self.current.borrow().clone()
    }

    pub(crate) fn record_navigation(&self, matched: &RouteMatch) {
        debug!(path = matched.path, tag = matched.tag, "navigated");
        *self.current.borrow_mut() = Some(matched.clone());
        for listener in self.navigate_listeners.borrow().iter() {
            listener(matched);
        }
    }

    pub(crate) fn record_not_found(&self, path: &str) {
        debug!(path, "no route matched");
        *self.current.borrow_mut() = None;
        for listener in self.not_found_listeners.borrow().iter() {
            listener(path);
        }
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn parse_query(query: &str) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        out.insert(percent_decode(name), percent_decode(value));
    }
    out
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        let router = Router::new();
        router.route("/", "home-page");
        router.route("/posts/:id", "post-page");
        router.route("/posts/:id/comments/:comment", "comment-page");
        router
    }

    #[test]
    fn literal_and_param_matching() {
        let router = router();
        assert_eq!(router.resolve("/").unwrap().tag, "home-page");
        let post = router.resolve("/posts/42").unwrap();
        assert_eq!(post.tag, "post-page");
        assert_eq!(post.params.get("id").map(String::as_str), Some("42"));
        assert!(router.resolve("/posts").is_none());
        assert!(router.resolve("/nope").is_none());
    }

    #[test]
    fn multiple_params() {
        let matched = router().resolve("/posts/7/comments/3").unwrap();
        assert_eq!(matched.params.get("id").map(String::as_str), Some("7"));
        assert_eq!(matched.params.get("comment").map(String::as_str), Some("3"));
        assert_eq!(matched.pattern, "/posts/:id/comments/:comment");
    }

    #[test]
    fn query_pairs_are_decoded() {
        let matched = router().resolve("/posts/1?tab=all&q=hello+world&x=a%2Fb").unwrap();
        assert_eq!(matched.query.get("tab").map(String::as_str), Some("all"));
        assert_eq!(matched.query.get("q").map(String::as_str), Some("hello world"));
        assert_eq!(matched.query.get("x").map(String::as_str), Some("a/b"));
    }

    #[test]
    fn params_are_decoded() {
        let matched = router().resolve("/posts/a%20b").unwrap();
        assert_eq!(matched.params.get("id").map(String::as_str), Some("a b"));
    }

    #[test]
    fn registration_order_wins() {
        let router = Router::new();
        router.route("/posts/new", "new-post");
        router.route("/posts/:id", "post-page");
        assert_eq!(router.resolve("/posts/new").unwrap().tag, "new-post");
        assert_eq!(router.resolve("/posts/9").unwrap().tag, "post-page");
    }

    #[test]
    fn trailing_slash_is_tolerated() {
        assert_eq!(router().resolve("/posts/5/").unwrap().tag, "post-page");
    }
}
