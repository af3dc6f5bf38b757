use super::node::{Node, NodeKind};
use super::parser::VOID_ELEMENTS;

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Serialized markup of the node itself (children only for fragments).
pub fn outer_html(node: &Node) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

/// Serialized markup of the node's children.
pub fn inner_html(node: &Node) -> String {
    let mut out = String::new();
    let raw = matches!(node.tag().as_deref(), Some(t) if RAW_TEXT_ELEMENTS.contains(&t));
    for child in node.child_nodes() {
        if raw {
            out.push_str(&child.text_content());
        } else {
            write_node(&child, &mut out);
        }
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    let data = node.0.borrow();
    match &data.kind {
        NodeKind::Text(t) => out.push_str(&escape_text(t)),
        NodeKind::Comment(t) => {
            out.push_str("<!--");
            out.push_str(t);
            out.push_str("-->");
        }
        NodeKind::Fragment => {
            for child in &data.children {
                write_node(child, out);
            }
        }
        NodeKind::Element { tag, attrs, .. } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&tag.as_str());
            for child in &data.children {
                if raw {
                    out.push_str(&child.text_content());
                } else {
                    write_node(child, out);
                }
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

pub(crate) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(crate) fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_fragment;

    #[test]
    fn round_trips_markup() {
        let src = r#"<div class="box"><span>a &amp; b</span><br><input type="text"></div>"#;
        let frag = parse_fragment(src);
        assert_eq!(outer_html(&frag), src);
    }

    #[test]
    fn inner_excludes_the_element_itself() {
        let frag = parse_fragment("<p><b>x</b>y</p>");
        let p = frag.find("p").unwrap();
        assert_eq!(inner_html(&p), "<b>x</b>y");
        assert_eq!(outer_html(&p), "<p><b>x</b>y</p>");
    }

    #[test]
    fn escapes_attribute_quotes() {
        let el = Node::element("div");
        el.set_attr("title", r#"say "hi""#);
        assert_eq!(outer_html(&el), r#"<div title="say &quot;hi&quot;"></div>"#);
    }
}
