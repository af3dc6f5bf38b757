use super::node::Node;

/// Tags that never have children and take no closing tag.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose content is raw text up to the matching close tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Parse an HTML fragment into a detached fragment node.
///
/// Browser-style recovery, not validation: mismatched close tags pop to the
/// nearest matching open element or are dropped, unknown syntax is treated
/// as text. Whitespace-only text between elements is not materialized.
pub fn parse_fragment(input: &str) -> Node {
    Parser {
        input: input.as_bytes(),
        pos: 0,
    }
    .parse()
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn parse(&mut self) -> Node {
        let root = Node::fragment();
        let mut stack: Vec<Node> = vec![root.clone()];

        while self.pos < self.input.len() {
            if self.peek_str("<!--") {
                self.pos += 4;
                let comment = self.consume_until("-->");
                self.pos += 3.min(self.input.len() - self.pos);
                last(&stack).append_child(&Node::comment(&comment));
            } else if self.peek_str("<!") {
                // doctype or malformed declaration
                self.consume_until(">");
                self.pos += 1.min(self.input.len() - self.pos);
            } else if self.peek_str("</") {
                self.pos += 2;
                let name = self.consume_name().to_ascii_lowercase();
                self.consume_until(">");
                self.pos += 1.min(self.input.len() - self.pos);
                if let Some(depth) = stack
                    .iter()
                    .rposition(|n| n.tag().as_deref() == Some(name.as_str()))
                {
                    stack.truncate(depth.max(1));
                }
            } else if self.peek_str("<") && self.is_tag_start() {
                self.pos += 1;
                let name = self.consume_name().to_ascii_lowercase();
                let element = Node::element(&name);
                self.consume_attributes(&element);
                let self_closed = self.peek_str("/>");
                if self_closed {
                    self.pos += 2;
                } else if self.peek_str(">") {
                    self.pos += 1;
                }
                last(&stack).append_child(&element);
                if !self_closed && !VOID_ELEMENTS.contains(&name.as_str()) {
                    if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                        let close = format!("</{name}");
                        let content = self.consume_until(&close);
                        self.pos += close.len().min(self.input.len() - self.pos);
                        self.consume_until(">");
                        self.pos += 1.min(self.input.len() - self.pos);
                        if !content.is_empty() {
                            element.append_child(&Node::text(&content));
                        }
                    } else {
                        stack.push(element);
                    }
                }
            } else {
                let text = self.consume_text();
                if !text.trim().is_empty() {
                    last(&stack).append_child(&Node::text(&decode_entities(&text)));
                }
            }
        }
        root
    }

    fn peek_str(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s.as_bytes())
    }

    /// `<` only opens a tag when followed by a name character.
    fn is_tag_start(&self) -> bool {
        matches!(self.input.get(self.pos + 1), Some(c) if c.is_ascii_alphabetic())
    }

    fn consume_name(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.input.len() {
            let c = self.input[self.pos];
            if c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn consume_until(&mut self, delimiter: &str) -> String {
        let remaining = &self.input[self.pos..];
        let end = find_ignore_case(remaining, delimiter.as_bytes()).unwrap_or(remaining.len());
        let out = String::from_utf8_lossy(&remaining[..end]).into_owned();
        self.pos += end;
        out
    }

    fn consume_text(&mut self) -> String {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.input.len() && self.input[self.pos] != b'<' {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn consume_attributes(&mut self, element: &Node) {
        loop {
            self.skip_whitespace();
            match self.input.get(self.pos) {
                None | Some(b'>') => break,
                Some(b'/') if self.peek_str("/>") => break,
                _ => {}
            }
            let name = self.consume_attr_name();
            if name.is_empty() {
                self.pos += 1;
                continue;
            }
            self.skip_whitespace();
            let value = if self.peek_str("=") {
                self.pos += 1;
                self.skip_whitespace();
                match self.input.get(self.pos) {
                    Some(&quote @ (b'"' | b'\'')) => {
                        self.pos += 1;
                        let start = self.pos;
                        while self.pos < self.input.len() && self.input[self.pos] != quote {
                            self.pos += 1;
                        }
                        let v = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
                        self.pos += 1.min(self.input.len() - self.pos);
                        v
                    }
                    _ => {
                        let start = self.pos;
                        while self.pos < self.input.len()
                            && !self.input[self.pos].is_ascii_whitespace()
                            && self.input[self.pos] != b'>'
                        {
                            self.pos += 1;
                        }
                        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
                    }
                }
            } else {
                String::new()
            };
            element.set_attr(&name, &decode_entities(&value));
        }
    }

    fn consume_attr_name(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.input.len() {
            let c = self.input[self.pos];
            if c.is_ascii_whitespace() || c == b'=' || c == b'>' || (c == b'/' && self.peek_str("/>"))
            {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }
}

fn last(stack: &[Node]) -> Node {
    stack.last().expect("parser stack is never empty").clone()
}

fn find_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

pub(crate) fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let semi = rest.find(';');
        match semi {
            Some(end) if end <= 8 => {
                let entity = &rest[1..end];
                let decoded = match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => entity
                        .strip_prefix('#')
                        .and_then(|n| n.parse::<u32>().ok())
                        .and_then(char::from_u32),
                };
                match decoded {
                    Some(c) => {
                        out.push(c);
                        rest = &rest[end + 1..];
                    }
                    None => {
                        out.push('&');
                        rest = &rest[1..];
                    }
                }
            }
            _ => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
