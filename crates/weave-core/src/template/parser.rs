//! Tolerant HTML parser producing the structural tree of a template.

use crate::dom::{is_raw_text, is_void};

/// A node of a structural template. Owns no live bindings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateNode {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<TemplateNode>,
    },
    Text(String),
    Comment(String),
}

struct Open {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<TemplateNode>,
}

/// Parse `markup` into a forest of template nodes.
///
/// Unmatched closing tags are dropped and unclosed elements are closed at the
/// end of input. Self-closing syntax on non-void elements yields an empty element.
pub(crate) fn parse(markup: &str) -> Vec<TemplateNode> {
    let mut parser = Parser {
        input: markup,
        pos: 0,
        stack: Vec::new(),
        roots: Vec::new(),
    };
    parser.run();
    parser.finish()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    stack: Vec<Open>,
    roots: Vec<TemplateNode>,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn push(&mut self, node: TemplateNode) {
        match self.stack.last_mut() {
            Some(open) => open.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn run(&mut self) {
        while self.pos < self.input.len() {
            let rest = self.rest();
            if let Some(body) = rest.strip_prefix("<!--") {
                let end = body.find("-->").unwrap_or(body.len());
                self.push(TemplateNode::Comment(body[..end].to_owned()));
                self.pos += 4 + (end + 3).min(body.len());
            } else if rest.starts_with("<!") {
                let end = rest.find('>').map_or(rest.len(), |i| i + 1);
                self.pos += end;
            } else if rest.starts_with("</") && starts_with_alpha(&rest[2..]) {
                self.close_tag();
            } else if rest.starts_with('<') && starts_with_alpha(&rest[1..]) {
                self.open_tag();
            } else {
                let skip = if rest.starts_with('<') { 1 } else { 0 };
                let end = rest[skip..].find('<').map_or(rest.len(), |i| i + skip);
                let text = decode_entities(&rest[..end]);
                self.pos += end;
                self.push_text(text);
            }
        }
    }

    fn push_text(&mut self, text: String) {
        let siblings = match self.stack.last_mut() {
            Some(open) => &mut open.children,
            None => &mut self.roots,
        };
        if let Some(TemplateNode::Text(previous)) = siblings.last_mut() {
            previous.push_str(&text);
        } else {
            siblings.push(TemplateNode::Text(text));
        }
    }

    fn read_name(&mut self) -> String {
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>' || c == '=')
            .unwrap_or(rest.len());
        self.pos += end;
        rest[..end].to_owned()
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    fn close_tag(&mut self) {
        self.pos += 2;
        let tag = self.read_name().to_ascii_lowercase();
        let rest = self.rest();
        self.pos += rest.find('>').map_or(rest.len(), |i| i + 1);
        if let Some(depth) = self.stack.iter().rposition(|open| open.tag == tag) {
            while self.stack.len() > depth {
                self.pop();
            }
        }
    }

    fn pop(&mut self) {
        if let Some(open) = self.stack.pop() {
            self.push(TemplateNode::Element {
                tag: open.tag,
                attributes: open.attributes,
                children: open.children,
            });
        }
    }

    fn open_tag(&mut self) {
        self.pos += 1;
        let tag = self.read_name().to_ascii_lowercase();
        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                break;
            }
            if let Some(after) = rest.strip_prefix("/>") {
                self.pos = self.input.len() - after.len();
                self_closing = true;
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }
            let name = self.read_name();
            if name.is_empty() {
                self.pos += rest.chars().next().map_or(1, char::len_utf8);
                continue;
            }
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.read_value()
            } else {
                String::new()
            };
            if !attributes.iter().any(|(existing, _)| *existing == name) {
                attributes.push((name, value));
            }
        }

        if is_void(&tag) || self_closing {
            self.push(TemplateNode::Element {
                tag,
                attributes,
                children: Vec::new(),
            });
            return;
        }
        if is_raw_text(&tag) {
            let rest = self.rest();
            let end = find_raw_end(rest, &tag).unwrap_or(rest.len());
            let raw = &rest[..end];
            let text = if tag == "script" || tag == "style" {
                raw.to_owned()
            } else {
                decode_entities(raw)
            };
            self.pos += end;
            let children = if text.is_empty() {
                Vec::new()
            } else {
                vec![TemplateNode::Text(text)]
            };
            self.stack.push(Open {
                tag,
                attributes,
                children,
            });
            return;
        }
        self.stack.push(Open {
            tag,
            attributes,
            children: Vec::new(),
        });
    }

    fn read_value(&mut self) -> String {
        let rest = self.rest();
        match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &rest[1..];
                let end = body.find(quote).unwrap_or(body.len());
                self.pos += 1 + end + usize::from(end < body.len());
                decode_entities(&body[..end])
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                self.pos += end;
                decode_entities(&rest[..end])
            }
        }
    }

    fn finish(mut self) -> Vec<TemplateNode> {
        while !self.stack.is_empty() {
            self.pop();
        }
        self.roots
    }
}

fn starts_with_alpha(text: &str) -> bool {
    text.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

fn find_raw_end(rest: &str, tag: &str) -> Option<usize> {
    let lower = rest.to_ascii_lowercase();
    let needle = format!("</{tag}");
    lower.find(&needle)
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').filter(|&semi| semi <= 10) {
            Some(semi) => {
                let entity = &tail[1..semi];
                match decode_entity(entity) {
                    Some(ch) => {
                        out.push(ch);
                        rest = &tail[semi + 1..];
                    }
                    None => {
                        out.push('&');
                        rest = &tail[1..];
                    }
                }
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: &str, children: Vec<TemplateNode>) -> TemplateNode {
        TemplateNode::Element {
            tag: tag.into(),
            attributes: Vec::new(),
            children,
        }
    }

    #[test]
    fn nested_elements_and_text() {
        let nodes = parse("<div><p>a &amp; b</p>tail</div>");
        assert_eq!(
            nodes,
            vec![element(
                "div",
                vec![
                    element("p", vec![TemplateNode::Text("a & b".into())]),
                    TemplateNode::Text("tail".into())
                ]
            )]
        );
    }

    #[test]
    fn self_closing_custom_element_is_normalized() {
        let nodes = parse("<x-item/><p>after</p>");
        assert_eq!(
            nodes,
            vec![
                element("x-item", Vec::new()),
                element("p", vec![TemplateNode::Text("after".into())])
            ]
        );
    }

    #[test]
    fn attributes_keep_their_case_and_order() {
        let nodes = parse("<input .valueProp=\"1\" @click='x' disabled>");
        let TemplateNode::Element { attributes, .. } = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(
            attributes,
            &vec![
                (".valueProp".to_string(), "1".to_string()),
                ("@click".to_string(), "x".to_string()),
                ("disabled".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn raw_text_is_not_parsed_as_markup() {
        let nodes = parse("<script>if (a < b) {}</script>");
        assert_eq!(
            nodes,
            vec![element(
                "script",
                vec![TemplateNode::Text("if (a < b) {}".into())]
            )]
        );
    }

    #[test]
    fn unmatched_close_is_ignored() {
        let nodes = parse("<p>x</span></p>");
        assert_eq!(nodes, vec![element("p", vec![TemplateNode::Text("x".into())])]);
    }

    #[test]
    fn comments_survive() {
        assert_eq!(
            parse("<!--weave:0-->"),
            vec![TemplateNode::Comment("weave:0".into())]
        );
    }
}
