//! A tolerant markup tree. Parsing never fails: stray closing tags are
//! dropped, unclosed elements are closed at end of input, and a `<` that does
//! not start a tag is kept as text.
//!
//! Text and attribute values are stored decoded. Character references are
//! resolved on parse and escaped again on serialize, except inside raw-text
//! elements such as `<style>`, whose content is kept verbatim.

use std::{borrow::Cow, fmt::Write as _};

use quick_xml::escape::{escape, partial_escape, resolve_html5_entity, unescape_with};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

const MAX_REFERENCE_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, Option<String>)>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_deref().unwrap_or(""))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(key, _)| key == name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn set_attr(&mut self, name: &str, value: Option<String>) {
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Doctype(String),
    Comment(String),
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena-backed document tree. Nodes detached by edits stay in the arena but
/// are unreachable from the root.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupTree {
    nodes: Vec<Node>,
}

impl Default for MarkupTree {
    fn default() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }
}

/// Result of a best-effort parse.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub tree: MarkupTree,
    /// Number of structural problems that were repaired.
    pub recovered: usize,
}

impl MarkupTree {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.node(id).map(|node| &node.kind) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.nodes.get_mut(id.0).map(|node| &mut node.kind) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    /// Whether `id` is still attached to the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root() {
                return true;
            }
            let Some(parent) = self.parent(current) else {
                return false;
            };
            let Some(parent_node) = self.node(parent) else {
                return false;
            };
            if !parent_node.children.contains(&current) {
                return false;
            }
            current = parent;
        }
    }

    /// Attached elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            if matches!(node.kind, NodeKind::Element(_)) {
                out.push(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            match &node.kind {
                NodeKind::Text(text) => out.push_str(text),
                NodeKind::Element(_) | NodeKind::Root => {
                    stack.extend(node.children.iter().rev().copied());
                }
                NodeKind::Doctype(_) | NodeKind::Comment(_) => {}
            }
        }
        out
    }

    /// Replace all children of `id` with a single text node.
    pub fn replace_children_with_text(&mut self, id: NodeId, text: &str) -> bool {
        if self.element(id).is_none() {
            return false;
        }
        let text_id = self.push(NodeKind::Text(text.to_string()), Some(id));
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.children = vec![text_id];
        }
        true
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
        });
        id
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.push(kind, Some(parent));
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(id);
        }
        id
    }

    pub fn parse(input: &str) -> ParseOutcome {
        Parser::new(input).run()
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<Step> = match self.node(self.root()) {
            Some(root) => root.children.iter().rev().map(|id| Step::Open(*id)).collect(),
            None => Vec::new(),
        };

        while let Some(step) = stack.pop() {
            let id = match step {
                Step::Open(id) => id,
                Step::Close(id) => {
                    if let Some(element) = self.element(id) {
                        let _ = write!(out, "</{}>", element.tag);
                    }
                    continue;
                }
            };
            let Some(node) = self.node(id) else { continue };
            match &node.kind {
                NodeKind::Root => {}
                NodeKind::Doctype(body) => {
                    let _ = write!(out, "<!{body}>");
                }
                NodeKind::Comment(body) => {
                    let _ = write!(out, "<!--{body}-->");
                }
                NodeKind::Text(text) => {
                    if self.in_raw_text(id) {
                        out.push_str(text);
                    } else {
                        out.push_str(&partial_escape(text.as_str()));
                    }
                }
                NodeKind::Element(element) => {
                    out.push('<');
                    out.push_str(&element.tag);
                    for (name, value) in &element.attrs {
                        out.push(' ');
                        out.push_str(name);
                        if let Some(value) = value {
                            let _ = write!(out, "=\"{}\"", escape(value.as_str()));
                        }
                    }
                    out.push('>');
                    if is_void(&element.tag) {
                        continue;
                    }
                    stack.push(Step::Close(id));
                    stack.extend(node.children.iter().rev().map(|child| Step::Open(*child)));
                }
            }
        }
        out
    }

    fn in_raw_text(&self, id: NodeId) -> bool {
        self.parent(id)
            .and_then(|parent| self.element(parent))
            .is_some_and(|element| is_raw_text(&element.tag))
    }
}

enum Step {
    Open(NodeId),
    Close(NodeId),
}

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    tree: MarkupTree,
    stack: Vec<(NodeId, String)>,
    recovered: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            tree: MarkupTree::default(),
            stack: Vec::new(),
            recovered: 0,
        }
    }

    fn current_parent(&self) -> NodeId {
        self.stack
            .last()
            .map(|(id, _)| *id)
            .unwrap_or_else(|| self.tree.root())
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn run(mut self) -> ParseOutcome {
        while self.pos < self.input.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.comment();
            } else if rest.starts_with("</") {
                self.close_tag();
            } else if rest.starts_with("<!") {
                self.doctype();
            } else if rest.starts_with('<') && starts_tag_name(&rest[1..]) {
                self.open_tag();
            } else {
                self.text();
            }
        }
        self.recovered += self.stack.len();
        ParseOutcome {
            tree: self.tree,
            recovered: self.recovered,
        }
    }

    fn text(&mut self) {
        let rest = self.rest();
        // A leading '<' that did not open a tag is literal text.
        let skip = usize::from(rest.starts_with('<'));
        let end = rest[skip..]
            .find('<')
            .map(|offset| offset + skip)
            .unwrap_or(rest.len());
        let text = decode_entities(&rest[..end]).into_owned();
        self.pos += end;
        let parent = self.current_parent();
        self.tree.append(parent, NodeKind::Text(text));
    }

    fn comment(&mut self) {
        let body_start = self.pos + 4;
        let (body, next) = match self.input[body_start..].find("-->") {
            Some(offset) => (&self.input[body_start..body_start + offset], body_start + offset + 3),
            None => {
                self.recovered += 1;
                (&self.input[body_start..], self.input.len())
            }
        };
        let parent = self.current_parent();
        self.tree.append(parent, NodeKind::Comment(body.to_string()));
        self.pos = next;
    }

    fn doctype(&mut self) {
        let body_start = self.pos + 2;
        let (body, next) = match self.input[body_start..].find('>') {
            Some(offset) => (&self.input[body_start..body_start + offset], body_start + offset + 1),
            None => {
                self.recovered += 1;
                (&self.input[body_start..], self.input.len())
            }
        };
        let parent = self.current_parent();
        self.tree.append(parent, NodeKind::Doctype(body.to_string()));
        self.pos = next;
    }

    fn close_tag(&mut self) {
        let name_start = self.pos + 2;
        let end = self.input[name_start..]
            .find('>')
            .map(|offset| name_start + offset)
            .unwrap_or(self.input.len());
        let name = self.input[name_start..end].trim().to_ascii_lowercase();
        self.pos = (end + 1).min(self.input.len());

        match self.stack.iter().rposition(|(_, tag)| *tag == name) {
            Some(index) => {
                // Anything opened after the matching element was never closed.
                self.recovered += self.stack.len() - index - 1;
                self.stack.truncate(index);
            }
            None => self.recovered += 1,
        }
    }

    fn open_tag(&mut self) {
        let start = self.pos + 1;
        let bytes = self.input.as_bytes();
        let mut i = start;
        while i < bytes.len() && is_name_byte(bytes[i]) {
            i += 1;
        }
        let tag = self.input[start..i].to_ascii_lowercase();

        let mut attrs = Vec::new();
        let mut self_closing = false;
        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() {
                self.recovered += 1;
                break;
            }
            match bytes[i] {
                b'>' => {
                    i += 1;
                    break;
                }
                b'/' => {
                    self_closing = true;
                    i += 1;
                }
                _ => {
                    let name_start = i;
                    while i < bytes.len()
                        && !bytes[i].is_ascii_whitespace()
                        && !matches!(bytes[i], b'=' | b'>' | b'/')
                    {
                        i += 1;
                    }
                    let name = self.input[name_start..i].to_ascii_lowercase();
                    let mut value = None;
                    if i < bytes.len() && bytes[i] == b'=' {
                        i += 1;
                        let (parsed, next) = attr_value(self.input, i);
                        value = Some(decode_entities(parsed).into_owned());
                        i = next;
                    }
                    if !name.is_empty() {
                        attrs.push((name, value));
                    }
                }
            }
        }
        self.pos = i;

        let parent = self.current_parent();
        let id = self
            .tree
            .append(parent, NodeKind::Element(Element { tag: tag.clone(), attrs }));

        if self_closing || is_void(&tag) {
            return;
        }

        if is_raw_text(&tag) {
            let closing = format!("</{tag}");
            let rest = self.rest();
            let end = find_ascii_case_insensitive(rest, &closing).unwrap_or(rest.len());
            if end > 0 {
                self.tree.append(id, NodeKind::Text(rest[..end].to_string()));
            }
            self.pos += end;
            if self.pos >= self.input.len() {
                self.recovered += 1;
            } else {
                let after = self.rest();
                let close = after.find('>').map(|o| o + 1).unwrap_or(after.len());
                self.pos += close;
            }
            return;
        }

        self.stack.push((id, tag));
    }
}

fn starts_tag_name(rest: &str) -> bool {
    rest.as_bytes()
        .first()
        .is_some_and(|b| b.is_ascii_alphabetic())
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

fn attr_value(input: &str, start: usize) -> (&str, usize) {
    let bytes = input.as_bytes();
    match bytes.get(start) {
        Some(&quote @ (b'"' | b'\'')) => {
            let body_start = start + 1;
            match input[body_start..].find(quote as char) {
                Some(offset) => (
                    &input[body_start..body_start + offset],
                    body_start + offset + 1,
                ),
                None => (&input[body_start..], input.len()),
            }
        }
        _ => {
            let mut i = start;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                i += 1;
            }
            (&input[start..i], i)
        }
    }
}

/// Resolve character references. A bare `&` or an unknown entity stays
/// literal instead of failing the whole run.
fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    if let Ok(decoded) = unescape_with(raw, resolve_html5_entity) {
        return decoded;
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let reference = tail
            .find(';')
            .filter(|semi| *semi <= MAX_REFERENCE_LEN)
            .and_then(|semi| {
                unescape_with(&tail[..=semi], resolve_html5_entity)
                    .ok()
                    .map(|decoded| (decoded, semi))
            });
        match reference {
            Some((decoded, semi)) => {
                out.push_str(&decoded);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let outcome = MarkupTree::parse(
            r#"<!DOCTYPE html><div class="label-container"><h1>Nutrition Facts</h1><div class="calories editable-element" contenteditable="true"><strong>Calories</strong> 84</div></div>"#,
        );
        assert_eq!(outcome.recovered, 0);

        let tree = outcome.tree;
        let elements = tree.elements();
        assert_eq!(elements.len(), 4);

        let calories = tree.element(elements[2]).unwrap();
        assert!(calories.has_class("editable-element"));
        assert_eq!(calories.attr("contenteditable"), Some("true"));
        assert_eq!(tree.text_content(elements[2]), "Calories 84");
    }

    #[test]
    fn serialize_is_stable_across_reparse() {
        let source = r#"<html><head><meta charset="UTF-8"><style>.a > .b { color: red; }</style></head><body><p id=x>Hi<br>there</p><!-- note --></body></html>"#;
        let first = MarkupTree::parse(source).tree.serialize();
        let second = MarkupTree::parse(&first).tree.serialize();
        assert_eq!(first, second);
        assert!(first.contains("<meta charset=\"UTF-8\">"));
        assert!(first.contains(".a > .b { color: red; }"));
        assert!(first.contains("<!-- note -->"));
    }

    #[test]
    fn recovers_from_malformed_markup() {
        let outcome = MarkupTree::parse("<div><span>open</div></p>a < b<em>tail");
        assert!(outcome.recovered >= 3);

        let tree = outcome.tree;
        let text = tree.text_content(tree.root());
        assert_eq!(text, "opena < btail");
        assert_eq!(tree.elements().len(), 3);
    }

    #[test]
    fn replace_children_detaches_old_nodes() {
        let mut tree = MarkupTree::parse("<div><b>old</b></div>").tree;
        let div = tree.elements()[0];
        let bold = tree.elements()[1];

        assert!(tree.replace_children_with_text(div, "new"));
        assert_eq!(tree.text_content(div), "new");
        assert!(!tree.is_attached(bold));
        assert_eq!(tree.serialize(), "<div>new</div>");
    }

    #[test]
    fn text_and_attributes_are_escaped_on_serialize() {
        let mut tree = MarkupTree::parse(r#"<div class="section">x</div>"#).tree;
        let div = tree.elements()[0];
        tree.replace_children_with_text(div, "<b>bold</b> & \"it's\"");
        tree.element_mut(div)
            .unwrap()
            .set_attr("title", Some(r#"say "hi" & 'bye'"#.to_string()));

        let markup = tree.serialize();
        assert!(!markup.contains("<b>"));

        let reparsed = MarkupTree::parse(&markup).tree;
        assert_eq!(reparsed.elements().len(), 1);
        let div = reparsed.elements()[0];
        assert_eq!(reparsed.text_content(div), "<b>bold</b> & \"it's\"");
        assert_eq!(
            reparsed.element(div).unwrap().attr("title"),
            Some(r#"say "hi" & 'bye'"#)
        );
        assert_eq!(reparsed.serialize(), markup);
    }

    #[test]
    fn character_references_decode_leniently() {
        let tree = MarkupTree::parse("<p>Fish &amp; Chips&nbsp;&#38; AT&T &bogus;</p>").tree;
        assert_eq!(
            tree.text_content(tree.root()),
            "Fish & Chips\u{a0}& AT&T &bogus;"
        );
    }

    #[test]
    fn deep_nesting_does_not_overflow() {
        let depth = 50_000;
        let source = "<div>".repeat(depth) + "leaf";
        let tree = MarkupTree::parse(&source).tree;

        assert_eq!(tree.text_content(tree.root()), "leaf");
        let markup = tree.serialize();
        assert!(markup.starts_with("<div><div>"));
        assert_eq!(markup.matches("</div>").count(), depth);
    }
}
