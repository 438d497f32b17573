//! Markup tree shared by the formatter and the reveal scheduler.
//!
//! Text runs hold plain (decoded) text. Escaping happens only when the tree
//! is serialized, so a run can be cut at any character without splitting an
//! entity, and nothing stored in the tree can turn into an active tag.

use std::fmt;

use crate::sanitize::{decode_entities, sanitize};

/// Element kinds the markdown-lite formatter can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    Table,
    TableHead,
    TableBody,
    Row,
    HeaderCell,
    Cell,
    /// Heading level, 1 to 3.
    Heading(u8),
    /// Anchor that opens in a new context without a back-reference.
    Link { href: String },
    Strong,
    Emphasis,
    Code,
    LineBreak,
}

impl Tag {
    fn name(&self) -> &'static str {
        match self {
            Tag::Table => "table",
            Tag::TableHead => "thead",
            Tag::TableBody => "tbody",
            Tag::Row => "tr",
            Tag::HeaderCell => "th",
            Tag::Cell => "td",
            Tag::Heading(1) => "h1",
            Tag::Heading(2) => "h2",
            Tag::Heading(_) => "h3",
            Tag::Link { .. } => "a",
            Tag::Strong => "strong",
            Tag::Emphasis => "em",
            Tag::Code => "code",
            Tag::LineBreak => "br",
        }
    }

    fn is_void(&self) -> bool {
        matches!(self, Tag::LineBreak)
    }

    fn write_open(&self, out: &mut String) {
        match self {
            Tag::Table => out.push_str("<table class=\"md-table\">"),
            Tag::Link { href } => {
                out.push_str("<a href=\"");
                out.push_str(&sanitize(href));
                out.push_str("\" target=\"_blank\" rel=\"noopener\">");
            }
            other => {
                out.push('<');
                out.push_str(other.name());
                out.push('>');
            }
        }
    }

    fn write_close(&self, out: &mut String) {
        if !self.is_void() {
            out.push_str("</");
            out.push_str(self.name());
            out.push('>');
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: Tag,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element(Element),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn element(tag: Tag, children: Vec<Node>) -> Self {
        Node::Element(Element { tag, children })
    }

    pub fn line_break() -> Self {
        Node::element(Tag::LineBreak, Vec::new())
    }

    /// Number of plain-text characters under this node.
    pub fn char_len(&self) -> usize {
        match self {
            Node::Text(text) => text.chars().count(),
            Node::Element(el) => el.children.iter().map(Node::char_len).sum(),
        }
    }

    fn push_plain_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => el.children.iter().for_each(|c| c.push_plain_text(out)),
        }
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(&sanitize(text)),
            Node::Element(el) => {
                el.tag.write_open(out);
                for child in &el.children {
                    child.write_markup(out);
                }
                el.tag.write_close(out);
            }
        }
    }
}

/// Formatted message content: an ordered sequence of text runs and elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    nodes: Vec<Node>,
}

impl Fragment {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// A fragment holding a single literal text run.
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::default();
        }
        Self::new(vec![Node::Text(text)])
    }

    /// Build a single text run from already-sanitized text.
    pub fn from_sanitized(sanitized: &str) -> Self {
        Self::plain(decode_entities(sanitized))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Length of the visible plain text, in characters.
    pub fn char_len(&self) -> usize {
        self.nodes.iter().map(Node::char_len).sum()
    }

    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.nodes.iter().for_each(|n| n.push_plain_text(&mut out));
        out
    }

    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.nodes.iter().for_each(|n| n.write_markup(&mut out));
        out
    }

    /// The prefix of this fragment showing the first `budget` characters of
    /// plain text. Elements keep their structure: a text run is passed
    /// through, cut, or dropped, and once the budget runs out every later
    /// sibling is dropped too.
    pub fn truncated(&self, budget: usize) -> Fragment {
        let mut consumed = 0;
        Fragment::new(truncate_children(&self.nodes, budget, &mut consumed))
    }
}

fn truncate_children(nodes: &[Node], budget: usize, consumed: &mut usize) -> Vec<Node> {
    let mut kept = Vec::new();
    for node in nodes {
        if *consumed >= budget {
            break;
        }
        match node {
            Node::Text(text) => {
                let remaining = budget - *consumed;
                let len = text.chars().count();
                if len > remaining {
                    kept.push(Node::Text(text.chars().take(remaining).collect()));
                    *consumed = budget;
                } else {
                    kept.push(node.clone());
                    *consumed += len;
                }
            }
            Node::Element(el) => {
                let children = truncate_children(&el.children, budget, consumed);
                kept.push(Node::element(el.tag.clone(), children));
            }
        }
    }
    kept
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_markup())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Fragment {
        Fragment::new(vec![
            Node::text("Hi "),
            Node::element(Tag::Strong, vec![Node::text("Bali")]),
            Node::line_break(),
            Node::text("end"),
        ])
    }

    #[test]
    fn test_to_markup_escapes_text_and_href() {
        let frag = Fragment::new(vec![
            Node::text("<b>"),
            Node::element(
                Tag::Link { href: "https://x.test/?a=1&b=\"2\"".into() },
                vec![Node::text("x")],
            ),
        ]);
        assert_eq!(
            frag.to_markup(),
            "&lt;b&gt;<a href=\"https://x.test/?a=1&amp;b=&quot;2&quot;\" target=\"_blank\" rel=\"noopener\">x</a>"
        );
    }

    #[test]
    fn test_char_len_counts_plain_text_only() {
        assert_eq!(sample().char_len(), 10);
        assert_eq!(sample().plain_text(), "Hi Baliend");
    }

    #[test]
    fn test_truncated_cuts_inside_element() {
        assert_eq!(sample().truncated(5).to_markup(), "Hi <strong>Ba</strong>");
    }

    #[test]
    fn test_truncated_drops_trailing_siblings_once_exhausted() {
        // The break after "Bali" is dropped because the budget is spent.
        assert_eq!(sample().truncated(7).to_markup(), "Hi <strong>Bali</strong>");
        assert_eq!(sample().truncated(8).to_markup(), "Hi <strong>Bali</strong><br>e");
    }

    #[test]
    fn test_truncated_zero_and_full() {
        assert!(sample().truncated(0).is_empty());
        assert_eq!(sample().truncated(10), sample());
        assert_eq!(sample().truncated(100), sample());
    }

    #[test]
    fn test_truncated_never_splits_entities() {
        let frag = Fragment::from_sanitized("a &amp; b");
        assert_eq!(frag.char_len(), 5);
        assert_eq!(frag.truncated(3).to_markup(), "a &amp;");
    }
}
