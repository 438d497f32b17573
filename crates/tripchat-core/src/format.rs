//! Markdown-lite formatter.
//!
//! Converts the small markdown subset the planner emits into a markup tree.
//! The rules run as a fixed, ordered pipeline and every rule only rewrites
//! text runs, so a later rule never re-reads markup an earlier one produced:
//!
//! 1. pipe tables
//! 2. `#`, `##`, `###` headings
//! 3. `[text](http(s)://...)` links
//! 4. `**bold**`, `*italic*`, `` `code` ``
//! 5. newlines to line breaks
//! 6. a break before inline ordered-list markers (`2. `)
//! 7. bare `http(s)://` URLs outside existing links
//!
//! Anything that does not match degrades to literal text.

use std::collections::VecDeque;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::markup::{Fragment, Node, Tag};
use crate::sanitize::sanitize;

type Rule = fn(Vec<Node>) -> Vec<Node>;

const PIPELINE: [(&str, Rule); 7] = [
    ("tables", tables),
    ("headings", headings),
    ("links", links),
    ("emphasis", emphasis),
    ("line_breaks", line_breaks),
    ("list_markers", list_markers),
    ("autolinks", autolinks),
];

/// Format sanitized text into markup.
pub fn format(sanitized: &str) -> String {
    format_fragment(sanitized).to_markup()
}

/// Format sanitized text into a markup tree.
pub fn format_fragment(sanitized: &str) -> Fragment {
    let mut nodes = Fragment::from_sanitized(sanitized).into_nodes();
    for (name, rule) in PIPELINE {
        nodes = rule(nodes);
        tracing::trace!(rule = name, nodes = nodes.len(), "applied format rule");
    }
    Fragment::new(nodes)
}

/// Sanitize then format untrusted reply text.
pub fn render_reply(raw: &str) -> Fragment {
    format_fragment(&sanitize(raw))
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("invalid format regex"))
}

fn push_text(out: &mut Vec<Node>, text: impl Into<String>) {
    let text = text.into();
    if !text.is_empty() {
        out.push(Node::Text(text));
    }
}

fn top_level_only(_: &Tag) -> bool {
    false
}

fn everywhere(_: &Tag) -> bool {
    true
}

fn outside_links(tag: &Tag) -> bool {
    !matches!(tag, Tag::Link { .. })
}

/// Rewrite text runs with `f`, recursing into elements accepted by `descend`.
fn map_text(nodes: Vec<Node>, descend: fn(&Tag) -> bool, f: &dyn Fn(&str) -> Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Text(text) => out.extend(f(&text)),
            Node::Element(mut el) => {
                if descend(&el.tag) {
                    el.children = map_text(el.children, descend, f);
                }
                out.push(Node::Element(el));
            }
        }
    }
    out
}

/// Replace every regex match in `text` with the node built from its captures.
fn replace_matches(text: &str, re: &Regex, build: impl Fn(&Captures) -> Node) -> Vec<Node> {
    let mut out = Vec::new();
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        push_text(&mut out, &text[last..m.start()]);
        out.push(build(&caps));
        last = m.end();
    }
    push_text(&mut out, &text[last..]);
    out
}

// ---------------------------------------------------------------------------
// 1. Tables

fn tables(nodes: Vec<Node>) -> Vec<Node> {
    map_text(nodes, top_level_only, &split_tables)
}

fn split_tables(text: &str) -> Vec<Node> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut after_table = false;
    let mut i = 0;

    while i < lines.len() {
        if let Some((consumed, table)) = parse_table(&lines[i..]) {
            // The newline before the table and the one after it belong to the table.
            push_text(&mut out, std::mem::take(&mut buf));
            out.push(table);
            i += consumed;
            after_table = true;
            continue;
        }
        if i > 0 && !after_table {
            buf.push('\n');
        }
        buf.push_str(lines[i]);
        after_table = false;
        i += 1;
    }

    push_text(&mut out, buf);
    out
}

fn parse_table(lines: &[&str]) -> Option<(usize, Node)> {
    let header = table_row(lines.first()?)?;
    if !is_separator(lines.get(1)?) {
        return None;
    }
    let body: Vec<Vec<String>> = lines[2..].iter().map_while(|line| table_row(line)).collect();
    if body.is_empty() {
        return None;
    }

    let row = |cells: Vec<String>, tag: Tag| {
        let cells = cells
            .into_iter()
            .map(|c| Node::element(tag.clone(), vec![Node::Text(c)]))
            .collect();
        Node::element(Tag::Row, cells)
    };

    let consumed = 2 + body.len();
    let head = Node::element(Tag::TableHead, vec![row(header, Tag::HeaderCell)]);
    let body = Node::element(
        Tag::TableBody,
        body.into_iter().map(|cells| row(cells, Tag::Cell)).collect(),
    );
    Some((consumed, Node::element(Tag::Table, vec![head, body])))
}

/// Cells of a `| a | b |` line. Blank cells are dropped, so uneven rows
/// come out exactly as written.
fn table_row(line: &str) -> Option<Vec<String>> {
    let inner = line.trim().strip_prefix('|')?.strip_suffix('|')?;
    if inner.is_empty() {
        return None;
    }
    Some(
        inner
            .split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .map(String::from)
            .collect(),
    )
}

fn is_separator(line: &str) -> bool {
    let Some(inner) = line.trim().strip_prefix('|').and_then(|l| l.strip_suffix('|')) else {
        return false;
    };
    inner.contains('-') && inner.chars().all(|c| matches!(c, '-' | ':' | '|' | ' '))
}

// ---------------------------------------------------------------------------
// 2. Headings

fn headings(nodes: Vec<Node>) -> Vec<Node> {
    map_text(nodes, top_level_only, &split_headings)
}

fn split_headings(text: &str) -> Vec<Node> {
    let mut out = Vec::new();
    let mut buf = String::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        match heading(line) {
            Some((level, title)) => {
                push_text(&mut out, std::mem::take(&mut buf));
                out.push(Node::element(Tag::Heading(level), vec![Node::text(title)]));
            }
            None => buf.push_str(line),
        }
    }
    push_text(&mut out, buf);
    out
}

fn heading(line: &str) -> Option<(u8, &str)> {
    [(3, "### "), (2, "## "), (1, "# ")]
        .into_iter()
        .find_map(|(level, prefix)| {
            line.strip_prefix(prefix)
                .filter(|title| !title.is_empty())
                .map(|title| (level, title))
        })
}

// ---------------------------------------------------------------------------
// 3. Links

fn links(nodes: Vec<Node>) -> Vec<Node> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r"\[([^\]]+)\]\((https?://[^\s)]+)\)");
    map_text(nodes, outside_links, &|text| {
        replace_matches(text, re, |caps| {
            Node::element(
                Tag::Link { href: caps[2].to_string() },
                vec![Node::text(&caps[1])],
            )
        })
    })
}

// ---------------------------------------------------------------------------
// 4. Emphasis

fn emphasis(nodes: Vec<Node>) -> Vec<Node> {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    static ITALIC: OnceLock<Regex> = OnceLock::new();
    static CODE: OnceLock<Regex> = OnceLock::new();

    let spans = [
        (regex(&BOLD, r"\*\*(.+?)\*\*"), Tag::Strong),
        (regex(&ITALIC, r"\*(.+?)\*"), Tag::Emphasis),
        (regex(&CODE, r"`(.+?)`"), Tag::Code),
    ];

    let delimiters = ["**", "*", "`"];

    spans.into_iter().zip(delimiters).fold(nodes, |nodes, ((re, tag), delim)| {
        let nodes = map_text(nodes, everywhere, &|text| {
            replace_matches(text, re, |caps| Node::element(tag.clone(), vec![Node::text(&caps[1])]))
        });
        match tag {
            Tag::Code => nodes,
            _ => wrap_across_runs(nodes, delim, &tag),
        }
    })
}

/// Wrap spans whose delimiters sit in different text runs of one sibling
/// list, as in `**[Ritz](https://...)**`. Both delimiters must be on the
/// same line, and only inline elements may sit between them.
fn wrap_across_runs(nodes: Vec<Node>, delim: &str, tag: &Tag) -> Vec<Node> {
    let mut pending: VecDeque<Node> = nodes
        .into_iter()
        .map(|node| match node {
            Node::Element(mut el) => {
                el.children = wrap_across_runs(el.children, delim, tag);
                Node::Element(el)
            }
            text => text,
        })
        .collect();

    let mut out = Vec::new();
    while let Some(node) = pending.pop_front() {
        let Node::Text(text) = node else {
            out.push(node);
            continue;
        };
        let (Some(open), Some((between, close))) =
            (opening_delimiter(&text, delim), closing_delimiter(&pending, delim))
        else {
            out.push(Node::Text(text));
            continue;
        };

        push_text(&mut out, &text[..open]);
        let mut inner = Vec::new();
        push_text(&mut inner, &text[open + delim.len()..]);
        inner.extend(pending.drain(..between));
        if let Some(Node::Text(closing)) = pending.pop_front() {
            push_text(&mut inner, &closing[..close]);
            let rest = &closing[close + delim.len()..];
            if !rest.is_empty() {
                pending.push_front(Node::Text(rest.to_string()));
            }
        }
        out.push(Node::element(tag.clone(), inner));
    }
    out
}

/// Last delimiter on the final line of a text run.
fn opening_delimiter(text: &str, delim: &str) -> Option<usize> {
    let line_start = text.rfind('\n').map_or(0, |i| i + 1);
    text[line_start..].rfind(delim).map(|pos| line_start + pos)
}

/// Index of the later sibling run holding the closing delimiter, and the
/// delimiter's offset in it. At least one inline element must come first.
fn closing_delimiter(siblings: &VecDeque<Node>, delim: &str) -> Option<(usize, usize)> {
    let mut saw_element = false;
    for (i, node) in siblings.iter().enumerate() {
        match node {
            Node::Element(el) if is_inline(&el.tag) => saw_element = true,
            Node::Element(_) => return None,
            Node::Text(text) => {
                let first_line = text.split('\n').next().unwrap_or_default();
                if let Some(pos) = first_line.find(delim) {
                    return saw_element.then_some((i, pos));
                }
                if text.contains('\n') {
                    return None;
                }
            }
        }
    }
    None
}

fn is_inline(tag: &Tag) -> bool {
    matches!(tag, Tag::Link { .. } | Tag::Strong | Tag::Emphasis | Tag::Code)
}

// ---------------------------------------------------------------------------
// 5. Line breaks

fn line_breaks(nodes: Vec<Node>) -> Vec<Node> {
    map_text(nodes, everywhere, &|text| {
        let mut out = Vec::new();
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                out.push(Node::line_break());
            }
            push_text(&mut out, line.strip_suffix('\r').unwrap_or(line));
        }
        out
    })
}

// ---------------------------------------------------------------------------
// 6. Ordered-list markers

fn list_markers(nodes: Vec<Node>) -> Vec<Node> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r"\s\d+\.\s");
    map_text(nodes, everywhere, &|text| {
        let mut out = Vec::new();
        let mut last = 0;
        for m in re.find_iter(text) {
            // Keep the leading whitespace on the left of the break.
            let ws_len = text[m.start()..].chars().next().map_or(1, char::len_utf8);
            let split = m.start() + ws_len;
            push_text(&mut out, &text[last..split]);
            out.push(Node::line_break());
            last = split;
        }
        push_text(&mut out, &text[last..]);
        out
    })
}

// ---------------------------------------------------------------------------
// 7. Bare URLs

fn autolinks(nodes: Vec<Node>) -> Vec<Node> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r#"https?://[^\s<>")]+"#);
    map_text(nodes, outside_links, &|text| {
        let mut out = Vec::new();
        let mut last = 0;
        for m in re.find_iter(text) {
            let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
            let scheme_len = if url.starts_with("https") { 8 } else { 7 };
            if url.len() <= scheme_len {
                continue;
            }
            push_text(&mut out, &text[last..m.start()]);
            out.push(Node::element(
                Tag::Link { href: url.to_string() },
                vec![Node::text(url)],
            ));
            last = m.start() + url.len();
        }
        push_text(&mut out, &text[last..]);
        out
    })
}
