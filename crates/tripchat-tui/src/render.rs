//! Turns a formatted message into styled terminal lines.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use tripchat_core::{Element, Fragment, Node, Tag, Theme};

/// Colors for formatted content, per theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub text: Color,
    pub accent: Color,
    pub heading: Color,
    pub code: Color,
    pub link: Color,
    pub muted: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                text: Color::White,
                accent: Color::Cyan,
                heading: Color::LightMagenta,
                code: Color::Yellow,
                link: Color::LightBlue,
                muted: Color::DarkGray,
            },
            Theme::Light => Self {
                text: Color::Black,
                accent: Color::Blue,
                heading: Color::Magenta,
                code: Color::Red,
                link: Color::Blue,
                muted: Color::Gray,
            },
        }
    }
}

pub fn fragment_lines(fragment: &Fragment, palette: Palette) -> Vec<Line<'static>> {
    build_lines(fragment, palette, true)
}

/// Lines for a message that is still being revealed. Link targets stay
/// hidden until the message is complete, so nothing past the revealed
/// text shows up early.
pub fn live_fragment_lines(fragment: &Fragment, palette: Palette) -> Vec<Line<'static>> {
    build_lines(fragment, palette, false)
}

fn build_lines(fragment: &Fragment, palette: Palette, link_targets: bool) -> Vec<Line<'static>> {
    let mut builder = LineBuilder::new(palette, link_targets);
    builder.walk(fragment.nodes(), Style::default().fg(palette.text));
    builder.finish()
}

/// Rows the lines occupy once wrapped to `width`.
pub fn wrapped_height(lines: &[Line], width: u16) -> usize {
    let width = usize::from(width.max(1));
    lines
        .iter()
        .map(|line| line.width().div_ceil(width).max(1))
        .sum()
}

struct LineBuilder {
    palette: Palette,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    link_targets: bool,
    /// A heading or table just closed its own line.
    after_block: bool,
}

impl LineBuilder {
    fn new(palette: Palette, link_targets: bool) -> Self {
        Self {
            palette,
            lines: Vec::new(),
            current: Vec::new(),
            link_targets,
            after_block: false,
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.end_block();
        self.lines
    }

    fn push_text(&mut self, text: &str, style: Style) {
        self.after_block = false;
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            if !first.is_empty() {
                self.current.push(Span::styled(first.to_string(), style));
            }
        }
        for part in parts {
            self.break_line();
            if !part.is_empty() {
                self.current.push(Span::styled(part.to_string(), style));
            }
        }
    }

    fn break_line(&mut self) {
        self.lines.push(Line::from(std::mem::take(&mut self.current)));
    }

    fn end_block(&mut self) {
        if !self.current.is_empty() {
            self.break_line();
        }
    }

    fn walk(&mut self, nodes: &[Node], style: Style) {
        for node in nodes {
            match node {
                Node::Text(text) => self.push_text(text, style),
                Node::Element(el) => self.element(el, style),
            }
        }
    }

    fn element(&mut self, el: &Element, style: Style) {
        let p = self.palette;
        match &el.tag {
            Tag::LineBreak if self.after_block && self.current.is_empty() => {
                self.after_block = false;
            }
            Tag::LineBreak => self.break_line(),
            Tag::Heading(level) => {
                self.end_block();
                let mut heading = style.fg(p.heading).add_modifier(Modifier::BOLD);
                if *level == 1 {
                    heading = heading.add_modifier(Modifier::UNDERLINED);
                }
                self.walk(&el.children, heading);
                self.end_block();
                self.after_block = true;
            }
            Tag::Strong => self.walk(&el.children, style.add_modifier(Modifier::BOLD)),
            Tag::Emphasis => self.walk(&el.children, style.add_modifier(Modifier::ITALIC)),
            Tag::Code => self.walk(&el.children, style.fg(p.code)),
            Tag::Link { href } => {
                self.walk(&el.children, style.fg(p.link).add_modifier(Modifier::UNDERLINED));
                if !self.link_targets {
                    return;
                }
                let label: String = el.children.iter().map(plain_text).collect();
                if !href.starts_with(&label) {
                    self.push_text(&format!(" ({})", href), Style::default().fg(p.muted));
                }
            }
            Tag::Table => {
                self.end_block();
                self.table(el, style);
                self.after_block = true;
            }
            _ => self.walk(&el.children, style),
        }
    }

    fn table(&mut self, table: &Element, style: Style) {
        let p = self.palette;
        let mut rows: Vec<(bool, Vec<Vec<Span<'static>>>)> = Vec::new();
        collect_rows(table, false, &mut rows);

        let cell_rows: Vec<(bool, Vec<(Vec<Span<'static>>, usize)>)> = rows
            .into_iter()
            .map(|(header, cells)| {
                let cells = cells
                    .into_iter()
                    .map(|spans| {
                        let width = spans.iter().map(Span::width).sum();
                        (spans, width)
                    })
                    .collect();
                (header, cells)
            })
            .collect();

        let columns = cell_rows.iter().map(|(_, c)| c.len()).max().unwrap_or(0);
        let mut widths = vec![0usize; columns];
        for (_, cells) in &cell_rows {
            for (i, (_, w)) in cells.iter().enumerate() {
                widths[i] = widths[i].max(*w);
            }
        }

        let border = Style::default().fg(p.muted);
        let mut prev_header = false;
        for (header, cells) in cell_rows {
            if prev_header && !header {
                self.table_rule(&widths, border);
            }
            let mut line: Vec<Span<'static>> = Vec::new();
            for (i, (spans, width)) in cells.into_iter().enumerate() {
                if i > 0 {
                    line.push(Span::styled(" │ ", border));
                }
                for span in spans {
                    let span_style = if header {
                        style.patch(span.style).fg(p.accent).add_modifier(Modifier::BOLD)
                    } else {
                        style.patch(span.style)
                    };
                    line.push(Span::styled(span.content, span_style));
                }
                let pad = widths[i].saturating_sub(width);
                if pad > 0 {
                    line.push(Span::raw(" ".repeat(pad)));
                }
            }
            self.lines.push(Line::from(line));
            prev_header = header;
        }
    }

    fn table_rule(&mut self, widths: &[usize], style: Style) {
        let rule = widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("─┼─");
        self.lines.push(Line::from(Span::styled(rule, style)));
    }
}

fn collect_rows(el: &Element, in_head: bool, rows: &mut Vec<(bool, Vec<Vec<Span<'static>>>)>) {
    for child in &el.children {
        let Node::Element(child) = child else { continue };
        match child.tag {
            Tag::TableHead => collect_rows(child, true, rows),
            Tag::TableBody => collect_rows(child, false, rows),
            Tag::Row => {
                let cells = child
                    .children
                    .iter()
                    .filter_map(|cell| match cell {
                        Node::Element(cell) => Some(inline_spans(&cell.children)),
                        Node::Text(_) => None,
                    })
                    .collect();
                rows.push((in_head, cells));
            }
            _ => {}
        }
    }
}

/// Cell content on a single line.
fn inline_spans(nodes: &[Node]) -> Vec<Span<'static>> {
    fn walk(nodes: &[Node], style: Style, out: &mut Vec<Span<'static>>) {
        for node in nodes {
            match node {
                Node::Text(text) => out.push(Span::styled(text.replace('\n', " "), style)),
                Node::Element(el) => {
                    let style = match el.tag {
                        Tag::Strong => style.add_modifier(Modifier::BOLD),
                        Tag::Emphasis => style.add_modifier(Modifier::ITALIC),
                        Tag::Link { .. } => style.add_modifier(Modifier::UNDERLINED),
                        _ => style,
                    };
                    walk(&el.children, style, out);
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(nodes, Style::default(), &mut out);
    out
}

fn plain_text(node: &Node) -> String {
    match node {
        Node::Text(text) => text.clone(),
        Node::Element(el) => el.children.iter().map(plain_text).collect(),
    }
}
