use std::time::Instant;
use chrono::NaiveDate;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use tripchat_core::{ChatRole, Theme, TripType};
use crate::app::{App, HomeEntry, InputMode, Screen, TurnProgress};
use crate::render::{fragment_lines, live_fragment_lines, wrapped_height, Palette};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [main_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(body_area);

    let main_area = if app.show_saved_trips {
        let [left, right] = Layout::horizontal([
            Constraint::Percentage(65),
            Constraint::Percentage(35),
        ])
        .areas(main_area);
        render_saved_trips(app, frame, right);
        left
    } else {
        main_area
    };

    match app.screen {
        Screen::Home => render_home_screen(app, frame, main_area),
        Screen::Chat => render_chat(app, frame, main_area),
    }

    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
    render_toasts(app, frame, area);
}

fn palette(app: &App) -> Palette {
    Palette::for_theme(app.client_state.theme)
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let p = palette(app);
    let prefs = &app.preferences;

    let dates = match (prefs.travel_date, prefs.return_date, prefs.trip_type) {
        (Some(from), Some(to), TripType::RoundTrip) => {
            format!("{} → {}", from.format("%b %d"), to.format("%b %d"))
        }
        (Some(from), _, _) => format!("{} one way", from.format("%b %d")),
        _ => String::new(),
    };

    let title = Line::from(vec![
        Span::styled(" ✈ TripChat ", Style::default().fg(p.accent).bold()),
        Span::styled(
            format!(
                " {} · {} traveler{} · {} · {} ",
                dates,
                prefs.travelers,
                if prefs.travelers == 1 { "" } else { "s" },
                prefs.budget.as_str(),
                prefs.currency.code()
            ),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(p.muted),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_home_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let p = palette(app);
    let [list_area, prefs_area] = Layout::horizontal([
        Constraint::Percentage(55),
        Constraint::Percentage(45),
    ])
    .areas(area);

    let labels = app.client_state.recent_labels();
    let currency = app.preferences.currency;
    let mut recent_idx = 0;
    let items: Vec<ListItem> = app
        .home_entries()
        .into_iter()
        .map(|entry| match entry {
            HomeEntry::Destination(dest) => ListItem::new(Line::from(vec![
                Span::styled(format!(" {:<12}", dest.name), Style::default().fg(p.text).bold()),
                Span::styled(
                    format!("from {}", currency.format_price(dest.price_inr)),
                    Style::default().fg(p.code),
                ),
            ])),
            HomeEntry::Recent(query) => {
                let label = labels.get(recent_idx).cloned().unwrap_or(query);
                recent_idx += 1;
                ListItem::new(Line::from(vec![
                    Span::styled(" ↺ ", Style::default().fg(p.muted)),
                    Span::styled(label, Style::default().fg(p.text)),
                ]))
            }
        })
        .collect();

    let title = if app.client_state.recent_queries().is_empty() {
        " Where to? ".to_string()
    } else {
        " Where to? · recent searches below ".to_string()
    };
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(p.accent))
                .title(title),
        )
        .highlight_style(
            Style::default()
                .bg(p.accent)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, list_area, &mut app.home_state);

    render_preferences(app, frame, prefs_area);
}

fn render_preferences(app: &App, frame: &mut Frame, area: Rect) {
    let p = palette(app);
    let prefs = &app.preferences;
    let key = |k: &'static str| Span::styled(format!(" {} ", k), Style::default().bg(Color::DarkGray).fg(Color::White));
    let value = |v: String| Span::styled(format!(" {}", v), Style::default().fg(p.text));
    let date = |d: Option<NaiveDate>| d.map(|d| d.format("%a %b %d, %Y").to_string()).unwrap_or_else(|| "-".into());

    let mut lines = vec![
        Line::from(vec![key("[/]"), Span::raw(" Travel date:"), value(date(prefs.travel_date))]),
    ];
    if prefs.trip_type == TripType::RoundTrip {
        lines.push(Line::from(vec![key("{/}"), Span::raw(" Return date:"), value(date(prefs.return_date))]));
    }
    lines.extend([
        Line::from(vec![key("+/-"), Span::raw(" Travelers:"), value(prefs.travelers.to_string())]),
        Line::from(vec![key("o"), Span::raw(" Trip type:"), value(prefs.trip_type.display_name().to_string())]),
        Line::from(vec![key("b"), Span::raw(" Budget:"), value(prefs.budget.as_str().to_string())]),
        Line::from(vec![
            key("c"),
            Span::raw(" Currency:"),
            value(format!("{} {}", prefs.currency.symbol(), prefs.currency.code())),
        ]),
        Line::from(vec![
            key("T"),
            Span::raw(" Theme:"),
            value(match app.client_state.theme {
                Theme::Dark => "dark".to_string(),
                Theme::Light => "light".to_string(),
            }),
        ]),
    ]);

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.muted))
            .title(" Travel options "),
    );
    frame.render_widget(panel, area);
}

fn chat_lines(app: &App, now: Instant) -> Vec<Line<'static>> {
    let p = palette(app);
    let mut lines: Vec<Line<'static>> = Vec::new();

    for (i, msg) in app.conversation.transcript().messages().iter().enumerate() {
        let (label, style) = match msg.role() {
            ChatRole::User => ("You:", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            ChatRole::Assistant => ("Planner:", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            ChatRole::System => ("Notice:", Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC)),
        };
        lines.push(Line::from(Span::styled(label, style)));

        if app.revealing_index == Some(i) {
            if let Some(live) = app.viewport.live() {
                lines.extend(live_fragment_lines(live, p));
            }
        } else {
            lines.extend(fragment_lines(msg.fragment(), p));
        }
        lines.push(Line::default());
    }

    if let Some(loading) = &app.loading {
        lines.push(Line::from(Span::styled(
            "Planner:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!("{}{}", loading.message(now).trim_end_matches('.'), loading.dots()),
            Style::default().fg(p.muted).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn progress_title(progress: Option<TurnProgress>) -> String {
    let Some(progress) = progress else {
        return " Trip planner ".to_string();
    };
    let done = usize::from(progress.step());
    let todo = usize::from(TurnProgress::STEPS).saturating_sub(done);
    format!(
        " Trip planner [{}{}] {} ",
        "■".repeat(done),
        "□".repeat(todo),
        progress.label()
    )
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let p = palette(app);
    app.chat_area = Some(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(p.accent))
        .title(progress_title(app.progress));

    let inner_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);

    if app.conversation.transcript().is_empty() && app.loading.is_none() {
        let hint = Paragraph::new(Text::from(Span::styled(
            "Ask about a destination, dates or budget...",
            Style::default().fg(p.muted),
        )))
        .block(block);
        frame.render_widget(hint, area);
        return;
    }

    let lines = chat_lines(app, Instant::now());
    let rows = wrapped_height(&lines, inner_width);
    app.viewport
        .set_layout(inner_height, u16::try_from(rows).unwrap_or(u16::MAX));

    let chat = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.viewport.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_saved_trips(app: &mut App, frame: &mut Frame, area: Rect) {
    let p = palette(app);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Saved trips (Enter to ask again, x to delete) ");

    if app.client_state.saved_trips().is_empty() {
        let empty = Paragraph::new(Span::styled(
            "No saved trips yet. Press s in a chat to save one.",
            Style::default().fg(p.muted),
        ))
        .wrap(Wrap { trim: true })
        .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .client_state
        .saved_trips()
        .iter()
        .map(|trip| {
            ListItem::new(vec![
                Line::from(Span::styled(trip.title.clone(), Style::default().fg(p.text).bold())),
                Line::from(Span::styled(
                    format!("{} · {}", trip.saved_at.format("%Y-%m-%d"), trip.summary),
                    Style::default().fg(p.muted),
                )),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::Magenta).fg(Color::White))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.saved_state);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let title = if app.is_busy() {
        " Ask (waiting for the planner) "
    } else {
        " Ask "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Home => " HOME ",
        Screen::Chat => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = match (app.screen, app.input_mode) {
        (_, InputMode::Editing) => vec![("Enter", "send"), ("↑/↓", "scroll"), ("Esc", "stop typing")],
        (Screen::Home, InputMode::Normal) => vec![
            ("j/k", "pick"),
            ("Enter", "plan"),
            ("i", "type"),
            ("Tab", "chat"),
            ("S", "saved"),
            ("H", "clear history"),
            ("q", "quit"),
        ],
        (Screen::Chat, InputMode::Normal) => {
            let mut pairs = vec![("j/k", "scroll"), ("i", "type")];
            if app.reveal.is_revealing() {
                pairs.push(("Esc", "show all"));
            }
            pairs.extend([
                ("s", "save trip"),
                ("S", "saved"),
                ("n", "new trip"),
                ("Tab", "home"),
                ("q", "quit"),
            ]);
            pairs
        }
    };

    let hints = pairs.into_iter().flat_map(|(k, label)| {
        [
            Span::styled(format!(" {} ", k), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    });

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_toasts(app: &App, frame: &mut Frame, area: Rect) {
    let p = palette(app);
    for (i, toast) in app.toasts.iter().rev().take(3).enumerate() {
        let width = (toast.message.chars().count() as u16 + 4).min(area.width);
        let y = area.y + 1 + (i as u16) * 3;
        if y + 3 > area.height {
            break;
        }
        let toast_area = Rect::new(area.width.saturating_sub(width + 1), y, width, 3);

        frame.render_widget(Clear, toast_area);
        let widget = Paragraph::new(toast.message.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(p.accent)),
        );
        frame.render_widget(widget, toast_area);
    }
}
