use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::tree::{RowKind, TreeRow};

use super::app::App;
use super::AppState;

/// Main render function
pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Search box
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Status bar
        ])
        .split(f.area());

    render_search_box(f, chunks[0], app);

    if app.state() == AppState::Help {
        render_help(f, chunks[1], app);
    } else {
        render_main(f, chunks[1], app);
    }

    render_status_bar(f, chunks[2], app);

    if app.state() == AppState::ConfirmDelete {
        render_delete_confirm(f, f.area(), app);
    }
}

fn render_search_box(f: &mut Frame, area: Rect, app: &App) {
    let searching = app.state() == AppState::Search;
    let border = if searching {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let mut spans = vec![Span::raw(app.search().text().to_string())];
    if app.search().is_empty() && !searching {
        spans = vec![Span::styled(
            "Filter bot, dialog or trigger ( / )",
            Style::default().fg(Color::DarkGray),
        )];
    }
    if app.filter_pending() {
        spans.push(Span::styled("  …", Style::default().fg(Color::DarkGray)));
    }

    let title = if app.applied_filter().is_empty() {
        "Search".to_string()
    } else {
        format!("Search: \"{}\"", app.applied_filter())
    };

    let p = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).border_style(border).title(title));
    f.render_widget(p, area);

    if searching {
        let x = area.x + 1 + app.search().cursor_column() as u16;
        f.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn render_main(f: &mut Frame, area: Rect, app: &App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    render_tree(f, cols[0], app);
    render_details(f, cols[1], app);
}

fn render_tree(f: &mut Frame, area: Rect, app: &App) {
    let rows = app.rows();

    if rows.is_empty() {
        let msg = if app.applied_filter().is_empty() {
            "No bots in this workspace."
        } else {
            "Nothing matches the filter.\n\nPress Esc to clear it."
        };
        let empty = Paragraph::new(msg)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Bots"));
        f.render_widget(empty, area);
        return;
    }

    let coach_mark = app.coach_mark();
    let inner_width = area.width.saturating_sub(2) as usize;

    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| {
            let indent = "  ".repeat(row.depth);
            let icon = match (row.has_children, row.expanded) {
                (true, true) => "▾",
                (true, false) => "▸",
                (false, _) => " ",
            };

            let label_style = match row.kind {
                RowKind::Bot => Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
                RowKind::Dialog if row.link.is_root => Style::default().add_modifier(Modifier::BOLD),
                RowKind::Dialog => Style::default(),
                RowKind::Trigger => Style::default().fg(Color::Gray),
            };
            let label_style = if app.is_selected(row) {
                label_style.fg(Color::Green).add_modifier(Modifier::UNDERLINED)
            } else {
                label_style
            };

            let mut suffix: Vec<Span> = Vec::new();
            if row.is_remote && row.kind == RowKind::Bot {
                suffix.push(Span::styled(" (remote)", Style::default().fg(Color::DarkGray)));
            }
            if row.warning {
                suffix.push(Span::styled(" ⚠", Style::default().fg(Color::Yellow)));
            }
            if row.error {
                suffix.push(Span::styled(" ✕", Style::default().fg(Color::Red)));
            }
            if coach_mark.as_deref() == Some(row.key.as_str()) {
                suffix.push(Span::styled(" ← start here", Style::default().fg(Color::Green)));
            }

            let used = indent.width() + 2 + suffix.iter().map(|s| s.content.width()).sum::<usize>();
            let label = truncate(row.label(), inner_width.saturating_sub(used));

            let mut spans = vec![
                Span::raw(indent),
                Span::styled(icon, Style::default().fg(Color::Magenta)),
                Span::raw(" "),
                Span::styled(label, label_style),
            ];
            spans.extend(suffix);
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = format!("Bots ({})", app.project_count());
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray));

    let mut state = ListState::default();
    state.select(Some(app.selected_index()));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_details(f: &mut Frame, area: Rect, app: &App) {
    let Some(row) = app.selected_item() else {
        let p = Paragraph::new("").block(Block::default().borders(Borders::ALL).title("Details"));
        f.render_widget(p, area);
        return;
    };

    let lines = detail_lines(row);
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Details"));
    f.render_widget(p, area);
}

fn detail_lines(row: &TreeRow) -> Vec<Line<'static>> {
    let key = |k: &str| Span::styled(format!("{k:<10}"), Style::default().fg(Color::Cyan));
    let link = &row.link;

    let kind = match row.kind {
        RowKind::Bot => "bot",
        RowKind::Dialog if link.is_root => "main dialog",
        RowKind::Dialog => "dialog",
        RowKind::Trigger => "trigger",
    };

    let mut lines = vec![
        Line::from(Span::styled(
            link.display_name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![key("kind"), Span::raw(kind)]),
        Line::from(vec![key("project"), Span::raw(link.project_id.clone())]),
    ];
    if let Some(skill) = &link.skill_id {
        lines.push(Line::from(vec![key("skill"), Span::raw(skill.clone())]));
    }
    if let Some(dialog) = &link.dialog_name {
        lines.push(Line::from(vec![key("dialog"), Span::raw(dialog.clone())]));
    }
    if let Some(index) = link.trigger {
        lines.push(Line::from(vec![
            key("trigger"),
            Span::raw(format!("triggers[{index}]")),
        ]));
    }
    if let Some(warning) = &link.warning_content {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("⚠ {warning}"),
            Style::default().fg(Color::Yellow),
        )));
    } else if row.warning {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "⚠ Contains unsupported triggers",
            Style::default().fg(Color::Yellow),
        )));
    }
    lines
}

fn render_delete_confirm(f: &mut Frame, area: Rect, app: &App) {
    let Some(d) = app.delete_confirm() else {
        return;
    };
    let popup_area = centered_rect(50, 25, area);
    f.render_widget(Clear, popup_area);

    let what = if d.trigger.is_some() { "trigger" } else { "dialog" };
    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::raw(format!("Delete {what} ")),
            Span::styled(
                d.label.clone(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::raw("?"),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("y/Enter", Style::default().fg(Color::Red)),
            Span::raw(": delete  "),
            Span::styled("n/Esc", Style::default().fg(Color::Cyan)),
            Span::raw(": cancel"),
        ]),
    ];

    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Confirm"));
    f.render_widget(p, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r)[1];

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical)[1]
}

fn render_help(f: &mut Frame, area: Rect, app: &App) {
    let keys = app.keys();
    let entry = |k: String, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {k:<12}"), Style::default().fg(Color::Yellow)),
            Span::raw(desc),
        ])
    };

    let help_text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        entry(
            format!("{} {}", keys.hints("up"), keys.hints("down")),
            "Move cursor",
        ),
        entry(keys.hints("select"), "Select dialog or trigger (toggle bot)"),
        entry(
            format!(
                "{}/{}/{}",
                keys.hints("collapse"),
                keys.hints("expand"),
                keys.hints("toggle")
            ),
            "Collapse / expand",
        ),
        entry(keys.hints("search"), "Filter (applies after typing pauses)"),
        entry("Esc".to_string(), "Clear filter"),
        entry(keys.hints("delete"), "Delete dialog or trigger"),
        entry(keys.hints("reload"), "Reload workspace"),
        entry(keys.hints("help"), "Toggle help"),
        entry(keys.hints("quit"), "Quit"),
    ];

    let p = Paragraph::new(help_text).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let keys = app.keys();
    let mut spans = vec![Span::raw("  ")];
    let mut hint = |action: &str, desc: &str, color: Color| {
        spans.push(Span::styled(keys.hint(action), Style::default().fg(color)));
        spans.push(Span::raw(format!(":{desc}  ")));
    };

    match app.selected_item().map(|r| r.kind) {
        Some(RowKind::Bot) => hint("select", "toggle", Color::Cyan),
        Some(_) => {
            hint("select", "select", Color::Cyan);
            hint("delete", "del", Color::Red);
        }
        None => {}
    }

    hint("search", "filter", Color::Cyan);
    hint("help", "help", Color::Magenta);
    hint("quit", "quit", Color::Red);

    if let Some(msg) = app.status_message() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(msg.to_string(), Style::default().fg(Color::Yellow)));
    }

    let status = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(app.workspace_path().display().to_string()),
    );
    f.render_widget(status, area);
}

/// Cut `text` to `max` columns, ending in an ellipsis when shortened
fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push('…');
    out
}
