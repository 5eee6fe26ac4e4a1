use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use parley_core::{AuthField, Landing, Message, Plan, PlanAction, Route, UpgradePanel};

use crate::app::{App, Focus};

pub fn draw(f: &mut Frame, app: &App) {
    match app.route {
        Route::Login => draw_login(f, app),
        Route::Chat => draw_chat(f, app),
        Route::Success | Route::Cancel => {
            if let Some(landing) = app.landing() {
                draw_landing(f, &landing);
            }
        }
    }

    if let Some(alert) = &app.alert {
        draw_alert(f, alert);
    }
}

fn draw_login(f: &mut Frame, app: &App) {
    let form = &app.auth;
    let area = centered_rect(50, 14, f.size());
    f.render_widget(Clear, area);

    let field_style = |field: AuthField| {
        if form.focus == field {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        }
    };
    let cursor = |field: AuthField| if form.focus == field { "▌" } else { "" };

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("Email:    ", field_style(AuthField::Email)),
            Span::raw(form.email.as_str()),
            Span::styled(cursor(AuthField::Email), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::styled("Password: ", field_style(AuthField::Password)),
            Span::raw("•".repeat(form.password.chars().count())),
            Span::styled(cursor(AuthField::Password), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(""),
    ];

    if let Some(error) = form.error() {
        lines.push(Line::from(Span::styled(error, Style::default().fg(Color::Red))));
    } else if form.is_submitting() {
        lines.push(Line::from(Span::styled(
            "Please wait...",
            Style::default().fg(Color::Yellow),
        )));
    } else {
        lines.push(Line::from(""));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("[Enter] ", Style::default().fg(Color::Green)),
        Span::raw(form.mode.title()),
    ]));
    lines.push(Line::from(vec![
        Span::styled("[Ctrl+R] ", Style::default().fg(Color::Green)),
        Span::raw(form.mode.toggle_hint()),
    ]));
    lines.push(Line::from(Span::styled(
        "[Tab] Next field  [Esc] Quit",
        Style::default().fg(Color::DarkGray),
    )));

    let login = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", form.mode.title()))
            .border_style(Style::default().fg(Color::Blue)),
    );
    f.render_widget(login, area);
}

fn draw_chat(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Body
            Constraint::Length(1), // Status bar
        ])
        .split(f.size());

    draw_header(f, app, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(30)])
        .split(chunks[1]);

    draw_sidebar(f, app, body[0]);
    draw_main(f, app, body[1]);
    draw_status_bar(f, app, chunks[2]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let usage = app.chat.usage();
    let plan = if usage.is_premium() {
        Span::styled("Premium", Style::default().fg(Color::Magenta))
    } else {
        Span::styled(
            format!(
                "{}/{} messages this {}",
                usage.current_count(),
                usage.limit(),
                usage.time_frame()
            ),
            Style::default().fg(Color::Gray),
        )
    };

    let mut spans = vec![
        Span::styled(
            " Parley",
            Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan),
        ),
        Span::styled("  |  ", Style::default().fg(Color::Gray)),
        plan,
    ];
    if app.chat.is_loading() {
        spans.push(Span::styled("  ◐ Loading...", Style::default().fg(Color::Yellow)));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)),
    );
    f.render_widget(header, area);
}

fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let registry = app.chat.registry();
    let items: Vec<ListItem> = registry
        .conversations()
        .iter()
        .map(|conversation| {
            let marker = if registry.is_active(&conversation.id) { "● " } else { "  " };
            let line = match registry.editing() {
                Some(draft) if draft.id == conversation.id => Line::from(vec![
                    Span::styled("✎ ", Style::default().fg(Color::Yellow)),
                    Span::styled(draft.title.clone(), Style::default().fg(Color::Yellow)),
                    Span::styled("▌", Style::default().fg(Color::Yellow)),
                ]),
                _ => Line::from(vec![
                    Span::styled(marker, Style::default().fg(Color::Green)),
                    Span::raw(conversation.title.clone()),
                ]),
            };
            ListItem::new(line)
        })
        .collect();

    let border = if app.focus == Focus::Sidebar { Color::Cyan } else { Color::Blue };
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Chats ")
                .border_style(Style::default().fg(border)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = ListState::default();
    if app.focus == Focus::Sidebar && !registry.is_empty() {
        state.select(Some(app.selected));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_main(f: &mut Frame, app: &App, area: Rect) {
    let usage = app.chat.usage();
    let panel = usage.upgrade_panel();
    let notice = usage.notice();

    let banner_height = match (&panel, &notice) {
        (Some(_), _) => 11,
        (None, Some(_)) => 1,
        (None, None) => 0,
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),
            Constraint::Length(banner_height),
            Constraint::Length(3),
        ])
        .split(area);

    draw_messages(f, app, chunks[0]);

    if let Some(panel) = &panel {
        draw_upgrade_panel(f, panel, chunks[1]);
    } else if let Some(notice) = &notice {
        let color = if notice.severe { Color::Red } else { Color::Yellow };
        let banner = Paragraph::new(notice.text.as_str())
            .style(Style::default().fg(color))
            .alignment(Alignment::Center);
        f.render_widget(banner, chunks[1]);
    }

    draw_input(f, app, chunks[2]);
}

fn draw_messages(f: &mut Frame, app: &App, area: Rect) {
    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    let mut lines: Vec<Line> = Vec::new();

    for message in app.chat.transcript().messages() {
        lines.extend(format_message(message));
    }
    if app.chat.is_sending() {
        lines.push(Line::from(Span::styled(
            "Parley: ...",
            Style::default().fg(Color::Green).add_modifier(Modifier::ITALIC),
        )));
    }

    let title = match app.chat.registry().active() {
        Some(conversation) => format!(" {} ", conversation.title),
        None => " Messages ".to_string(),
    };

    // Approximate wrapped height so the view sticks to the bottom
    let total: usize = lines
        .iter()
        .map(|line| {
            let width: usize = line.spans.iter().map(|s| s.content.chars().count()).sum();
            width.max(1).div_ceil(inner_width)
        })
        .sum();
    let visible = area.height.saturating_sub(2) as usize;
    let top = total
        .saturating_sub(visible)
        .saturating_sub(app.scroll_offset);

    let messages = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .wrap(Wrap { trim: false })
        .scroll((top.min(u16::MAX as usize) as u16, 0));

    f.render_widget(messages, area);
}

fn format_message(message: &Message) -> Vec<Line<'_>> {
    let (prefix, style) = if message.is_bot {
        ("Parley: ", Style::default().fg(Color::Green))
    } else {
        ("You: ", Style::default().fg(Color::Cyan))
    };

    let mut first = vec![Span::styled(prefix, style.add_modifier(Modifier::BOLD))];
    if let Some(sent_at) = message.sent_at {
        first.push(Span::styled(
            format!("[{}] ", sent_at.format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let mut lines = Vec::new();
    let mut content = message.content.lines();
    first.push(Span::styled(content.next().unwrap_or_default(), style));
    lines.push(Line::from(first));
    for rest in content {
        lines.push(Line::from(Span::styled(rest, style)));
    }
    lines.push(Line::from(""));
    lines
}

fn draw_upgrade_panel(f: &mut Frame, panel: &UpgradePanel, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", panel.headline))
        .border_style(Style::default().fg(Color::Red));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(inner);

    for (plan, column) in panel.plans.iter().zip(columns.iter()) {
        draw_plan(f, plan, *column);
    }
}

fn draw_plan(f: &mut Frame, plan: &Plan, area: Rect) {
    let (color, key) = match plan.action {
        PlanAction::ContinueFree => (Color::Gray, "Ctrl+R"),
        PlanAction::Upgrade => (Color::Magenta, "Ctrl+U"),
    };

    let mut lines = vec![Line::from(Span::styled(
        plan.price,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))];
    for feature in &plan.features {
        lines.push(Line::from(format!("✓ {}", feature)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(format!("[{}] ", key), Style::default().fg(Color::Green)),
        Span::styled(plan.action.label(), Style::default().add_modifier(Modifier::BOLD)),
    ]));

    let card = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", plan.name))
            .border_style(Style::default().fg(color)),
    );
    f.render_widget(card, area);
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let input = app.chat.input();
    let focused = app.focus == Focus::Input;

    let line = if !app.chat.input_enabled() {
        Line::from(Span::styled(
            "Message limit reached",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
    } else if input.is_empty() && !focused {
        Line::from(Span::styled(
            "Type your message...",
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        ))
    } else {
        let mut spans = vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::raw(input),
        ];
        if focused {
            spans.push(Span::styled("▌", Style::default().fg(Color::Green)));
        }
        Line::from(spans)
    };

    let title = if app.chat.is_sending() { " Sending... " } else { " Message " };
    let border = if focused { Color::Cyan } else { Color::Blue };
    let widget = Paragraph::new(line)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(border)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(widget, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let help = if app.chat.registry().editing().is_some() {
        "[Enter] Save  [Esc] Cancel"
    } else {
        match app.focus {
            Focus::Sidebar => {
                "[↑↓] Move  [Enter] Open  [E] Rename  [Tab] Input  [Ctrl+N] New  [Ctrl+L] Logout  [Ctrl+C] Quit"
            }
            Focus::Input => {
                "[Enter] Send  [Tab] Chats  [Ctrl+N] New  [Ctrl+R] Reload  [Ctrl+L] Logout  [Ctrl+C] Quit"
            }
        }
    };

    let text = match &app.status {
        Some(status) => format!(" {} | {}", status, help),
        None => format!(" {}", help),
    };

    let status_bar = Paragraph::new(text)
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::REVERSED));
    f.render_widget(status_bar, area);
}

fn draw_landing(f: &mut Frame, landing: &Landing) {
    let area = centered_rect(60, 10, f.size());
    f.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(landing.body),
        Line::from(""),
        Line::from(vec![
            Span::styled("[Enter] ", Style::default().fg(Color::Green)),
            Span::raw(landing.back_label),
        ]),
    ];

    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", landing.title))
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(widget, area);
}

fn draw_alert(f: &mut Frame, alert: &str) {
    let area = centered_rect(50, 7, f.size());
    f.render_widget(Clear, area);

    let widget = Paragraph::new(vec![
        Line::from(""),
        Line::from(alert),
        Line::from(""),
        Line::from(Span::styled("[Enter] OK", Style::default().fg(Color::Green))),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Alert ")
            .border_style(Style::default().fg(Color::Red)),
    )
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    f.render_widget(widget, area);
}

/// Rectangle of `percent_x` width and fixed `height`, centered in `area`
fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height.min(area.height)),
            Constraint::Min(0),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
