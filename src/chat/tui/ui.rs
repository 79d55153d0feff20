//! UI rendering for the TUI.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::app::{App, MessageAuthor};

/// Main render function.
pub fn render(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Messages + peers
            Constraint::Length(3), // Input
        ])
        .split(frame.area());

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(76), Constraint::Percentage(24)])
        .split(rows[1]);

    render_header(frame, app, rows[0]);
    render_messages(frame, app, body[0]);
    render_peers(frame, app, body[1]);
    render_input(frame, app, rows[2]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!(" peermsg - {} ", app.room);

    let (lock_text, lock_color) = if app.encrypted {
        ("encrypted", Color::Green)
    } else {
        ("plaintext", Color::Yellow)
    };

    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.name),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(lock_text, Style::default().fg(lock_color)),
    ];

    if !app.transport.is_empty() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            app.transport.clone(),
            Style::default().fg(Color::DarkGray),
        ));
    }

    spans.push(Span::raw(" | "));
    spans.push(Span::styled(
        format!("{}↑ {}↓", app.messages_sent, app.messages_received),
        Style::default().fg(Color::DarkGray),
    ));

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(header, area);
}

/// Wrap text to fit within a given width (word-aware).
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_width = 0;

    for word in text.split_inclusive(|c: char| c.is_whitespace()) {
        let word_len = word.chars().count();

        if current_width + word_len <= max_width {
            current_line.push_str(word);
            current_width += word_len;
        } else if word_len > max_width {
            // Too long for any line: hard break
            if !current_line.is_empty() {
                lines.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
            for ch in word.chars() {
                if current_width >= max_width {
                    lines.push(std::mem::take(&mut current_line));
                    current_width = 0;
                }
                current_line.push(ch);
                current_width += 1;
            }
        } else {
            if !current_line.is_empty() {
                lines.push(current_line);
            }
            current_line = word.to_string();
            current_width = word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

fn render_messages(frame: &mut Frame, app: &App, area: Rect) {
    let inner_height = area.height.saturating_sub(2) as usize;
    let inner_width = area.width.saturating_sub(2) as usize;

    let mut all_lines: Vec<Line> = Vec::new();

    for msg in &app.messages {
        let (prefix, style) = match &msg.author {
            MessageAuthor::You => (
                format!("[{}] {}: ", msg.formatted_time(), app.name),
                Style::default().fg(Color::Green),
            ),
            MessageAuthor::Peer(name) => (
                format!("[{}] {}: ", msg.formatted_time(), name),
                Style::default().fg(Color::Blue),
            ),
            MessageAuthor::System => (
                format!("[{}] ", msg.formatted_time()),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            ),
        };

        let prefix_len = prefix.chars().count();
        let content_width = inner_width.saturating_sub(prefix_len);

        if content_width == 0 || msg.content.is_empty() {
            all_lines.push(Line::from(vec![
                Span::styled(prefix, style),
                Span::raw(msg.content.clone()),
            ]));
            continue;
        }

        for (i, part) in wrap_text(&msg.content, content_width).into_iter().enumerate() {
            let lead = if i == 0 {
                Span::styled(prefix.clone(), style)
            } else {
                Span::raw(" ".repeat(prefix_len))
            };
            all_lines.push(Line::from(vec![lead, Span::raw(part)]));
        }
    }

    let total_lines = all_lines.len();
    let start_index = total_lines
        .saturating_sub(inner_height)
        .saturating_sub(app.scroll_offset);
    let end_index = start_index.saturating_add(inner_height).min(total_lines);

    let items: Vec<ListItem> = all_lines
        .drain(start_index..end_index)
        .map(ListItem::new)
        .collect();

    let scroll_indicator = if app.scroll_offset > 0 {
        format!(" [↑{}] ", app.scroll_offset)
    } else {
        String::new()
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Messages{}", scroll_indicator))
        .border_style(Style::default().fg(Color::White));

    frame.render_widget(List::new(items).block(block), area);
}

fn render_peers(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .peers
        .iter()
        .map(|peer| {
            ListItem::new(Line::from(vec![
                Span::styled(peer.name.clone(), Style::default().fg(Color::Blue)),
                Span::styled(
                    format!(" {}", peer.address),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Peers ({}) ", app.peers.len()))
        .border_style(Style::default().fg(Color::White));

    frame.render_widget(List::new(items).block(block), area);
}

/// First visible input character so the cursor stays on screen.
fn input_window_start(cursor: usize, width: usize) -> usize {
    if width == 0 {
        return cursor;
    }
    cursor.saturating_sub(width - 1)
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let inner_width = area.width.saturating_sub(2) as usize;

    let (display_text, visible_cursor) = if app.input.is_empty() {
        ("Type a message, /help for commands".to_string(), 0)
    } else {
        let start = input_window_start(app.cursor_position, inner_width);
        let text: String = app.input.chars().skip(start).take(inner_width).collect();
        (text, app.cursor_position - start)
    };

    let remaining = app.remaining_chars();
    let counter_style = if remaining == 0 {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else if remaining <= 20 {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let counter_text = format!(" {}/{} ", app.input.chars().count(), app.max_message_len);

    let input = Paragraph::new(display_text)
        .style(if app.input.is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::White)
        })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" > ")
                .title_bottom(
                    Line::from(vec![Span::styled(counter_text, counter_style)]).right_aligned(),
                )
                .border_style(if remaining == 0 {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default().fg(Color::Green)
                }),
        );

    frame.render_widget(input, area);

    let cursor_x = area.x + 1 + visible_cursor as u16;
    let max_x = (area.x + area.width).saturating_sub(2);
    frame.set_cursor_position((cursor_x.min(max_x), area.y + 1));
}
