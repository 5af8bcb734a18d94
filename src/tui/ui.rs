//! Frame layout shared by the screens: header, body, diagnostics, status bar.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::{Screen, Shell};
use super::debug_log;
use super::help;

/// Main render function
pub fn render<S: Screen>(frame: &mut Frame, shell: &Shell, screen: &S) {
    let area = frame.area();

    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), screen);

    match shell.debug_log.as_ref().filter(|log| log.visible) {
        Some(log) => {
            let [body_area, log_area] = Layout::vertical([
                Constraint::Fill(1),
                Constraint::Length(debug_log::PANE_HEIGHT),
            ])
            .areas(main_area);
            screen.render(frame, body_area);
            debug_log::render(log_area, frame.buffer_mut(), log);
        }
        None => screen.render(frame, main_area),
    }

    render_status(status_area, frame.buffer_mut(), shell, screen);

    if shell.show_help {
        help::render_help_popup(frame, screen.shortcuts());
    }
}

/// Render the header bar
fn render_header<S: Screen>(area: Rect, buf: &mut Buffer, screen: &S) {
    let title = format!(" {}", screen.title());
    let right = format!("[F1] Help  {} ", screen.user_label());
    let padding = (area.width as usize).saturating_sub(title.width() + right.width());

    let line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled("[F1] Help  ", Style::default().fg(Color::Gray)),
        Span::styled(
            format!("{} ", screen.user_label()),
            Style::default().fg(Color::Cyan),
        ),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Render the status bar
fn render_status<S: Screen>(area: Rect, buf: &mut Buffer, shell: &Shell, screen: &S) {
    // A status message takes the whole bar.
    if let Some(ref msg) = shell.status.message {
        let style = if shell.status.is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        let line = Line::from(vec![
            Span::styled(format!(" {} ", msg), style),
            Span::styled(" (Esc to dismiss)", Style::default().fg(Color::Gray)),
        ]);
        Paragraph::new(line)
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let sep_style = Style::default().fg(Color::Gray);
    let mut spans = vec![
        Span::styled(
            format!(" Tab: {} ", screen.focus_label()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(" | ", sep_style),
        Span::styled("F1: help", Style::default().fg(Color::Gray)),
        Span::styled(" | ", sep_style),
        Span::styled("C-c: quit", Style::default().fg(Color::Gray)),
    ];
    if let Some(badge) = shell.debug_log.as_ref().and_then(|log| log.badge()) {
        spans.push(Span::styled(" | ", sep_style));
        spans.push(Span::styled(badge, Style::default().fg(Color::Yellow)));
    }

    Paragraph::new(Line::from(spans))
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
