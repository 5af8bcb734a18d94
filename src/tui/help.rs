//! Help popup overlay: keyboard shortcuts of the active screen plus the
//! global ones.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

/// Popup dimensions.
const POPUP_WIDTH: u16 = 84;
const POPUP_HEIGHT: u16 = 24;

/// A shortcut entry: key binding and its description.
pub struct Shortcut {
    pub key: &'static str,
    pub desc: &'static str,
}

/// A category of shortcuts with a title.
pub struct Category {
    pub title: &'static str,
    pub shortcuts: &'static [Shortcut],
}

pub const GLOBAL: Category = Category {
    title: "GLOBAL",
    shortcuts: &[
        Shortcut {
            key: "Tab",
            desc: "Next field",
        },
        Shortcut {
            key: "Shift+Tab",
            desc: "Previous field",
        },
        Shortcut {
            key: "Esc",
            desc: "Dismiss status message",
        },
        Shortcut {
            key: "F1",
            desc: "Toggle this help",
        },
        Shortcut {
            key: "F12",
            desc: "Toggle diagnostics log",
        },
        Shortcut {
            key: "PgUp/PgDn",
            desc: "Scroll diagnostics log",
        },
        Shortcut {
            key: "Ctrl+C",
            desc: "Quit",
        },
    ],
};

/// Render the help popup overlay centered on screen.
///
/// `screen` goes in the left column, the global shortcuts in the right.
pub fn render_help_popup(frame: &mut Frame, screen: &[&Category]) {
    let area = frame.area();

    let popup_w = POPUP_WIDTH.min(area.width.saturating_sub(2));
    let popup_h = POPUP_HEIGHT.min(area.height.saturating_sub(2));
    let popup_area = centered_rect(popup_w, popup_h, area);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(
                " HELP ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("(F1 to close) ", Style::default().fg(Color::Gray)),
        ]))
        .title_bottom(Line::from(Span::styled(
            " Press any key to close ",
            Style::default().fg(Color::Gray),
        )));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let [left_col, right_col] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(inner);

    frame.render_widget(
        Paragraph::new(build_column_lines(screen)),
        inset(left_col, 1, 1),
    );
    frame.render_widget(
        Paragraph::new(build_column_lines(&[&GLOBAL])),
        inset(right_col, 1, 1),
    );
}

/// Build the lines for one column of categories.
fn build_column_lines<'a>(categories: &[&Category]) -> Vec<Line<'a>> {
    let mut lines: Vec<Line<'a>> = Vec::new();

    for (cat_idx, cat) in categories.iter().enumerate() {
        if cat_idx > 0 {
            lines.push(Line::from(""));
        }

        lines.push(Line::from(Span::styled(
            cat.title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            "\u{2500}".repeat(34),
            Style::default().fg(Color::DarkGray),
        )));

        for sc in cat.shortcuts.iter() {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<12}", sc.key), Style::default().fg(Color::Yellow)),
                Span::styled(sc.desc, Style::default().fg(Color::Gray)),
            ]));
        }
    }

    lines
}

/// Return a centered sub-rect of the given size within `area`.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

/// Inset a rect by the given horizontal and vertical margins.
fn inset(area: Rect, h: u16, v: u16) -> Rect {
    Rect::new(
        area.x + h,
        area.y + v,
        area.width.saturating_sub(h * 2),
        area.height.saturating_sub(v * 2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_lines_layout() {
        const ONE: Category = Category {
            title: "ONE",
            shortcuts: &[Shortcut {
                key: "x",
                desc: "Do x",
            }],
        };
        let lines = build_column_lines(&[&ONE, &GLOBAL]);
        // title + rule + 1 entry, blank, title + rule + entries
        assert_eq!(lines.len(), 3 + 1 + 2 + GLOBAL.shortcuts.len());
    }

    #[test]
    fn test_centered_rect_clamps() {
        let r = centered_rect(10, 4, Rect::new(0, 0, 20, 10));
        assert_eq!(r, Rect::new(5, 3, 10, 4));
    }
}
