//! Diagnostics pane: captured tracing output, toggled with F12.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use super::log_capture::LogBuffer;

/// Lines kept for scrollback once drained from the capture buffer.
const MAX_HISTORY_LINES: usize = 1000;

/// Height of the pane when visible, borders included.
pub const PANE_HEIGHT: u16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Level of a line written by the fmt layer, if it names one.
    fn of(line: &str) -> Option<Self> {
        line.split_whitespace().find_map(|word| match word {
            "ERROR" => Some(Level::Error),
            "WARN" => Some(Level::Warn),
            "INFO" => Some(Level::Info),
            "DEBUG" => Some(Level::Debug),
            "TRACE" => Some(Level::Trace),
            _ => None,
        })
    }

    fn color(self) -> Color {
        match self {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Green,
            Level::Debug | Level::Trace => Color::DarkGray,
        }
    }
}

pub struct DebugLogState {
    buffer: LogBuffer,
    lines: Vec<String>,
    pub visible: bool,
    /// Lines scrolled back from the newest (0 = follow the tail).
    scroll_offset: usize,
    /// Warnings and errors seen while the pane was hidden.
    unseen_problems: usize,
}

impl DebugLogState {
    pub fn new(buffer: LogBuffer) -> Self {
        Self {
            buffer,
            lines: Vec::new(),
            visible: false,
            scroll_offset: 0,
            unseen_problems: 0,
        }
    }

    /// Move newly captured lines into the scrollback.
    pub fn refresh(&mut self) {
        let new_lines = self.buffer.drain();
        if new_lines.is_empty() {
            return;
        }
        if !self.visible {
            self.unseen_problems += new_lines
                .iter()
                .filter(|l| Level::of(l) >= Some(Level::Warn))
                .count();
        } else if self.scroll_offset > 0 {
            // Keep the same lines on screen while new ones arrive.
            self.scroll_offset += new_lines.len();
        }
        self.lines.extend(new_lines);
        if self.lines.len() > MAX_HISTORY_LINES {
            let excess = self.lines.len() - MAX_HISTORY_LINES;
            self.lines.drain(..excess);
        }
        self.clamp();
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        if self.visible {
            self.scroll_offset = 0;
            self.unseen_problems = 0;
        }
    }

    /// Scroll toward older lines.
    pub fn scroll_up(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(n);
        self.clamp();
    }

    /// Scroll toward newer lines.
    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }

    /// Badge for the status bar while hidden.
    pub fn badge(&self) -> Option<String> {
        (!self.visible && self.unseen_problems > 0)
            .then(|| format!("{} new warning(s), F12", self.unseen_problems))
    }

    fn clamp(&mut self) {
        self.scroll_offset = self.scroll_offset.min(self.lines.len().saturating_sub(1));
    }
}

/// Render the diagnostics pane.
pub fn render(area: Rect, buf: &mut Buffer, state: &DebugLogState) {
    let mut title = " Diagnostics ".to_string();
    if state.scroll_offset > 0 {
        title.push_str(&format!("(-{}) ", state.scroll_offset));
    }
    let dropped = state.buffer.dropped();
    if dropped > 0 {
        title.push_str(&format!("[{} lost] ", dropped));
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let end = state.lines.len().saturating_sub(state.scroll_offset);
    let start = end.saturating_sub(inner.height as usize);
    let lines: Vec<Line> = state.lines[start..end]
        .iter()
        .map(|line| {
            let color = Level::of(line).map_or(Color::White, Level::color);
            Line::from(Span::styled(line.clone(), Style::default().fg(color)))
        })
        .collect();

    Paragraph::new(lines).render(inner, buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(lines: &[&str]) -> (LogBuffer, DebugLogState) {
        let buffer = LogBuffer::new(100);
        for l in lines {
            buffer.push(l.to_string());
        }
        let state = DebugLogState::new(buffer.clone());
        (buffer, state)
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(
            Level::of("2026-01-01T00:00:00Z  WARN listing stalled"),
            Some(Level::Warn)
        );
        assert_eq!(Level::of("ERROR boom"), Some(Level::Error));
        assert_eq!(Level::of("no level here"), None);
    }

    #[test]
    fn test_hidden_pane_counts_problems() {
        let (buffer, mut state) = state_with(&[" INFO started", " WARN slow", " ERROR failed"]);
        state.refresh();
        assert_eq!(state.badge().as_deref(), Some("2 new warning(s), F12"));
        state.toggle();
        assert!(state.badge().is_none());

        buffer.push(" ERROR again".into());
        state.refresh();
        assert!(state.badge().is_none());
    }

    #[test]
    fn test_scroll_clamps_and_holds_position() {
        let lines: Vec<String> = (0..5).map(|i| format!("line {}", i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (buffer, mut state) = state_with(&refs);
        state.toggle();
        state.refresh();

        state.scroll_up(100);
        assert_eq!(state.scroll_offset, 4);
        state.scroll_down(2);
        assert_eq!(state.scroll_offset, 2);

        buffer.push("line 5".into());
        state.refresh();
        assert_eq!(state.scroll_offset, 3);

        state.scroll_down(10);
        assert_eq!(state.scroll_offset, 0);
    }

    #[test]
    fn test_history_is_capped() {
        let (buffer, mut state) = state_with(&[]);
        for chunk in 0..12 {
            for i in 0..100 {
                buffer.push(format!("{} {}", chunk, i));
            }
            state.refresh();
        }
        assert_eq!(state.lines.len(), MAX_HISTORY_LINES);
        assert_eq!(state.lines[0], "2 0");
    }
}
