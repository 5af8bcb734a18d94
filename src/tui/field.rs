//! Single-line text input shared by the forms and the send box.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

/// Editable text with a char-based cursor.
#[derive(Debug, Default, Clone)]
pub struct TextField {
    /// Current input text.
    input: String,
    /// Cursor position (character offset into `input`).
    cursor_pos: usize,
}

impl TextField {
    pub fn value(&self) -> &str {
        &self.input
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Replace the text and put the cursor at the end.
    pub fn set(&mut self, text: &str) {
        self.input = text.to_string();
        self.cursor_pos = self.input.chars().count();
    }

    /// Insert a character at the current cursor position.
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let prev_byte_pos = self.char_to_byte(self.cursor_pos - 1);
            self.input.drain(prev_byte_pos..byte_pos);
            self.cursor_pos -= 1;
        }
    }

    /// Delete the character at the cursor.
    pub fn delete(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let next_byte_pos = self.char_to_byte(self.cursor_pos + 1);
            self.input.drain(byte_pos..next_byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            self.cursor_pos += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Return the trimmed text and clear the field, or None if it is blank.
    pub fn take(&mut self) -> Option<String> {
        let text = self.input.trim().to_string();
        self.clear();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Apply an editing key. Returns true if the text changed.
    pub fn handle_key(&mut self, code: crossterm::event::KeyCode) -> bool {
        use crossterm::event::KeyCode;

        let before = self.input.len();
        match code {
            KeyCode::Char(c) => {
                self.insert_char(c);
                true
            }
            KeyCode::Backspace => {
                self.backspace();
                self.input.len() != before
            }
            KeyCode::Delete => {
                self.delete();
                self.input.len() != before
            }
            KeyCode::Left => {
                self.move_left();
                false
            }
            KeyCode::Right => {
                self.move_right();
                false
            }
            KeyCode::Home => {
                self.move_home();
                false
            }
            KeyCode::End => {
                self.move_end();
                false
            }
            _ => false,
        }
    }

    /// Convert a char-based cursor position to a byte offset.
    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    /// Visible slice and cursor column for a field `width` columns wide.
    fn visible(&self, width: usize) -> (String, usize) {
        let chars: Vec<char> = self.input.chars().collect();
        let before: String = chars[..self.cursor_pos.min(chars.len())].iter().collect();
        let cursor_col = before.width();
        if cursor_col < width {
            return (self.input.clone(), cursor_col);
        }

        // Scroll so the cursor sits on the last column.
        let mut start = 0;
        let mut col = cursor_col;
        while col >= width && start < chars.len() {
            col -= unicode_width::UnicodeWidthChar::width(chars[start]).unwrap_or(0);
            start += 1;
        }
        (chars[start..].iter().collect(), col)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Height of a bordered field.
pub const FIELD_HEIGHT: u16 = 3;

/// Render a bordered field with a title, placing the cursor when focused.
pub fn render(
    frame: &mut Frame,
    area: Rect,
    field: &TextField,
    title: &str,
    placeholder: &str,
    focused: bool,
) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let border_type = if focused {
        BorderType::Double
    } else {
        BorderType::Plain
    };
    let title_style = if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title(Span::styled(format!(" {} ", title), title_style));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width < 2 {
        return;
    }

    let width = inner.width as usize - 1;
    let (line, cursor_col) = if field.is_empty() {
        (
            Line::from(Span::styled(
                format!(" {}", placeholder),
                Style::default().fg(Color::DarkGray),
            )),
            0,
        )
    } else {
        let (text, col) = field.visible(width);
        (
            Line::from(Span::styled(
                format!(" {}", text),
                Style::default().fg(Color::White),
            )),
            col,
        )
    };
    frame.render_widget(Paragraph::new(line), Rect::new(inner.x, inner.y, inner.width, 1));

    if focused {
        frame.set_cursor_position((inner.x + 1 + cursor_col as u16, inner.y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyCode;

    #[test]
    fn test_editing_multibyte() {
        let mut f = TextField::default();
        for c in "héllo".chars() {
            f.insert_char(c);
        }
        f.move_left();
        f.move_left();
        f.backspace();
        assert_eq!(f.value(), "hélo");
        f.move_home();
        f.delete();
        assert_eq!(f.value(), "élo");
        f.move_end();
        f.insert_char('!');
        assert_eq!(f.value(), "élo!");
    }

    #[test]
    fn test_take_trims_and_clears() {
        let mut f = TextField::default();
        f.set("  hi  ");
        assert_eq!(f.take(), Some("hi".to_string()));
        assert!(f.is_empty());
        f.set("   ");
        assert_eq!(f.take(), None);
    }

    #[test]
    fn test_handle_key_reports_changes() {
        let mut f = TextField::default();
        assert!(f.handle_key(KeyCode::Char('a')));
        assert!(!f.handle_key(KeyCode::Left));
        assert!(!f.handle_key(KeyCode::Backspace));
        assert!(f.handle_key(KeyCode::Delete));
        assert!(f.is_empty());
    }

    #[test]
    fn test_visible_scrolls_to_cursor() {
        let mut f = TextField::default();
        f.set("abcdefghij");
        let (text, col) = f.visible(4);
        assert_eq!(col, 3);
        assert_eq!(text, "hij");
        f.move_home();
        assert_eq!(f.visible(4), ("abcdefghij".to_string(), 0));
    }
}
