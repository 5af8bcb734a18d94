//! Message list: cards with linked text, read receipts and reactions.

use std::collections::BTreeMap;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::linked_text::{linked_text, MessagePart};
use crate::models::{ChatMessage, ReadReceiptMap, Timetoken, User};
use crate::reactions::{self, THUMBS_UP};

/// Messages in display order plus the selection.
#[derive(Default)]
pub struct MessageList {
    messages: Vec<ChatMessage>,
    /// Index of the selected message.
    selected: usize,
    /// Vertical scroll offset (in rendered lines).
    scroll_offset: usize,
}

impl MessageList {
    #[cfg(test)]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message and select it, so the list follows the newest.
    ///
    /// A message already in the list is replaced instead.
    pub fn push(&mut self, message: ChatMessage) {
        if self.replace(message.clone()) {
            return;
        }
        self.messages.push(message);
        self.selected = self.messages.len() - 1;
    }

    /// Swap in a newer copy of a listed message. Returns false if it is not listed.
    pub fn replace(&mut self, message: ChatMessage) -> bool {
        match self
            .messages
            .iter_mut()
            .find(|m| m.timetoken == message.timetoken)
        {
            Some(slot) => {
                *slot = message;
                true
            }
            None => false,
        }
    }

    pub fn selected(&self) -> Option<&ChatMessage> {
        self.messages.get(self.selected)
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.messages.len() {
            self.selected += 1;
        }
    }

    pub fn select_last(&mut self) {
        self.selected = self.messages.len().saturating_sub(1);
    }
}

/// What the cards need besides the messages themselves.
pub struct CardContext<'a> {
    pub users: &'a BTreeMap<String, User>,
    pub receipts: &'a ReadReceiptMap,
    pub current_user_id: &'a str,
}

impl CardContext<'_> {
    fn name_of<'b>(&'b self, user_id: &'b str) -> &'b str {
        self.users
            .get(user_id)
            .map_or(user_id, |u| u.display_name())
    }

    fn names(&self, ids: impl Iterator<Item = String>) -> String {
        ids.map(|id| self.name_of(&id).to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the message list into the given area.
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    list: &MessageList,
    ctx: &CardContext<'_>,
    title: &str,
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

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title(Span::styled(
            format!(" {} ", title),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if list.is_empty() {
        Paragraph::new(Line::from(Span::styled(
            " No messages yet",
            Style::default().fg(Color::DarkGray),
        )))
        .render(inner, buf);
        return;
    }

    let (all_lines, ranges) = build_message_lines(list, ctx, inner.width as usize, focused);
    let total_lines = all_lines.len();
    let visible_height = inner.height as usize;
    let scroll = compute_auto_scroll(
        list.scroll_offset,
        list.selected,
        &ranges,
        visible_height,
        total_lines,
    );

    for (row, line) in all_lines.into_iter().skip(scroll).take(visible_height).enumerate() {
        let line_area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        Paragraph::new(line).render(line_area, buf);
    }

    if total_lines > visible_height {
        let indicator_x = inner.x + inner.width.saturating_sub(1);
        if scroll > 0 {
            let cell = &mut buf[(indicator_x, inner.y)];
            cell.set_char('^');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
        if scroll + visible_height < total_lines {
            let cell = &mut buf[(indicator_x, inner.y + inner.height - 1)];
            cell.set_char('v');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
    }
}

/// Build the flat line buffer and per-message line ranges in a single pass.
fn build_message_lines(
    list: &MessageList,
    ctx: &CardContext<'_>,
    width: usize,
    focused: bool,
) -> (Vec<Line<'static>>, Vec<(usize, usize)>) {
    let mut lines = Vec::new();
    let mut ranges = Vec::new();

    for (idx, msg) in list.messages.iter().enumerate() {
        let start = lines.len();
        render_message_card(&mut lines, msg, ctx, width, focused && idx == list.selected);
        lines.push(Line::from(""));
        ranges.push((start, lines.len()));
    }

    (lines, ranges)
}

fn part_style(part: &MessagePart) -> Style {
    match part {
        MessagePart::Text(_) => Style::default().fg(Color::White),
        MessagePart::PlainLink { .. } | MessagePart::TextLink { .. } => Style::default()
            .fg(Color::Blue)
            .add_modifier(Modifier::UNDERLINED),
        MessagePart::Mention { .. } => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    }
}

/// Parts as styled text, with labelled links followed by their target.
fn styled_parts(parts: &[MessagePart]) -> Vec<(String, Style)> {
    let mut out = Vec::new();
    for part in parts {
        out.push((part.display_text(), part_style(part)));
        if let MessagePart::TextLink { link, .. } = part {
            out.push((format!(" <{}>", link), Style::default().fg(Color::DarkGray)));
        }
    }
    out
}

/// Reaction summary for one message: "Reacted to by: ..." or "Not reacted to".
pub fn reaction_summary(msg: &ChatMessage, ctx: &CardContext<'_>) -> String {
    let receipts = reactions::reactors(msg, THUMBS_UP);
    if receipts.is_empty() {
        "Not reacted to".to_string()
    } else {
        format!(
            "Reacted to by: {}",
            ctx.names(receipts.into_iter().map(|r| r.uuid))
        )
    }
}

/// "Read By: ..." for a message that is someone's last read, if any.
pub fn read_by(timetoken: Timetoken, ctx: &CardContext<'_>) -> Option<String> {
    let readers = ctx.receipts.get(&timetoken).filter(|r| !r.is_empty())?;
    Some(format!("Read By: {}", ctx.names(readers.iter().cloned())))
}

/// Render a single message card into the line buffer.
fn render_message_card(
    lines: &mut Vec<Line<'static>>,
    msg: &ChatMessage,
    ctx: &CardContext<'_>,
    width: usize,
    is_selected: bool,
) {
    let inner_width = width.saturating_sub(2);
    if inner_width < 12 {
        return;
    }
    let content_width = inner_width - 2;

    let border_style = if is_selected {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };
    let dim = Style::default().fg(Color::DarkGray);
    let edge = |s: &'static str| Span::styled(s, border_style);
    let rule = format!("+-{}-+", "-".repeat(content_width));

    lines.push(Line::from(Span::styled(rule.clone(), border_style)));

    // "| [SA] John (Support Agent)          12:30 |"
    let user = ctx.users.get(&msg.user_id);
    let initials = user.map(User::initials).unwrap_or_default();
    let avatar = user
        .and_then(|u| u.custom.avatar.as_deref())
        .and_then(parse_hex_color)
        .unwrap_or(Color::Gray);
    let badge = format!("[{}]", initials);
    let sender = format!(" {}", ctx.name_of(&msg.user_id));
    let time = msg.timetoken.short_time();
    let pad = content_width.saturating_sub(badge.width() + sender.width() + time.width());
    lines.push(Line::from(vec![
        edge("| "),
        Span::styled(badge, Style::default().fg(Color::Black).bg(avatar)),
        Span::styled(
            sender,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(pad)),
        Span::styled(time, dim),
        edge(" |"),
    ]));

    for row in wrap_spans(&styled_parts(&linked_text(msg)), content_width) {
        let used: usize = row.iter().map(|s| s.content.width()).sum();
        let mut spans = vec![edge("| ")];
        spans.extend(row);
        spans.push(Span::raw(" ".repeat(content_width.saturating_sub(used))));
        spans.push(edge(" |"));
        lines.push(Line::from(spans));
    }

    let mut footer: Vec<(String, Style)> = Vec::new();
    if let Some(read) = read_by(msg.timetoken, ctx) {
        footer.push((read, Style::default().fg(Color::Green)));
    }
    footer.push((reaction_summary(msg, ctx), Style::default().fg(Color::Yellow)));
    if is_selected {
        let action = if msg.has_user_reaction(ctx.current_user_id, THUMBS_UP) {
            "[r] Remove my reaction  [m] Mark read"
        } else {
            "[r] React to this  [m] Mark read"
        };
        footer.push((action.to_string(), Style::default().fg(Color::Cyan)));
    }
    for (text, style) in footer {
        for row in wrap_spans(&[(text, style)], content_width) {
            let used: usize = row.iter().map(|s| s.content.width()).sum();
            let mut spans = vec![edge("| ")];
            spans.extend(row);
            spans.push(Span::raw(" ".repeat(content_width.saturating_sub(used))));
            spans.push(edge(" |"));
            lines.push(Line::from(spans));
        }
    }

    lines.push(Line::from(Span::styled(rule, border_style)));
}

/// `#rrggbb` to a terminal colour.
fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    Some(Color::Rgb((value >> 16) as u8, (value >> 8) as u8, value as u8))
}

/// Word-wrap styled text to `width` columns, splitting overlong words.
fn wrap_spans(parts: &[(String, Style)], width: usize) -> Vec<Vec<Span<'static>>> {
    let mut rows: Vec<Vec<Span<'static>>> = Vec::new();
    let mut row: Vec<Span<'static>> = Vec::new();
    let mut used = 0;

    for (text, style) in parts {
        for token in tokens(text) {
            if token == "\n" {
                rows.push(std::mem::take(&mut row));
                used = 0;
                continue;
            }
            let is_space = token.chars().all(char::is_whitespace);
            let w = token.width();
            if used + w <= width {
                if !(is_space && used == 0) {
                    row.push(Span::styled(token.to_string(), *style));
                    used += w;
                }
                continue;
            }
            if is_space {
                continue;
            }
            if used > 0 {
                rows.push(std::mem::take(&mut row));
                used = 0;
            }
            // Hard-split a word wider than the line.
            let mut chunk = String::new();
            for c in token.chars() {
                let cw = c.width().unwrap_or(0);
                if used + cw > width {
                    row.push(Span::styled(std::mem::take(&mut chunk), *style));
                    rows.push(std::mem::take(&mut row));
                    used = 0;
                }
                chunk.push(c);
                used += cw;
            }
            if !chunk.is_empty() {
                row.push(Span::styled(chunk, *style));
            }
        }
    }
    if !row.is_empty() || rows.is_empty() {
        rows.push(row);
    }
    rows
}

/// Split into runs of non-space, runs of space, and single newlines.
fn tokens(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev: Option<bool> = None;
    for (i, c) in text.char_indices() {
        if c == '\n' {
            if start < i {
                out.push(&text[start..i]);
            }
            out.push("\n");
            start = i + 1;
            prev = None;
            continue;
        }
        let space = c.is_whitespace();
        if prev.is_some_and(|p| p != space) {
            out.push(&text[start..i]);
            start = i;
        }
        prev = Some(space);
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// Compute scroll offset that keeps the selected message visible.
fn compute_auto_scroll(
    current_scroll: usize,
    selected: usize,
    ranges: &[(usize, usize)],
    visible_height: usize,
    total_lines: usize,
) -> usize {
    if ranges.is_empty() || total_lines <= visible_height {
        return 0;
    }

    let Some(&(sel_start, sel_end)) = ranges.get(selected) else {
        return current_scroll;
    };

    let mut scroll = current_scroll;
    if sel_end - sel_start >= visible_height {
        // Taller than the viewport: show its start.
        scroll = sel_start;
    } else {
        if sel_start < scroll {
            scroll = sel_start;
        }
        if sel_end > scroll + visible_height {
            scroll = sel_end - visible_height;
        }
    }

    scroll.min(total_lines - visible_height)
}
