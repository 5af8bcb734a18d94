//! Splitting message content into renderable parts.

use std::collections::BTreeMap;

use crate::models::{ChatMessage, MentionedUser, TextLink};

/// URL prefixes recognised as bare links.
const LINK_PREFIXES: [&str; 3] = ["https://", "http://", "www."];

/// Trailing characters not considered part of a bare link.
const LINK_TRAILING_PUNCT: [char; 6] = ['.', ',', '!', '?', ')', ':'];

/// One piece of rendered message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    Text(String),
    PlainLink { link: String },
    TextLink { text: String, link: String },
    Mention { id: String, name: String },
}

impl MessagePart {
    /// The text a reader sees for this part.
    pub fn display_text(&self) -> String {
        match self {
            MessagePart::Text(text) => text.clone(),
            MessagePart::PlainLink { link } => link.clone(),
            MessagePart::TextLink { text, .. } => text.clone(),
            MessagePart::Mention { name, .. } => format!("@{}", name),
        }
    }
}

/// Parts of `message`, in content order.
pub fn linked_text(message: &ChatMessage) -> Vec<MessagePart> {
    split(
        &message.content,
        &message.mentioned_users,
        &message.text_links,
    )
}

/// Flatten parts back to display text.
pub fn plain_text(parts: &[MessagePart]) -> String {
    parts.iter().map(MessagePart::display_text).collect()
}

/// Split `content` using mentions (by occurrence index) and labelled links (by char range).
pub fn split(
    content: &str,
    mentions: &BTreeMap<usize, MentionedUser>,
    links: &[TextLink],
) -> Vec<MessagePart> {
    let chars: Vec<char> = content.chars().collect();
    let mut links: Vec<&TextLink> = links
        .iter()
        .filter(|l| l.start_index < l.end_index && l.end_index <= chars.len())
        .collect();
    links.sort_by_key(|l| l.start_index);
    let mut links = links.into_iter().peekable();

    let mut parts = Vec::new();
    let mut text = String::new();
    let mut mention_index = 0;
    let mut i = 0;

    while i < chars.len() {
        while links.peek().is_some_and(|l| l.start_index < i) {
            links.next();
        }

        if let Some(link) = links.next_if(|l| l.start_index == i) {
            flush(&mut parts, &mut text);
            parts.push(MessagePart::TextLink {
                text: chars[link.start_index..link.end_index].iter().collect(),
                link: link.link.clone(),
            });
            i = link.end_index;
            continue;
        }

        if chars[i] == '@' {
            if let Some(user) = mentions.get(&mention_index) {
                let name: Vec<char> = user.name.chars().collect();
                if chars[i + 1..].starts_with(&name) {
                    flush(&mut parts, &mut text);
                    parts.push(MessagePart::Mention {
                        id: user.id.clone(),
                        name: user.name.clone(),
                    });
                    mention_index += 1;
                    i += 1 + name.len();
                    continue;
                }
            }
        }

        let word_start = i == 0 || chars[i - 1].is_whitespace();
        if word_start && starts_link(&chars[i..]) {
            let mut end = chars[i..]
                .iter()
                .position(|c| c.is_whitespace())
                .map_or(chars.len(), |p| i + p);
            while end > i && LINK_TRAILING_PUNCT.contains(&chars[end - 1]) {
                end -= 1;
            }
            flush(&mut parts, &mut text);
            parts.push(MessagePart::PlainLink {
                link: chars[i..end].iter().collect(),
            });
            i = end;
            continue;
        }

        text.push(chars[i]);
        i += 1;
    }

    flush(&mut parts, &mut text);
    parts
}

fn starts_link(rest: &[char]) -> bool {
    LINK_PREFIXES.iter().any(|prefix| {
        let prefix: Vec<char> = prefix.chars().collect();
        rest.len() > prefix.len() && rest.starts_with(&prefix)
    })
}

fn flush(parts: &mut Vec<MessagePart>, text: &mut String) {
    if !text.is_empty() {
        parts.push(MessagePart::Text(std::mem::take(text)));
    }
}
