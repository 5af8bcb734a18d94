//! Message history command.

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::linked_text::{linked_text, plain_text};
use crate::models::{ChatMessage, HistoryOptions, User};
use crate::reactions::{reactors, THUMBS_UP};
use crate::sdk::ChatService;
use crate::session::Session;

/// Print the last `count` messages with their senders and reactions.
pub async fn show_history(session: &Session, channel_id: &str, count: usize) -> Result<()> {
    let service = session.service();
    let history = service
        .get_history(channel_id, HistoryOptions { count })
        .await
        .with_context(|| format!("Failed to load history of {}", channel_id))?;

    if history.messages.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    let users = senders(service.as_ref(), &history.messages).await?;
    if history.is_more {
        println!("(older messages not shown)");
    }
    for msg in &history.messages {
        println!("{}", format_message(msg, &users));
    }
    Ok(())
}

/// Profiles of everyone who sent one of `messages`.
async fn senders(
    service: &dyn ChatService,
    messages: &[ChatMessage],
) -> Result<BTreeMap<String, User>> {
    let mut users = BTreeMap::new();
    for msg in messages {
        if users.contains_key(&msg.user_id) {
            continue;
        }
        if let Some(user) = service
            .get_user(&msg.user_id)
            .await
            .with_context(|| format!("Failed to look up user {}", msg.user_id))?
        {
            users.insert(user.id.clone(), user);
        }
    }
    Ok(users)
}

fn format_message(msg: &ChatMessage, users: &BTreeMap<String, User>) -> String {
    let sender = users
        .get(&msg.user_id)
        .map_or(msg.user_id.as_str(), |u| u.display_name());
    let mut line = format!(
        "[{}] {}: {}",
        msg.timetoken.to_datetime().format("%Y-%m-%d %H:%M:%S"),
        sender,
        plain_text(&linked_text(msg))
    );
    let reacted = reactors(msg, THUMBS_UP).len();
    if reacted > 0 {
        line.push_str(&format!("  ({} x{})", THUMBS_UP, reacted));
    }
    line
}
