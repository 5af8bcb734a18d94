//! One-shot CLI commands against a session.

mod channels;
mod messages;

use anyhow::Result;

use crate::session::Session;

/// Print every channel, fetched `limit` per page (prints to stdout)
pub async fn list_channels(session: &Session, limit: usize, max_pages: usize) -> Result<()> {
    channels::list_channels(session, limit, max_pages).await
}

/// Print the user ids present on a channel
pub async fn show_presence(session: &Session, channel_id: &str) -> Result<()> {
    channels::show_presence(session, channel_id).await
}

/// Print the last `count` messages of a channel
pub async fn show_history(session: &Session, channel_id: &str, count: usize) -> Result<()> {
    messages::show_history(session, channel_id, count).await
}
