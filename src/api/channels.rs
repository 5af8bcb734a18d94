//! Channel listing and presence commands.

use anyhow::{Context, Result};

use crate::models::Channel;
use crate::pagination::{all_channels, Listing};
use crate::sdk::ServiceResult;
use crate::session::Session;

/// List every channel using paginated accumulation.
pub async fn list_channels(session: &Session, limit: usize, max_pages: usize) -> Result<()> {
    let service = session.service();
    let listing = all_channels(service.as_ref(), limit, max_pages).await;

    print!("{}", format_listing(&listing));

    // Whatever was fetched is printed before the failure is reported.
    match listing.error {
        Some(err) => Err(err).context("Channel listing is incomplete"),
        None => Ok(()),
    }
}

fn format_listing(listing: &Listing<Channel>) -> String {
    let list = &listing.list;
    let mut out = String::new();
    out.push_str("\nChannels:\n");
    out.push_str(&format!("{:-<60}\n", ""));

    if list.items.is_empty() {
        out.push_str("  (no channels found)\n");
    }
    for channel in &list.items {
        out.push_str(&format!("{}\n", channel.display_name()));
        out.push_str(&format!("  ID: {}\n", channel.id));
        if let Some(description) = channel.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!("  {}\n", description));
        }
        if let Some(status) = channel.status.as_deref() {
            out.push_str(&format!("  Status: {}\n", status));
        }
    }

    out.push_str(&format!("{:-<60}\n", ""));
    if !list.is_complete() {
        out.push_str("(partial listing)\n");
    }
    out.push_str(&format!(
        "Total count: {} ({} fetched in {} page(s))\n",
        list.total,
        list.items.len(),
        list.pages
    ));
    let ids: Vec<&str> = list.items.iter().map(|c| c.id.as_str()).collect();
    out.push_str(&format!("Existing Channels: {}\n", ids.join(", ")));
    out
}

/// Show who is present on a channel.
///
/// The caller joins the channel for the duration of the query, so it is
/// listed alongside everyone else holding a live subscription.
pub async fn show_presence(session: &Session, channel_id: &str) -> Result<()> {
    let present = present_users(session, channel_id)
        .await
        .with_context(|| format!("Failed to get presence for {}", channel_id))?;
    print!("{}", format_presence(channel_id, &present));
    Ok(())
}

async fn present_users(session: &Session, channel_id: &str) -> ServiceResult<Vec<String>> {
    let service = session.service();
    let joined = service.connect(channel_id).await?;
    let present = service.who_is_present(channel_id).await;
    joined.unsubscribe();
    present
}

fn format_presence(channel_id: &str, present: &[String]) -> String {
    let mut out = format!("\nPresence on {}:\n", channel_id);
    if present.is_empty() {
        out.push_str("  (nobody present)\n");
    }
    for user_id in present {
        out.push_str(&format!("  {}\n", user_id));
    }
    out
}
