//! Message-related models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Timetoken;

/// One reaction receipt: who reacted and when.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionReceipt {
    /// Actor (user id).
    pub uuid: String,
    pub action_timetoken: Timetoken,
}

/// A user referenced by an `@Name` mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionedUser {
    pub id: String,
    pub name: String,
}

/// A labelled link covering `start..end` (char offsets) of the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLink {
    pub start_index: usize,
    pub end_index: usize,
    pub link: String,
}

/// Chat message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub timetoken: Timetoken,
    pub channel_id: String,
    pub user_id: String,
    pub content: String,
    /// Mention index (n-th `@Name` in the content) -> user.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mentioned_users: BTreeMap<usize, MentionedUser>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_links: Vec<TextLink>,
    /// Emoji -> receipts, as delivered (may contain duplicates).
    #[serde(default)]
    pub reactions: BTreeMap<String, Vec<ReactionReceipt>>,
}

impl ChatMessage {
    /// Whether `user_id` has reacted with `emoji`.
    pub fn has_user_reaction(&self, user_id: &str, emoji: &str) -> bool {
        self.reactions
            .get(emoji)
            .is_some_and(|receipts| receipts.iter().any(|r| r.uuid == user_id))
    }
}

/// Payload for `send_text`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mentioned_users: BTreeMap<usize, MentionedUser>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_links: Vec<TextLink>,
}

impl OutgoingMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Options for `get_history`: `{ count }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryOptions {
    pub count: usize,
}

/// Result of `get_history`, oldest first.
#[derive(Debug, Clone, Default)]
pub struct History {
    pub messages: Vec<ChatMessage>,
    pub is_more: bool,
}

/// Last-read timetoken -> users who have read up to it.
pub type ReadReceiptMap = BTreeMap<Timetoken, Vec<String>>;
