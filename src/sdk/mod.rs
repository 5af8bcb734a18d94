//! The chat SDK boundary.
//!
//! Everything behind [`ChatService`] is owned by the hosted chat service:
//! channel and message storage, presence, typing timeouts, pagination.
//! Screens and commands only ever talk to this trait.

pub mod memory;
mod subscription;

use async_trait::async_trait;

use crate::models::{
    Channel, ChannelFields, ChannelPage, ChatMessage, DeleteOptions, History, HistoryOptions,
    ListOptions, Membership, OutgoingMessage, ReadReceiptMap, Timetoken, User, UserData,
};

pub use subscription::{Listeners, Subscription};

/// Failure reported by the chat service.
///
/// Screens surface every variant the same way (one error slot), so the
/// display text is what matters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("{kind} \"{id}\" not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} \"{id}\" already exists")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("chat service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    pub fn channel_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "channel",
            id: id.to_string(),
        }
    }

    pub fn user_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "user",
            id: id.to_string(),
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Result of `create_direct_conversation`.
#[derive(Debug, Clone)]
pub struct DirectConversation {
    pub channel: Channel,
    pub host_membership: Membership,
    pub invitee_membership: Membership,
}

/// The hosted chat SDK, as seen from this client.
///
/// Calls are made on behalf of [`ChatService::current_user_id`]. Streams
/// are returned as [`Subscription`]s that stop delivering and deregister
/// when dropped.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Id of the user this client acts as.
    fn current_user_id(&self) -> &str;

    // -- users --

    async fn get_user(&self, id: &str) -> ServiceResult<Option<User>>;

    async fn create_user(&self, id: &str, data: UserData) -> ServiceResult<User>;

    async fn update_user(&self, id: &str, data: UserData) -> ServiceResult<User>;

    async fn get_users(&self) -> ServiceResult<Vec<User>>;

    // -- channels --

    async fn create_channel(&self, id: &str, fields: ChannelFields) -> ServiceResult<Channel>;

    async fn get_channel(&self, id: &str) -> ServiceResult<Option<Channel>>;

    /// One page of channels, ordered by id.
    async fn get_channels(&self, options: ListOptions) -> ServiceResult<ChannelPage>;

    async fn update_channel(&self, id: &str, fields: ChannelFields) -> ServiceResult<Channel>;

    /// Hard delete removes the channel; soft delete marks it `deleted`.
    async fn delete_channel(&self, id: &str, options: DeleteOptions) -> ServiceResult<()>;

    async fn get_channel_members(&self, channel_id: &str) -> ServiceResult<Vec<User>>;

    /// Get or create the direct channel between the current user and `user`.
    async fn create_direct_conversation(
        &self,
        user: &User,
        fields: ChannelFields,
    ) -> ServiceResult<DirectConversation>;

    /// User ids currently connected to the channel.
    async fn who_is_present(&self, channel_id: &str) -> ServiceResult<Vec<String>>;

    /// Stream of typing user ids; each item replaces the previous one.
    async fn get_typing(&self, channel_id: &str) -> ServiceResult<Subscription<Vec<String>>>;

    async fn start_typing(&self, channel_id: &str) -> ServiceResult<()>;

    async fn stop_typing(&self, channel_id: &str) -> ServiceResult<()>;

    // -- messages --

    async fn send_text(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> ServiceResult<Timetoken>;

    /// Most recent `count` messages, oldest first.
    async fn get_history(
        &self,
        channel_id: &str,
        options: HistoryOptions,
    ) -> ServiceResult<History>;

    /// Stream of new messages. Connecting also makes the user present.
    async fn connect(&self, channel_id: &str) -> ServiceResult<Subscription<ChatMessage>>;

    /// Stream of edited messages (reactions toggled by anyone).
    async fn stream_message_updates(
        &self,
        channel_id: &str,
    ) -> ServiceResult<Subscription<ChatMessage>>;

    /// Add the current user's reaction, or remove it if present.
    async fn toggle_reaction(
        &self,
        channel_id: &str,
        timetoken: Timetoken,
        emoji: &str,
    ) -> ServiceResult<ChatMessage>;

    async fn set_last_read_message(
        &self,
        channel_id: &str,
        timetoken: Timetoken,
    ) -> ServiceResult<Membership>;

    /// Stream of whole read-receipt maps; each item replaces the previous one.
    async fn stream_read_receipts(
        &self,
        channel_id: &str,
    ) -> ServiceResult<Subscription<ReadReceiptMap>>;
}
