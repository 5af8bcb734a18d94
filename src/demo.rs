//! Demo workspace: seed data and a simulated interlocutor.

use std::time::Duration;

use crate::models::{ChannelFields, ChatMessage, OutgoingMessage, User, UserCustom, UserData};
use crate::sdk::memory::{MemoryChat, MemoryServer};
use crate::sdk::{ChatService, ServiceResult};

/// User id the channel manager acts as unless configured otherwise.
pub const DEFAULT_MANAGER_USER: &str = "channel-admin";

/// Name given to the direct conversation.
pub const SUPPORT_CHANNEL_NAME: &str = "Support Channel";

/// Pause between the peer seeing a message and answering it.
const PEER_REPLY_DELAY: Duration = Duration::from_millis(1500);

/// A demo persona.
#[derive(Debug, Clone, Copy)]
pub struct Persona {
    pub id: &'static str,
    pub name: &'static str,
    pub initials: &'static str,
    pub avatar: &'static str,
}

impl Persona {
    pub fn data(&self) -> UserData {
        UserData {
            name: Some(self.name.to_string()),
            custom: Some(UserCustom {
                initials: Some(self.initials.to_string()),
                avatar: Some(self.avatar.to_string()),
            }),
        }
    }
}

pub const SUPPORT_AGENT: Persona = Persona {
    id: "support-agent",
    name: "John (Support Agent)",
    initials: "SA",
    avatar: "#9fa7df",
};

pub const SUPPORTED_USER: Persona = Persona {
    id: "supported-user",
    name: "Mary Watson",
    initials: "MW",
    avatar: "#ffab91",
};

/// Who the chat screen acts as, and who it talks to.
#[derive(Debug, Clone, Copy)]
pub struct Roles {
    pub me: Persona,
    pub peer: Persona,
}

impl Roles {
    pub fn new(as_agent: bool) -> Self {
        if as_agent {
            Self {
                me: SUPPORT_AGENT,
                peer: SUPPORTED_USER,
            }
        } else {
            Self {
                me: SUPPORTED_USER,
                peer: SUPPORT_AGENT,
            }
        }
    }
}

const CHANNELS: [(&str, &str, &str); 5] = [
    ("announcements", "Announcements", "Company-wide news"),
    ("engineering", "Engineering", "Builds, deploys and reviews"),
    ("general", "General", "Anything goes"),
    ("random", "Random", "Off-topic chatter"),
    ("support", "Support", "Customer escalations"),
];

/// A workspace with the demo channels, both personas and a short history
/// in their direct conversation.
pub async fn workspace(typing_timeout: Duration) -> ServiceResult<MemoryServer> {
    let server = MemoryServer::new(typing_timeout);
    let admin = server.client(DEFAULT_MANAGER_USER);

    admin
        .create_user(
            DEFAULT_MANAGER_USER,
            UserData {
                name: Some("Channel Admin".into()),
                custom: None,
            },
        )
        .await?;
    for (id, name, description) in CHANNELS {
        admin
            .create_channel(
                id,
                ChannelFields {
                    name: Some(name.into()),
                    description: Some(description.into()),
                    status: Some("active".into()),
                },
            )
            .await?;
    }

    admin.create_user(SUPPORT_AGENT.id, SUPPORT_AGENT.data()).await?;
    admin.create_user(SUPPORTED_USER.id, SUPPORTED_USER.data()).await?;

    let agent = server.client(SUPPORT_AGENT.id);
    let customer = user_of(&agent, SUPPORTED_USER.id).await?;
    let dm = agent
        .create_direct_conversation(
            &customer,
            ChannelFields {
                name: Some(SUPPORT_CHANNEL_NAME.into()),
                ..ChannelFields::default()
            },
        )
        .await?;
    agent
        .send_text(
            &dm.channel.id,
            OutgoingMessage::plain("Hi! Thanks for reaching out. How can I help?"),
        )
        .await?;
    let question = server
        .client(SUPPORTED_USER.id)
        .send_text(
            &dm.channel.id,
            OutgoingMessage::plain("My order hasn't shipped yet, see www.example.com/orders/42"),
        )
        .await?;
    agent.set_last_read_message(&dm.channel.id, question).await?;

    tracing::debug!(channels = CHANNELS.len(), "demo workspace seeded");
    Ok(server)
}

async fn user_of(client: &MemoryChat, id: &str) -> ServiceResult<User> {
    client
        .get_user(id)
        .await?
        .ok_or_else(|| crate::sdk::ServiceError::user_not_found(id))
}

/// Answer messages from the other party in the direct conversation.
///
/// Runs until the subscription closes; the owning session aborts it on close.
pub async fn run_peer(peer: MemoryChat, other: Persona) {
    let other_user = match user_of(&peer, other.id).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Demo peer could not start: {}", e);
            return;
        }
    };
    let dm = match peer
        .create_direct_conversation(&other_user, ChannelFields::default())
        .await
    {
        Ok(dm) => dm,
        Err(e) => {
            tracing::warn!("Demo peer could not open conversation: {}", e);
            return;
        }
    };
    let channel_id = dm.channel.id;
    let mut messages = match peer.connect(&channel_id).await {
        Ok(sub) => sub,
        Err(e) => {
            tracing::warn!("Demo peer could not connect: {}", e);
            return;
        }
    };

    while let Some(msg) = messages.recv().await {
        if msg.user_id == peer.current_user_id() {
            continue;
        }
        if let Err(e) = answer(&peer, &channel_id, &msg).await {
            tracing::warn!("Demo peer failed to answer: {}", e);
        }
    }
}

async fn answer(peer: &MemoryChat, channel_id: &str, msg: &ChatMessage) -> ServiceResult<()> {
    peer.set_last_read_message(channel_id, msg.timetoken).await?;
    peer.start_typing(channel_id).await?;
    tokio::time::sleep(PEER_REPLY_DELAY).await;
    peer.send_text(channel_id, OutgoingMessage::plain(reply_to(&msg.content)))
        .await?;
    Ok(())
}

/// Canned answer for `content`.
fn reply_to(content: &str) -> String {
    let lower = content.to_lowercase();
    if lower.contains("thank") {
        "You're welcome!".to_string()
    } else if content.trim_end().ends_with('?') {
        "Good question, let me check and get back to you.".to_string()
    } else {
        format!("Got it: \"{}\"", content.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoryOptions, ListOptions};

    #[tokio::test]
    async fn test_workspace_seed() {
        let server = workspace(Duration::from_secs(5)).await.unwrap();
        let admin = server.client(DEFAULT_MANAGER_USER);
        let page = admin.get_channels(ListOptions::default()).await.unwrap();
        // Five public channels plus the direct conversation.
        assert_eq!(page.total, 6);

        let agent = server.client(SUPPORT_AGENT.id);
        let customer = agent.get_user(SUPPORTED_USER.id).await.unwrap().unwrap();
        let dm = agent
            .create_direct_conversation(&customer, ChannelFields::default())
            .await
            .unwrap();
        assert_eq!(dm.channel.name.as_deref(), Some(SUPPORT_CHANNEL_NAME));
        let history = agent
            .get_history(&dm.channel.id, HistoryOptions { count: 10 })
            .await
            .unwrap();
        assert_eq!(history.messages.len(), 2);
    }

    #[test]
    fn test_roles() {
        assert_eq!(Roles::new(true).me.id, SUPPORT_AGENT.id);
        assert_eq!(Roles::new(false).me.id, SUPPORTED_USER.id);
    }

    #[test]
    fn test_reply_to() {
        assert_eq!(reply_to("thanks a lot"), "You're welcome!");
        assert!(reply_to("where is it?").starts_with("Good question"));
        assert_eq!(reply_to(" ok "), "Got it: \"ok\"");
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_answers_and_marks_read() {
        let server = workspace(Duration::from_secs(5)).await.unwrap();
        let roles = Roles::new(false);
        let peer = tokio::spawn(run_peer(server.client(roles.peer.id), roles.me));
        // Let the peer connect.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let me = server.client(roles.me.id);
        let peer_user = me.get_user(roles.peer.id).await.unwrap().unwrap();
        let dm = me
            .create_direct_conversation(&peer_user, ChannelFields::default())
            .await
            .unwrap();
        let mut stream = me.connect(&dm.channel.id).await.unwrap();
        let sent = me
            .send_text(&dm.channel.id, OutgoingMessage::plain("thanks"))
            .await
            .unwrap();

        assert_eq!(stream.recv().await.unwrap().timetoken, sent);
        let reply = stream.recv().await.unwrap();
        assert_eq!(reply.user_id, roles.peer.id);
        assert_eq!(reply.content, "You're welcome!");

        let mut receipts = me.stream_read_receipts(&dm.channel.id).await.unwrap();
        let map = receipts.recv().await.unwrap();
        assert_eq!(map.get(&sent), Some(&vec![roles.peer.id.to_string()]));
        peer.abort();
    }
}
