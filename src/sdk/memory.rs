//! In-process stand-in for the hosted chat service.
//!
//! `MemoryServer` holds the shared state of one demo workspace; each
//! `MemoryChat` is a client acting as one user against it. Nothing here
//! touches the network or the disk.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    ChatService, DirectConversation, Listeners, ServiceError, ServiceResult, Subscription,
};
use crate::models::{
    Channel, ChannelFields, ChannelPage, ChannelType, ChatMessage, DeleteOptions, History,
    HistoryOptions, ListOptions, Membership, OutgoingMessage, PageCursor, ReactionReceipt,
    ReadReceiptMap, Timetoken, User, UserCustom, UserData,
};

/// Page size when the caller does not pass `limit`.
const DEFAULT_PAGE_LIMIT: usize = 100;

/// Status written by a soft delete.
const SOFT_DELETED_STATUS: &str = "deleted";

#[derive(Clone, Copy)]
enum StreamKind {
    Messages,
    Updates,
    Typing,
    Receipts,
}

struct ChannelRecord {
    channel: Channel,
    members: BTreeSet<String>,
    last_read: BTreeMap<String, Timetoken>,
    messages: Vec<ChatMessage>,
    /// User id -> generation of the typing signal that set it.
    typing: BTreeMap<String, u64>,
    message_listeners: Listeners<ChatMessage>,
    update_listeners: Listeners<ChatMessage>,
    typing_listeners: Listeners<Vec<String>>,
    receipt_listeners: Listeners<ReadReceiptMap>,
}

impl ChannelRecord {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            members: BTreeSet::new(),
            last_read: BTreeMap::new(),
            messages: Vec::new(),
            typing: BTreeMap::new(),
            message_listeners: Listeners::default(),
            update_listeners: Listeners::default(),
            typing_listeners: Listeners::default(),
            receipt_listeners: Listeners::default(),
        }
    }

    fn typing_ids(&self) -> Vec<String> {
        self.typing.keys().cloned().collect()
    }

    /// Users holding a live message or typing subscription.
    fn present_ids(&self) -> Vec<String> {
        let mut ids = self.message_listeners.user_ids();
        ids.extend(self.typing_listeners.user_ids());
        ids.sort();
        ids.dedup();
        ids
    }

    fn read_receipts(&self) -> ReadReceiptMap {
        let mut map = ReadReceiptMap::new();
        for (user_id, tt) in &self.last_read {
            map.entry(*tt).or_default().push(user_id.clone());
        }
        map
    }

    fn emit_typing(&mut self) {
        let ids = self.typing_ids();
        self.typing_listeners.emit(&ids);
    }

    fn remove_listener(&mut self, kind: StreamKind, id: u64) -> bool {
        match kind {
            StreamKind::Messages => self.message_listeners.remove(id),
            StreamKind::Updates => self.update_listeners.remove(id),
            StreamKind::Typing => self.typing_listeners.remove(id),
            StreamKind::Receipts => self.receipt_listeners.remove(id),
        }
    }

    fn listener_count(&self) -> usize {
        self.message_listeners.len()
            + self.update_listeners.len()
            + self.typing_listeners.len()
            + self.receipt_listeners.len()
    }
}

#[derive(Default)]
struct State {
    users: BTreeMap<String, User>,
    channels: BTreeMap<String, ChannelRecord>,
    last_timetoken: u64,
    next_listener: u64,
    typing_generation: u64,
}

impl State {
    /// Strictly increasing timetoken, close to wall-clock time.
    fn next_timetoken(&mut self) -> Timetoken {
        let tt = Timetoken::now().0.max(self.last_timetoken + 1);
        self.last_timetoken = tt;
        Timetoken(tt)
    }

    fn next_listener_id(&mut self) -> u64 {
        self.next_listener += 1;
        self.next_listener
    }

    fn channel_mut(&mut self, id: &str) -> ServiceResult<&mut ChannelRecord> {
        self.channels
            .get_mut(id)
            .ok_or_else(|| ServiceError::channel_not_found(id))
    }
}

struct Shared {
    state: Mutex<State>,
    typing_timeout: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One demo workspace shared by any number of clients.
#[derive(Clone)]
pub struct MemoryServer {
    shared: Arc<Shared>,
}

impl MemoryServer {
    pub fn new(typing_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                typing_timeout,
            }),
        }
    }

    /// A client acting as `user_id`.
    pub fn client(&self, user_id: &str) -> MemoryChat {
        MemoryChat {
            shared: Arc::clone(&self.shared),
            user_id: user_id.to_string(),
        }
    }

    /// Live listeners of every stream kind on a channel.
    pub fn listener_count(&self, channel_id: &str) -> usize {
        self.shared
            .lock()
            .channels
            .get(channel_id)
            .map_or(0, ChannelRecord::listener_count)
    }
}

/// A client of a [`MemoryServer`].
#[derive(Clone)]
pub struct MemoryChat {
    shared: Arc<Shared>,
    user_id: String,
}

impl MemoryChat {
    /// Register a listener and wrap it in a subscription that removes it on drop.
    fn subscribe<T, F>(
        &self,
        channel_id: &str,
        kind: StreamKind,
        register: F,
    ) -> ServiceResult<Subscription<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut ChannelRecord, u64, &str) -> tokio::sync::mpsc::UnboundedReceiver<T>,
    {
        let mut state = self.shared.lock();
        let id = state.next_listener_id();
        let record = state.channel_mut(channel_id)?;
        let rx = register(record, id, &self.user_id);
        drop(state);

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let channel_id = channel_id.to_string();
        Ok(Subscription::new(rx, move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut state = shared.lock();
            if let Some(record) = state.channels.get_mut(&channel_id) {
                if record.remove_listener(kind, id) {
                    tracing::debug!(channel = %channel_id, listener = id, "listener removed");
                }
            }
        }))
    }

    /// Clear the typing flag set by `generation` once the timeout passes.
    fn schedule_typing_expiry(&self, channel_id: &str, generation: u64) {
        let weak = Arc::downgrade(&self.shared);
        let timeout = self.shared.typing_timeout;
        let channel_id = channel_id.to_string();
        let user_id = self.user_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut state = shared.lock();
            let Some(record) = state.channels.get_mut(&channel_id) else {
                return;
            };
            if record.typing.get(&user_id) == Some(&generation) {
                record.typing.remove(&user_id);
                record.emit_typing();
                tracing::debug!(channel = %channel_id, user = %user_id, "typing expired");
            }
        });
    }
}

fn encode_cursor(offset: usize) -> String {
    format!("p{:x}", offset)
}

fn decode_cursor(cursor: &str) -> ServiceResult<usize> {
    cursor
        .strip_prefix('p')
        .and_then(|hex| usize::from_str_radix(hex, 16).ok())
        .ok_or_else(|| ServiceError::Invalid(format!("malformed page cursor {:?}", cursor)))
}

fn apply_user_data(user: &mut User, data: UserData) {
    if let Some(name) = data.name {
        user.name = Some(name);
    }
    if let Some(custom) = data.custom {
        user.custom = custom;
    }
}

#[async_trait]
impl ChatService for MemoryChat {
    fn current_user_id(&self) -> &str {
        &self.user_id
    }

    async fn get_user(&self, id: &str) -> ServiceResult<Option<User>> {
        Ok(self.shared.lock().users.get(id).cloned())
    }

    async fn create_user(&self, id: &str, data: UserData) -> ServiceResult<User> {
        if id.trim().is_empty() {
            return Err(ServiceError::Invalid("user id is required".into()));
        }
        let mut state = self.shared.lock();
        if state.users.contains_key(id) {
            return Err(ServiceError::AlreadyExists {
                kind: "user",
                id: id.to_string(),
            });
        }
        let mut user = User {
            id: id.to_string(),
            name: None,
            custom: UserCustom::default(),
        };
        apply_user_data(&mut user, data);
        state.users.insert(id.to_string(), user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: &str, data: UserData) -> ServiceResult<User> {
        let mut state = self.shared.lock();
        let user = state
            .users
            .get_mut(id)
            .ok_or_else(|| ServiceError::user_not_found(id))?;
        apply_user_data(user, data);
        Ok(user.clone())
    }

    async fn get_users(&self) -> ServiceResult<Vec<User>> {
        Ok(self.shared.lock().users.values().cloned().collect())
    }

    async fn create_channel(&self, id: &str, fields: ChannelFields) -> ServiceResult<Channel> {
        if id.trim().is_empty() {
            return Err(ServiceError::Invalid("channel id is required".into()));
        }
        let mut state = self.shared.lock();
        if state.channels.contains_key(id) {
            return Err(ServiceError::AlreadyExists {
                kind: "channel",
                id: id.to_string(),
            });
        }
        let channel = Channel {
            id: id.to_string(),
            name: fields.name,
            description: fields.description,
            status: fields.status,
            channel_type: ChannelType::Public,
        };
        let mut record = ChannelRecord::new(channel.clone());
        record.members.insert(self.user_id.clone());
        state.channels.insert(id.to_string(), record);
        tracing::debug!(channel = %id, "channel created");
        Ok(channel)
    }

    async fn get_channel(&self, id: &str) -> ServiceResult<Option<Channel>> {
        Ok(self
            .shared
            .lock()
            .channels
            .get(id)
            .map(|r| r.channel.clone()))
    }

    async fn get_channels(&self, options: ListOptions) -> ServiceResult<ChannelPage> {
        let limit = options.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if limit == 0 {
            return Err(ServiceError::Invalid("limit must be at least 1".into()));
        }
        let start = match options.page.as_ref().and_then(|p| p.next.as_deref()) {
            Some(cursor) => decode_cursor(cursor)?,
            None => 0,
        };

        let state = self.shared.lock();
        let total = state.channels.len();
        let channels: Vec<Channel> = state
            .channels
            .values()
            .skip(start)
            .take(limit)
            .map(|r| r.channel.clone())
            .collect();
        let end = (start + channels.len()).min(total);

        Ok(ChannelPage {
            channels,
            page: PageCursor {
                next: (end < total).then(|| encode_cursor(end)),
                prev: (start > 0).then(|| encode_cursor(start.saturating_sub(limit))),
            },
            total,
        })
    }

    async fn update_channel(&self, id: &str, fields: ChannelFields) -> ServiceResult<Channel> {
        let mut state = self.shared.lock();
        let record = state.channel_mut(id)?;
        let channel = &mut record.channel;
        // Absent leaves a field alone; an empty string clears it.
        let apply = |slot: &mut Option<String>, value: Option<String>| {
            if let Some(value) = value {
                *slot = (!value.is_empty()).then_some(value);
            }
        };
        apply(&mut channel.name, fields.name);
        apply(&mut channel.description, fields.description);
        apply(&mut channel.status, fields.status);
        Ok(channel.clone())
    }

    async fn delete_channel(&self, id: &str, options: DeleteOptions) -> ServiceResult<()> {
        let mut state = self.shared.lock();
        if options.soft {
            let record = state.channel_mut(id)?;
            record.channel.status = Some(SOFT_DELETED_STATUS.to_string());
        } else if state.channels.remove(id).is_none() {
            return Err(ServiceError::channel_not_found(id));
        }
        tracing::debug!(channel = %id, soft = options.soft, "channel deleted");
        Ok(())
    }

    async fn get_channel_members(&self, channel_id: &str) -> ServiceResult<Vec<User>> {
        let mut state = self.shared.lock();
        let members: Vec<String> = state.channel_mut(channel_id)?.members.iter().cloned().collect();
        Ok(members
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    async fn create_direct_conversation(
        &self,
        user: &User,
        fields: ChannelFields,
    ) -> ServiceResult<DirectConversation> {
        let mut pair = [self.user_id.as_str(), user.id.as_str()];
        pair.sort_unstable();
        let id = format!("direct.{}.{}", pair[0], pair[1]);

        let mut state = self.shared.lock();
        if !state.users.contains_key(&user.id) {
            return Err(ServiceError::user_not_found(&user.id));
        }
        let record = state.channels.entry(id.clone()).or_insert_with(|| {
            ChannelRecord::new(Channel {
                id: id.clone(),
                name: fields.name,
                description: fields.description,
                status: fields.status,
                channel_type: ChannelType::Direct,
            })
        });
        record.members.insert(self.user_id.clone());
        record.members.insert(user.id.clone());

        let membership = |user_id: &str| Membership {
            channel_id: id.clone(),
            user_id: user_id.to_string(),
            last_read_message_timetoken: record.last_read.get(user_id).copied(),
        };
        Ok(DirectConversation {
            channel: record.channel.clone(),
            host_membership: membership(&self.user_id),
            invitee_membership: membership(&user.id),
        })
    }

    async fn who_is_present(&self, channel_id: &str) -> ServiceResult<Vec<String>> {
        Ok(self
            .shared
            .lock()
            .channel_mut(channel_id)?
            .present_ids())
    }

    async fn get_typing(&self, channel_id: &str) -> ServiceResult<Subscription<Vec<String>>> {
        self.subscribe(channel_id, StreamKind::Typing, |record, id, user_id| {
            let rx = record.typing_listeners.add(id, user_id);
            let current = record.typing_ids();
            record.typing_listeners.send_to(id, &current);
            rx
        })
    }

    async fn start_typing(&self, channel_id: &str) -> ServiceResult<()> {
        let generation = {
            let mut state = self.shared.lock();
            state.typing_generation += 1;
            let generation = state.typing_generation;
            let record = state.channel_mut(channel_id)?;
            let was_typing = record
                .typing
                .insert(self.user_id.clone(), generation)
                .is_some();
            if !was_typing {
                record.emit_typing();
            }
            generation
        };
        self.schedule_typing_expiry(channel_id, generation);
        Ok(())
    }

    async fn stop_typing(&self, channel_id: &str) -> ServiceResult<()> {
        let mut state = self.shared.lock();
        let record = state.channel_mut(channel_id)?;
        if record.typing.remove(&self.user_id).is_some() {
            record.emit_typing();
        }
        Ok(())
    }

    async fn send_text(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> ServiceResult<Timetoken> {
        if message.text.trim().is_empty() {
            return Err(ServiceError::Invalid("message text is empty".into()));
        }
        let mut state = self.shared.lock();
        let timetoken = state.next_timetoken();
        let record = state.channel_mut(channel_id)?;
        let msg = ChatMessage {
            timetoken,
            channel_id: channel_id.to_string(),
            user_id: self.user_id.clone(),
            content: message.text,
            mentioned_users: message.mentioned_users,
            text_links: message.text_links,
            reactions: BTreeMap::new(),
        };
        record.messages.push(msg.clone());
        record.message_listeners.emit(&msg);
        if record.typing.remove(&self.user_id).is_some() {
            record.emit_typing();
        }
        Ok(timetoken)
    }

    async fn get_history(
        &self,
        channel_id: &str,
        options: HistoryOptions,
    ) -> ServiceResult<History> {
        let mut state = self.shared.lock();
        let record = state.channel_mut(channel_id)?;
        let skip = record.messages.len().saturating_sub(options.count);
        Ok(History {
            messages: record.messages[skip..].to_vec(),
            is_more: skip > 0,
        })
    }

    async fn connect(&self, channel_id: &str) -> ServiceResult<Subscription<ChatMessage>> {
        self.subscribe(channel_id, StreamKind::Messages, |record, id, user_id| {
            record.message_listeners.add(id, user_id)
        })
    }

    async fn stream_message_updates(
        &self,
        channel_id: &str,
    ) -> ServiceResult<Subscription<ChatMessage>> {
        self.subscribe(channel_id, StreamKind::Updates, |record, id, user_id| {
            record.update_listeners.add(id, user_id)
        })
    }

    async fn toggle_reaction(
        &self,
        channel_id: &str,
        timetoken: Timetoken,
        emoji: &str,
    ) -> ServiceResult<ChatMessage> {
        let mut state = self.shared.lock();
        let action_timetoken = state.next_timetoken();
        let record = state.channel_mut(channel_id)?;
        let msg = record
            .messages
            .iter_mut()
            .find(|m| m.timetoken == timetoken)
            .ok_or_else(|| ServiceError::NotFound {
                kind: "message",
                id: timetoken.to_string(),
            })?;

        if msg.has_user_reaction(&self.user_id, emoji) {
            if let Some(receipts) = msg.reactions.get_mut(emoji) {
                receipts.retain(|r| r.uuid != self.user_id);
                if receipts.is_empty() {
                    msg.reactions.remove(emoji);
                }
            }
        } else {
            msg.reactions
                .entry(emoji.to_string())
                .or_default()
                .push(ReactionReceipt {
                    uuid: self.user_id.clone(),
                    action_timetoken,
                });
        }

        let updated = msg.clone();
        record.update_listeners.emit(&updated);
        Ok(updated)
    }

    async fn set_last_read_message(
        &self,
        channel_id: &str,
        timetoken: Timetoken,
    ) -> ServiceResult<Membership> {
        let mut state = self.shared.lock();
        let record = state.channel_mut(channel_id)?;
        record.members.insert(self.user_id.clone());
        record.last_read.insert(self.user_id.clone(), timetoken);
        let receipts = record.read_receipts();
        record.receipt_listeners.emit(&receipts);
        Ok(Membership {
            channel_id: channel_id.to_string(),
            user_id: self.user_id.clone(),
            last_read_message_timetoken: Some(timetoken),
        })
    }

    async fn stream_read_receipts(
        &self,
        channel_id: &str,
    ) -> ServiceResult<Subscription<ReadReceiptMap>> {
        self.subscribe(channel_id, StreamKind::Receipts, |record, id, user_id| {
            let rx = record.receipt_listeners.add(id, user_id);
            let current = record.read_receipts();
            record.receipt_listeners.send_to(id, &current);
            rx
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn workspace() -> (MemoryServer, MemoryChat, MemoryChat) {
        let server = MemoryServer::new(Duration::from_secs(5));
        let alice = server.client("alice");
        let bob = server.client("bob");
        alice
            .create_user("alice", UserData { name: Some("Alice Smith".into()), custom: None })
            .await
            .unwrap();
        alice
            .create_user("bob", UserData { name: Some("Bob Jones".into()), custom: None })
            .await
            .unwrap();
        (server, alice, bob)
    }

    #[tokio::test]
    async fn test_channel_crud() {
        let (_server, alice, _bob) = workspace().await;
        let created = alice
            .create_channel("ops", ChannelFields { name: Some("Ops".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(created.name.as_deref(), Some("Ops"));

        let dup = alice.create_channel("ops", ChannelFields::default()).await;
        assert!(matches!(dup, Err(ServiceError::AlreadyExists { .. })));

        let updated = alice
            .update_channel(
                "ops",
                ChannelFields { description: Some("on-call".into()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Ops"));
        assert_eq!(updated.description.as_deref(), Some("on-call"));

        alice.delete_channel("ops", DeleteOptions { soft: true }).await.unwrap();
        let soft = alice.get_channel("ops").await.unwrap().unwrap();
        assert_eq!(soft.status.as_deref(), Some("deleted"));

        alice.delete_channel("ops", DeleteOptions { soft: false }).await.unwrap();
        assert!(alice.get_channel("ops").await.unwrap().is_none());
        let again = alice.delete_channel("ops", DeleteOptions::default()).await;
        assert!(matches!(again, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_get_channels_pages() {
        let (_server, alice, _bob) = workspace().await;
        for id in ["a", "b", "c", "d", "e"] {
            alice.create_channel(id, ChannelFields::default()).await.unwrap();
        }

        let first = alice
            .get_channels(ListOptions { limit: Some(2), page: None })
            .await
            .unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.channels.len(), 2);
        assert!(first.page.prev.is_none());

        let second = alice
            .get_channels(ListOptions { limit: Some(2), page: Some(first.page.clone()) })
            .await
            .unwrap();
        let ids: Vec<&str> = second.channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
        assert!(second.page.prev.is_some());

        let third = alice
            .get_channels(ListOptions { limit: Some(2), page: Some(second.page) })
            .await
            .unwrap();
        assert_eq!(third.channels.len(), 1);
        assert!(third.page.next.is_none());
    }

    #[tokio::test]
    async fn test_malformed_cursor_is_invalid() {
        let (_server, alice, _bob) = workspace().await;
        let result = alice
            .get_channels(ListOptions {
                limit: Some(2),
                page: Some(PageCursor { next: Some("zzz".into()), prev: None }),
            })
            .await;
        assert!(matches!(result, Err(ServiceError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_presence_follows_connect_subscription() {
        let (server, alice, bob) = workspace().await;
        alice.create_channel("room", ChannelFields::default()).await.unwrap();

        let sub = bob.connect("room").await.unwrap();
        assert_eq!(alice.who_is_present("room").await.unwrap(), vec!["bob".to_string()]);
        assert_eq!(server.listener_count("room"), 1);

        drop(sub);
        assert!(alice.who_is_present("room").await.unwrap().is_empty());
        assert_eq!(server.listener_count("room"), 0);
    }

    #[tokio::test]
    async fn test_typing_subscription_counts_as_presence() {
        let (_server, alice, bob) = workspace().await;
        alice.create_channel("room", ChannelFields::default()).await.unwrap();

        let typing = alice.get_typing("room").await.unwrap();
        let messages = bob.connect("room").await.unwrap();
        let _also_typing = bob.get_typing("room").await.unwrap();
        assert_eq!(
            bob.who_is_present("room").await.unwrap(),
            vec!["alice".to_string(), "bob".to_string()]
        );

        drop(typing);
        drop(messages);
        assert_eq!(alice.who_is_present("room").await.unwrap(), vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn test_messages_stream_and_history() {
        let (_server, alice, bob) = workspace().await;
        alice.create_channel("room", ChannelFields::default()).await.unwrap();
        let mut stream = bob.connect("room").await.unwrap();

        let t1 = alice.send_text("room", OutgoingMessage::plain("one")).await.unwrap();
        let t2 = alice.send_text("room", OutgoingMessage::plain("two")).await.unwrap();
        assert!(t2 > t1);

        assert_eq!(stream.recv().await.unwrap().content, "one");
        assert_eq!(stream.recv().await.unwrap().content, "two");

        let history = bob.get_history("room", HistoryOptions { count: 1 }).await.unwrap();
        assert_eq!(history.messages.len(), 1);
        assert_eq!(history.messages[0].content, "two");
        assert!(history.is_more);

        let empty = alice.send_text("room", OutgoingMessage::plain("   ")).await;
        assert!(matches!(empty, Err(ServiceError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_toggle_reaction_adds_then_removes() {
        let (_server, alice, bob) = workspace().await;
        alice.create_channel("room", ChannelFields::default()).await.unwrap();
        let tt = alice.send_text("room", OutgoingMessage::plain("hi")).await.unwrap();
        let mut updates = alice.stream_message_updates("room").await.unwrap();

        let reacted = bob.toggle_reaction("room", tt, "+1").await.unwrap();
        assert!(reacted.has_user_reaction("bob", "+1"));
        assert_eq!(updates.recv().await.unwrap(), reacted);

        let cleared = bob.toggle_reaction("room", tt, "+1").await.unwrap();
        assert!(!cleared.has_user_reaction("bob", "+1"));
        assert!(cleared.reactions.get("+1").is_none());

        let missing = bob.toggle_reaction("room", Timetoken(1), "+1").await;
        assert!(matches!(missing, Err(ServiceError::NotFound { kind: "message", .. })));
    }

    #[tokio::test]
    async fn test_read_receipts_replace_whole_map() {
        let (_server, alice, bob) = workspace().await;
        alice.create_channel("room", ChannelFields::default()).await.unwrap();
        let t1 = alice.send_text("room", OutgoingMessage::plain("one")).await.unwrap();
        let t2 = alice.send_text("room", OutgoingMessage::plain("two")).await.unwrap();

        let mut receipts = alice.stream_read_receipts("room").await.unwrap();
        assert!(receipts.recv().await.unwrap().is_empty());

        bob.set_last_read_message("room", t1).await.unwrap();
        let map = receipts.recv().await.unwrap();
        assert_eq!(map.get(&t1), Some(&vec!["bob".to_string()]));

        bob.set_last_read_message("room", t2).await.unwrap();
        let map = receipts.recv().await.unwrap();
        assert!(map.get(&t1).is_none());
        assert_eq!(map.get(&t2), Some(&vec!["bob".to_string()]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_expires_after_timeout() {
        let (_server, alice, bob) = workspace().await;
        alice.create_channel("room", ChannelFields::default()).await.unwrap();
        let mut typing = alice.get_typing("room").await.unwrap();
        assert!(typing.recv().await.unwrap().is_empty());

        bob.start_typing("room").await.unwrap();
        assert_eq!(typing.recv().await.unwrap(), vec!["bob".to_string()]);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(typing.recv().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_refresh_extends_deadline() {
        let (_server, alice, bob) = workspace().await;
        alice.create_channel("room", ChannelFields::default()).await.unwrap();
        let mut typing = alice.get_typing("room").await.unwrap();
        let _ = typing.recv().await;

        bob.start_typing("room").await.unwrap();
        let _ = typing.recv().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        bob.start_typing("room").await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(typing.try_recv().is_none());

        bob.stop_typing("room").await.unwrap();
        assert!(typing.recv().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_direct_conversation_is_reused() {
        let (_server, alice, bob) = workspace().await;
        let bob_user = alice.get_user("bob").await.unwrap().unwrap();
        let first = alice
            .create_direct_conversation(&bob_user, ChannelFields { name: Some("Support".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(first.channel.channel_type, ChannelType::Direct);
        assert_eq!(first.host_membership.user_id, "alice");
        assert_eq!(first.invitee_membership.user_id, "bob");

        let alice_user = bob.get_user("alice").await.unwrap().unwrap();
        let second = bob
            .create_direct_conversation(&alice_user, ChannelFields::default())
            .await
            .unwrap();
        assert_eq!(first.channel.id, second.channel.id);

        let members = alice.get_channel_members(&first.channel.id).await.unwrap();
        assert_eq!(members.len(), 2);
    }

    #[tokio::test]
    async fn test_hard_delete_closes_streams() {
        let (_server, alice, _bob) = workspace().await;
        alice.create_channel("room", ChannelFields::default()).await.unwrap();
        let mut stream = alice.connect("room").await.unwrap();
        alice.delete_channel("room", DeleteOptions::default()).await.unwrap();
        assert!(stream.recv().await.is_none());
    }
}
