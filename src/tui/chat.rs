//! Two-party chat screen: history, live messages, reactions, read receipts,
//! typing and mention autocomplete.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use futures::future::{BoxFuture, FutureExt};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::app::{self, Screen, Status};
use super::backend::{Backend, Forward};
use super::field::{self, TextField, FIELD_HEIGHT};
use super::help::{Category, Shortcut};
use super::log_capture::LogBuffer;
use super::messages::{self, CardContext, MessageList};
use crate::config::Config;
use crate::demo::{Roles, SUPPORT_CHANNEL_NAME};
use crate::draft::{MessageDraft, SuggestionSource};
use crate::models::{
    Channel, ChannelFields, ChatMessage, HistoryOptions, Membership, OutgoingMessage,
    ReadReceiptMap, Timetoken, User,
};
use crate::reactions::THUMBS_UP;
use crate::sdk::{ChatService, ServiceError, ServiceResult, Subscription};
use crate::session::Session;

const SHORTCUTS: Category = Category {
    title: "CHAT",
    shortcuts: &[
        Shortcut {
            key: "Enter",
            desc: "Send message",
        },
        Shortcut {
            key: "Up/Down",
            desc: "Select message",
        },
        Shortcut {
            key: "End",
            desc: "Jump to newest",
        },
        Shortcut {
            key: "r",
            desc: "Toggle thumbs up",
        },
        Shortcut {
            key: "m",
            desc: "Mark as last read",
        },
        Shortcut {
            key: "@name",
            desc: "Mention (first match is inserted)",
        },
        Shortcut {
            key: "[label](url)",
            desc: "Enter turns it into a link",
        },
    ],
};

// ---------------------------------------------------------------------------
// Backend commands
// ---------------------------------------------------------------------------

pub enum Command {
    Open {
        roles: Roles,
        history_count: usize,
        source: SuggestionSource,
    },
    Send {
        channel_id: String,
        message: OutgoingMessage,
    },
    React {
        channel_id: String,
        timetoken: Timetoken,
    },
    MarkRead {
        channel_id: String,
        timetoken: Timetoken,
    },
    Typing {
        channel_id: String,
    },
}

/// Everything the screen needs once the conversation is open.
pub struct Conversation {
    me: User,
    channel: Channel,
    users: BTreeMap<String, User>,
    history: Vec<ChatMessage>,
    draft: MessageDraft,
    messages: Subscription<ChatMessage>,
    updates: Subscription<ChatMessage>,
    receipts: Subscription<ReadReceiptMap>,
    typing: Subscription<Vec<String>>,
}

pub enum Response {
    Opened(ServiceResult<Box<Conversation>>),
    Sent(ServiceResult<Timetoken>),
    Reacted(ServiceResult<ChatMessage>),
    MarkedRead(ServiceResult<Membership>),
    TypingSignal(ServiceResult<()>),
    Message(ChatMessage),
    Updated(ChatMessage),
    Receipts(ReadReceiptMap),
    Typing(Vec<String>),
}

fn execute(service: Arc<dyn ChatService>, cmd: Command) -> BoxFuture<'static, Response> {
    async move {
        let service = service.as_ref();
        match cmd {
            Command::Open {
                roles,
                history_count,
                source,
            } => Response::Opened(
                open(service, roles, history_count, source)
                    .await
                    .map(Box::new),
            ),
            Command::Send {
                channel_id,
                message,
            } => Response::Sent(service.send_text(&channel_id, message).await),
            Command::React {
                channel_id,
                timetoken,
            } => Response::Reacted(
                service
                    .toggle_reaction(&channel_id, timetoken, THUMBS_UP)
                    .await,
            ),
            Command::MarkRead {
                channel_id,
                timetoken,
            } => Response::MarkedRead(
                service
                    .set_last_read_message(&channel_id, timetoken)
                    .await,
            ),
            Command::Typing { channel_id } => {
                Response::TypingSignal(service.start_typing(&channel_id).await)
            }
        }
    }
    .boxed()
}

/// Set up both users, the direct conversation and its streams.
async fn open(
    service: &dyn ChatService,
    roles: Roles,
    history_count: usize,
    source: SuggestionSource,
) -> ServiceResult<Conversation> {
    let me = match service.update_user(roles.me.id, roles.me.data()).await {
        Err(ServiceError::NotFound { .. }) => {
            service.create_user(roles.me.id, roles.me.data()).await?
        }
        other => other?,
    };
    let peer = match service.get_user(roles.peer.id).await? {
        Some(user) => user,
        None => service.create_user(roles.peer.id, roles.peer.data()).await?,
    };

    let dm = service
        .create_direct_conversation(
            &peer,
            ChannelFields {
                name: Some(SUPPORT_CHANNEL_NAME.to_string()),
                ..ChannelFields::default()
            },
        )
        .await?;
    tracing::debug!(
        channel = %dm.channel.id,
        my_last_read = ?dm.host_membership.last_read_message_timetoken,
        peer_last_read = ?dm.invitee_membership.last_read_message_timetoken,
        "direct conversation ready"
    );
    let channel = dm.channel;

    // Streams open before history so nothing sent meanwhile is missed.
    let typing = service.get_typing(&channel.id).await?;
    let messages = service.connect(&channel.id).await?;
    let updates = service.stream_message_updates(&channel.id).await?;
    let history = service
        .get_history(
            &channel.id,
            HistoryOptions {
                count: history_count,
            },
        )
        .await?;

    let mut users = BTreeMap::new();
    users.insert(me.id.clone(), me.clone());
    users.insert(peer.id.clone(), peer);
    for msg in &history.messages {
        if users.contains_key(&msg.user_id) {
            continue;
        }
        if let Some(user) = service.get_user(&msg.user_id).await? {
            users.insert(user.id.clone(), user);
        }
    }

    let receipts = service.stream_read_receipts(&channel.id).await?;
    let draft = MessageDraft::create(service, &channel.id, source).await?;

    tracing::info!(
        channel = %channel.id,
        history = history.messages.len(),
        more = history.is_more,
        "conversation opened"
    );
    Ok(Conversation {
        me,
        channel,
        users,
        history: history.messages,
        draft,
        messages,
        updates,
        receipts,
        typing,
    })
}

// ---------------------------------------------------------------------------
// Screen state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Messages,
    Input,
}

pub struct ChatScreen {
    roles: Roles,
    history_count: usize,
    source: SuggestionSource,
    focus: Focus,
    me: Option<User>,
    channel: Option<Channel>,
    users: BTreeMap<String, User>,
    list: MessageList,
    receipts: ReadReceiptMap,
    /// User ids currently typing, as last reported.
    typing: Vec<String>,
    input: TextField,
    draft: Option<MessageDraft>,
    feeds: Vec<Forward>,
}

impl ChatScreen {
    pub fn new(roles: Roles, config: &Config) -> Self {
        Self {
            roles,
            history_count: config.history_count,
            source: config.suggestion_source,
            focus: Focus::Input,
            me: None,
            channel: None,
            users: BTreeMap::new(),
            list: MessageList::default(),
            receipts: ReadReceiptMap::new(),
            typing: Vec::new(),
            input: TextField::default(),
            draft: None,
            feeds: Vec::new(),
        }
    }

    fn channel_id(&self) -> Option<String> {
        self.channel.as_ref().map(|c| c.id.clone())
    }

    fn my_id(&self) -> &str {
        self.me.as_ref().map_or(self.roles.me.id, |u| u.id.as_str())
    }

    /// "Typing: ..." naming everyone but the current user.
    fn typing_line(&self) -> Option<String> {
        let names: Vec<&str> = self
            .typing
            .iter()
            .filter(|id| id.as_str() != self.my_id())
            .map(|id| self.users.get(id).map_or(id.as_str(), |u| u.display_name()))
            .collect();
        (!names.is_empty()).then(|| format!("Typing: {}", names.join(", ")))
    }

    fn apply_conversation(
        &mut self,
        conversation: Conversation,
        backend: &Backend<Command, Response>,
    ) {
        let Conversation {
            me,
            channel,
            users,
            history,
            draft,
            messages,
            updates,
            receipts,
            typing,
        } = conversation;

        for msg in history {
            self.list.push(msg);
        }
        let previous = std::mem::replace(
            &mut self.feeds,
            vec![
                backend.forward(messages, Response::Message),
                backend.forward(updates, Response::Updated),
                backend.forward(receipts, Response::Receipts),
                backend.forward(typing, Response::Typing),
            ],
        );
        if !previous.is_empty() {
            tracing::debug!(count = previous.len(), "previous conversation streams released");
        }
        self.me = Some(me);
        self.channel = Some(channel);
        self.users = users;
        self.draft = Some(draft);
    }

    /// Feed an edited input to the draft, inserting the first suggested mention.
    fn input_changed(&mut self, backend: &Backend<Command, Response>) {
        let Some(channel_id) = self.channel_id() else {
            return;
        };
        backend.send(Command::Typing { channel_id });

        let Some(draft) = self.draft.as_mut() else {
            return;
        };
        if let Some(suggestion) = draft.on_change(self.input.value()) {
            if let Some(user) = suggestion.users.first() {
                if draft.add_mentioned_user(user, &suggestion) {
                    self.input.set(draft.value());
                }
            }
        }
    }

    /// Send the draft, or turn a trailing `[label](url)` into a labelled link.
    fn submit(&mut self, backend: &Backend<Command, Response>, status: &mut Status) {
        let Some(draft) = self.draft.as_mut() else {
            status.info("Still connecting");
            return;
        };
        if self.input.value().trim().is_empty() {
            return;
        }
        if let Some((prefix, label, link)) = trailing_link(self.input.value()) {
            draft.on_change(prefix);
            draft.add_linked_text(label, link);
            self.input.set(draft.value());
            return;
        }

        draft.on_change(self.input.value());
        let message = draft.outgoing();
        let channel_id = draft.channel_id().to_string();
        draft.reset();
        self.input.clear();
        backend.send(Command::Send {
            channel_id,
            message,
        });
    }

    fn selected_action(&self) -> Option<(String, Timetoken)> {
        let channel_id = self.channel_id()?;
        let msg = self.list.selected()?;
        Some((channel_id, msg.timetoken))
    }
}

/// Split `text` ending in `[label](url)` into the text before it, the label and the url.
fn trailing_link(text: &str) -> Option<(&str, &str, &str)> {
    let rest = text.trim_end().strip_suffix(')')?;
    let split = rest.rfind("](")?;
    let link = &rest[split + 2..];
    let head = &rest[..split];
    let open = head.rfind('[')?;
    let label = &head[open + 1..];
    if label.trim().is_empty() || link.trim().is_empty() || link.contains(char::is_whitespace) {
        return None;
    }
    Some((&head[..open], label, link))
}

impl Screen for ChatScreen {
    type Command = Command;
    type Response = Response;

    fn title(&self) -> String {
        match &self.channel {
            Some(channel) => channel.display_name().to_string(),
            None => "Connecting...".to_string(),
        }
    }

    fn user_label(&self) -> String {
        match &self.me {
            Some(me) => me.display_name().to_string(),
            None => self.roles.me.name.to_string(),
        }
    }

    fn focus_label(&self) -> &'static str {
        match self.focus {
            Focus::Messages => "messages",
            Focus::Input => "message box",
        }
    }

    fn shortcuts(&self) -> &'static [&'static Category] {
        &[&SHORTCUTS]
    }

    fn start(&mut self, backend: &Backend<Command, Response>) {
        backend.send(Command::Open {
            roles: self.roles,
            history_count: self.history_count,
            source: self.source,
        });
    }

    fn handle_key(
        &mut self,
        key: KeyEvent,
        backend: &Backend<Command, Response>,
        status: &mut Status,
    ) {
        if key.code == KeyCode::Tab || key.code == KeyCode::BackTab {
            self.focus = match self.focus {
                Focus::Messages => Focus::Input,
                Focus::Input => Focus::Messages,
            };
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return;
        }

        match self.focus {
            Focus::Input => match key.code {
                KeyCode::Enter => self.submit(backend, status),
                KeyCode::Up => {
                    self.focus = Focus::Messages;
                    self.list.select_previous();
                }
                code => {
                    if self.input.handle_key(code) {
                        self.input_changed(backend);
                    }
                }
            },
            Focus::Messages => match key.code {
                KeyCode::Up | KeyCode::Char('k') => self.list.select_previous(),
                KeyCode::Down | KeyCode::Char('j') => self.list.select_next(),
                KeyCode::End | KeyCode::Char('G') => self.list.select_last(),
                KeyCode::Char('r') => {
                    if let Some((channel_id, timetoken)) = self.selected_action() {
                        backend.send(Command::React {
                            channel_id,
                            timetoken,
                        });
                    }
                }
                KeyCode::Char('m') => {
                    if let Some((channel_id, timetoken)) = self.selected_action() {
                        backend.send(Command::MarkRead {
                            channel_id,
                            timetoken,
                        });
                    }
                }
                KeyCode::Enter | KeyCode::Char('i') => self.focus = Focus::Input,
                _ => {}
            },
        }
    }

    fn handle_response(
        &mut self,
        response: Response,
        backend: &Backend<Command, Response>,
        status: &mut Status,
    ) {
        match response {
            Response::Opened(Ok(conversation)) => self.apply_conversation(*conversation, backend),
            Response::Opened(Err(e)) => status.error("Open conversation", &e),
            Response::Sent(Ok(timetoken)) => tracing::debug!(%timetoken, "message sent"),
            Response::Sent(Err(e)) => status.error("Send message", &e),
            Response::Reacted(Ok(msg)) => {
                self.list.replace(msg);
            }
            Response::Reacted(Err(e)) => status.error("Toggle reaction", &e),
            Response::MarkedRead(Ok(_)) => {}
            Response::MarkedRead(Err(e)) => status.error("Mark as read", &e),
            Response::TypingSignal(Ok(())) => {}
            Response::TypingSignal(Err(e)) => status.error("Typing", &e),
            Response::Message(msg) => self.list.push(msg),
            Response::Updated(msg) => {
                self.list.replace(msg);
            }
            Response::Receipts(receipts) => self.receipts = receipts,
            Response::Typing(user_ids) => self.typing = user_ids,
        }
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let [list_area, typing_area, input_area] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(FIELD_HEIGHT),
        ])
        .areas(area);

        let ctx = CardContext {
            users: &self.users,
            receipts: &self.receipts,
            current_user_id: self.my_id(),
        };
        let title = self.title();
        messages::render(
            list_area,
            frame.buffer_mut(),
            &self.list,
            &ctx,
            &title,
            self.focus == Focus::Messages,
        );

        if let Some(line) = self.typing_line() {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    format!(" {}", line),
                    Style::default().fg(Color::DarkGray),
                ))),
                typing_area,
            );
        }

        let mentioned: Vec<String> = self
            .draft
            .iter()
            .flat_map(|d| d.mentions())
            .map(|m| format!("@{}", m.name))
            .collect();
        let input_title = if mentioned.is_empty() {
            "Message".to_string()
        } else {
            format!("Message (mentions {})", mentioned.join(", "))
        };
        field::render(
            frame,
            input_area,
            &self.input,
            &input_title,
            "Type a message, @name to mention",
            self.focus == Focus::Input,
        );
    }
}

/// Run the chat screen until the user quits.
pub async fn run(
    session: &Session,
    roles: Roles,
    config: &Config,
    logs: Option<LogBuffer>,
) -> Result<()> {
    let screen = ChatScreen::new(roles, config);
    let backend = Backend::start(session.service(), execute);
    app::run(screen, backend, logs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{self, SUPPORTED_USER, SUPPORT_AGENT};
    use crate::models::{ChannelPage, DeleteOptions, History, ListOptions, UserData};
    use crate::sdk::memory::{MemoryChat, MemoryServer};
    use crate::sdk::DirectConversation;
    use std::time::Duration;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    struct Harness {
        server: MemoryServer,
        screen: ChatScreen,
        backend: Backend<Command, Response>,
        status: Status,
    }

    impl Harness {
        async fn open(as_agent: bool) -> Self {
            let server = demo::workspace(Duration::from_secs(5)).await.unwrap();
            let roles = Roles::new(as_agent);
            let client = server.client(roles.me.id);
            let mut h = Self {
                screen: ChatScreen::new(roles, &Config::default()),
                backend: Backend::start(Arc::new(client), execute),
                status: Status::default(),
                server,
            };
            h.screen.start(&h.backend);
            h.until(|r| matches!(r, Response::Opened(_))).await;
            h
        }

        fn client(&self, persona: &str) -> MemoryChat {
            self.server.client(persona)
        }

        fn press(&mut self, code: KeyCode) {
            self.screen.handle_key(key(code), &self.backend, &mut self.status);
        }

        fn type_text(&mut self, text: &str) {
            for c in text.chars() {
                self.press(KeyCode::Char(c));
            }
        }

        async fn until(&mut self, done: impl Fn(&Response) -> bool) {
            loop {
                let response = self.backend.recv().await.expect("backend closed");
                let finished = done(&response);
                self.screen
                    .handle_response(response, &self.backend, &mut self.status);
                if finished {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_open_loads_history_and_users() {
        let h = Harness::open(true).await;
        assert!(!h.status.is_error);
        assert_eq!(h.screen.title(), SUPPORT_CHANNEL_NAME);
        assert_eq!(h.screen.user_label(), SUPPORT_AGENT.name);
        assert_eq!(h.screen.list.messages().len(), 2);
        assert!(h.screen.users.contains_key(SUPPORTED_USER.id));
        // The newest history entry is selected.
        assert_eq!(
            h.screen.list.selected().map(|m| m.user_id.as_str()),
            Some(SUPPORTED_USER.id)
        );
    }

    #[tokio::test]
    async fn test_send_clears_input_and_follows_newest() {
        let mut h = Harness::open(false).await;
        h.type_text("hello there");
        h.press(KeyCode::Enter);
        assert!(h.screen.input.is_empty());
        h.until(|r| matches!(r, Response::Message(_))).await;

        let newest = h.screen.list.selected().unwrap();
        assert_eq!(newest.content, "hello there");
        assert_eq!(newest.user_id, SUPPORTED_USER.id);
        assert_eq!(h.screen.list.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_mention_is_auto_inserted_and_sent() {
        let mut h = Harness::open(true).await;
        h.type_text("hi @Mar");
        assert_eq!(h.screen.input.value(), "hi @Mary Watson ");
        h.type_text("where is it?");
        h.press(KeyCode::Enter);
        h.until(|r| matches!(r, Response::Message(_))).await;

        let sent = h.screen.list.selected().unwrap();
        assert_eq!(sent.content, "hi @Mary Watson where is it?");
        assert_eq!(sent.mentioned_users[&0].id, SUPPORTED_USER.id);
    }

    #[test]
    fn test_trailing_link() {
        assert_eq!(
            trailing_link("see [the docs](https://example.com) "),
            Some(("see ", "the docs", "https://example.com"))
        );
        assert_eq!(trailing_link("no link here"), None);
        assert_eq!(trailing_link("[](https://example.com)"), None);
        assert_eq!(trailing_link("[docs](not a url)"), None);
    }

    #[tokio::test]
    async fn test_link_is_staged_then_sent() {
        let mut h = Harness::open(true).await;
        h.type_text("read [the docs](https://example.com)");
        h.press(KeyCode::Enter);
        assert_eq!(h.screen.input.value(), "read the docs");
        h.type_text(" first");
        h.press(KeyCode::Enter);
        h.until(|r| matches!(r, Response::Message(_))).await;

        let sent = h.screen.list.selected().unwrap();
        assert_eq!(sent.content, "read the docs first");
        assert_eq!(sent.text_links.len(), 1);
        assert_eq!(sent.text_links[0].start_index, 5);
        assert_eq!(sent.text_links[0].link, "https://example.com");
    }

    #[tokio::test]
    async fn test_reaction_toggles_on_selected_message() {
        let mut h = Harness::open(true).await;
        h.press(KeyCode::Tab);
        h.press(KeyCode::Char('r'));
        h.until(|r| matches!(r, Response::Reacted(_))).await;

        let selected = h.screen.list.selected().unwrap();
        assert!(selected.has_user_reaction(SUPPORT_AGENT.id, THUMBS_UP));

        h.press(KeyCode::Char('r'));
        h.until(|r| matches!(r, Response::Reacted(_))).await;
        let selected = h.screen.list.selected().unwrap();
        assert!(!selected.has_user_reaction(SUPPORT_AGENT.id, THUMBS_UP));
    }

    #[tokio::test]
    async fn test_mark_read_updates_receipts() {
        let mut h = Harness::open(false).await;
        h.press(KeyCode::Tab);
        h.press(KeyCode::Up);
        let first = h.screen.list.selected().unwrap().timetoken;
        h.press(KeyCode::Char('m'));
        h.until(|r| match r {
            Response::Receipts(map) => map
                .get(&first)
                .is_some_and(|ids| ids.iter().any(|id| id == SUPPORTED_USER.id)),
            _ => false,
        })
        .await;
        assert!(h.screen.receipts[&first].contains(&SUPPORTED_USER.id.to_string()));
    }

    #[tokio::test]
    async fn test_peer_typing_is_named_and_self_is_hidden() {
        let mut h = Harness::open(true).await;
        h.client(SUPPORTED_USER.id)
            .start_typing(&h.screen.channel_id().unwrap())
            .await
            .unwrap();
        h.until(|r| matches!(r, Response::Typing(ids) if !ids.is_empty()))
            .await;
        assert_eq!(h.screen.typing_line().as_deref(), Some("Typing: Mary Watson"));

        h.screen.typing = vec![SUPPORT_AGENT.id.to_string()];
        assert!(h.screen.typing_line().is_none());
    }

    /// Delegates to a memory client; the peer posts right after history is read.
    struct PostsAfterHistory {
        inner: MemoryChat,
        peer: MemoryChat,
    }

    #[async_trait::async_trait]
    impl ChatService for PostsAfterHistory {
        fn current_user_id(&self) -> &str {
            self.inner.current_user_id()
        }
        async fn get_user(&self, id: &str) -> ServiceResult<Option<User>> {
            self.inner.get_user(id).await
        }
        async fn create_user(&self, id: &str, data: UserData) -> ServiceResult<User> {
            self.inner.create_user(id, data).await
        }
        async fn update_user(&self, id: &str, data: UserData) -> ServiceResult<User> {
            self.inner.update_user(id, data).await
        }
        async fn get_users(&self) -> ServiceResult<Vec<User>> {
            self.inner.get_users().await
        }
        async fn create_channel(&self, id: &str, fields: ChannelFields) -> ServiceResult<Channel> {
            self.inner.create_channel(id, fields).await
        }
        async fn get_channel(&self, id: &str) -> ServiceResult<Option<Channel>> {
            self.inner.get_channel(id).await
        }
        async fn get_channels(&self, options: ListOptions) -> ServiceResult<ChannelPage> {
            self.inner.get_channels(options).await
        }
        async fn update_channel(&self, id: &str, fields: ChannelFields) -> ServiceResult<Channel> {
            self.inner.update_channel(id, fields).await
        }
        async fn delete_channel(&self, id: &str, options: DeleteOptions) -> ServiceResult<()> {
            self.inner.delete_channel(id, options).await
        }
        async fn get_channel_members(&self, channel_id: &str) -> ServiceResult<Vec<User>> {
            self.inner.get_channel_members(channel_id).await
        }
        async fn create_direct_conversation(
            &self,
            user: &User,
            fields: ChannelFields,
        ) -> ServiceResult<DirectConversation> {
            self.inner.create_direct_conversation(user, fields).await
        }
        async fn who_is_present(&self, channel_id: &str) -> ServiceResult<Vec<String>> {
            self.inner.who_is_present(channel_id).await
        }
        async fn get_typing(&self, channel_id: &str) -> ServiceResult<Subscription<Vec<String>>> {
            self.inner.get_typing(channel_id).await
        }
        async fn start_typing(&self, channel_id: &str) -> ServiceResult<()> {
            self.inner.start_typing(channel_id).await
        }
        async fn stop_typing(&self, channel_id: &str) -> ServiceResult<()> {
            self.inner.stop_typing(channel_id).await
        }
        async fn send_text(
            &self,
            channel_id: &str,
            message: OutgoingMessage,
        ) -> ServiceResult<Timetoken> {
            self.inner.send_text(channel_id, message).await
        }
        async fn get_history(
            &self,
            channel_id: &str,
            options: HistoryOptions,
        ) -> ServiceResult<History> {
            let history = self.inner.get_history(channel_id, options).await?;
            self.peer
                .send_text(channel_id, OutgoingMessage::plain("just in time"))
                .await?;
            Ok(history)
        }
        async fn connect(&self, channel_id: &str) -> ServiceResult<Subscription<ChatMessage>> {
            self.inner.connect(channel_id).await
        }
        async fn stream_message_updates(
            &self,
            channel_id: &str,
        ) -> ServiceResult<Subscription<ChatMessage>> {
            self.inner.stream_message_updates(channel_id).await
        }
        async fn toggle_reaction(
            &self,
            channel_id: &str,
            timetoken: Timetoken,
            emoji: &str,
        ) -> ServiceResult<ChatMessage> {
            self.inner.toggle_reaction(channel_id, timetoken, emoji).await
        }
        async fn set_last_read_message(
            &self,
            channel_id: &str,
            timetoken: Timetoken,
        ) -> ServiceResult<Membership> {
            self.inner.set_last_read_message(channel_id, timetoken).await
        }
        async fn stream_read_receipts(
            &self,
            channel_id: &str,
        ) -> ServiceResult<Subscription<ReadReceiptMap>> {
            self.inner.stream_read_receipts(channel_id).await
        }
    }

    #[tokio::test]
    async fn test_message_posted_while_opening_is_streamed() {
        let server = demo::workspace(Duration::from_secs(5)).await.unwrap();
        let roles = Roles::new(false);
        let service = PostsAfterHistory {
            inner: server.client(roles.me.id),
            peer: server.client(roles.peer.id),
        };

        let mut conversation = open(&service, roles, 10, SuggestionSource::Channel)
            .await
            .unwrap();
        assert!(conversation.history.iter().all(|m| m.content != "just in time"));
        let late = conversation.messages.try_recv().unwrap();
        assert_eq!(late.content, "just in time");
        assert_eq!(late.user_id, SUPPORT_AGENT.id);
    }

    #[tokio::test]
    async fn test_open_creates_missing_personas() {
        let server = MemoryServer::new(Duration::from_secs(5));
        let roles = Roles::new(true);
        let client = server.client(roles.me.id);
        let mut screen = ChatScreen::new(roles, &Config::default());
        let mut backend = Backend::start(Arc::new(client), execute);
        let mut status = Status::default();

        screen.start(&backend);
        let response = backend.recv().await.unwrap();
        screen.handle_response(response, &backend, &mut status);

        assert!(!status.is_error);
        assert_eq!(screen.title(), SUPPORT_CHANNEL_NAME);
        assert!(screen.list.is_empty());
    }
}
