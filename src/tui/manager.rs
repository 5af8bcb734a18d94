//! Channel manager screen: channel CRUD, presence and typing indicators.

use std::sync::Arc;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use futures::future::{BoxFuture, FutureExt};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::app::{self, Screen, Status};
use super::backend::{Backend, Forward};
use super::field::{self, TextField, FIELD_HEIGHT};
use super::help::{Category, Shortcut};
use super::log_capture::LogBuffer;
use crate::config::Config;
use crate::models::{Channel, ChannelFields, DeleteOptions};
use crate::pagination::{all_channels, Listing};
use crate::sdk::{ChatService, ServiceError, ServiceResult, Subscription};
use crate::session::Session;

const SHORTCUTS: Category = Category {
    title: "CHANNEL MANAGER",
    shortcuts: &[
        Shortcut {
            key: "Enter",
            desc: "Run the focused form",
        },
        Shortcut {
            key: "Up/Down",
            desc: "Move in the channel list",
        },
        Shortcut {
            key: "Space",
            desc: "Get the highlighted channel",
        },
        Shortcut {
            key: "Ctrl+P",
            desc: "Get channel presence",
        },
        Shortcut {
            key: "Ctrl+D",
            desc: "Soft delete channel",
        },
        Shortcut {
            key: "Ctrl+X",
            desc: "Hard delete channel",
        },
        Shortcut {
            key: "Ctrl+U",
            desc: "Clear the focused field",
        },
    ],
};

// ---------------------------------------------------------------------------
// Backend commands
// ---------------------------------------------------------------------------

pub enum Command {
    GetAll { limit: usize, max_pages: usize },
    Create { id: String, fields: ChannelFields },
    Get { id: String },
    Update { id: String, fields: ChannelFields },
    Delete { id: String, soft: bool },
    Presence { id: String },
    Typing { id: String, active: bool },
}

/// A channel together with its typing stream.
pub struct Selected {
    channel: Channel,
    typing: Subscription<Vec<String>>,
}

pub enum Response {
    Listing(Listing<Channel>),
    Created(ServiceResult<Selected>),
    Fetched(ServiceResult<Selected>),
    Updated(ServiceResult<Channel>),
    Deleted {
        id: String,
        soft: bool,
        result: ServiceResult<()>,
    },
    Presence {
        id: String,
        result: ServiceResult<Vec<String>>,
    },
    TypingSignal(ServiceResult<()>),
    Typing {
        channel_id: String,
        user_ids: Vec<String>,
    },
}

fn execute(service: Arc<dyn ChatService>, cmd: Command) -> BoxFuture<'static, Response> {
    async move {
        let service = service.as_ref();
        match cmd {
            Command::GetAll { limit, max_pages } => {
                Response::Listing(all_channels(service, limit, max_pages).await)
            }
            Command::Create { id, fields } => Response::Created(create(service, &id, fields).await),
            Command::Get { id } => Response::Fetched(fetch(service, &id).await),
            Command::Update { id, fields } => {
                Response::Updated(service.update_channel(&id, fields).await)
            }
            Command::Delete { id, soft } => {
                let result = service.delete_channel(&id, DeleteOptions { soft }).await;
                Response::Deleted { id, soft, result }
            }
            Command::Presence { id } => {
                let result = service.who_is_present(&id).await;
                Response::Presence { id, result }
            }
            Command::Typing { id, active } => {
                let result = if active {
                    service.start_typing(&id).await
                } else {
                    service.stop_typing(&id).await
                };
                Response::TypingSignal(result)
            }
        }
    }
    .boxed()
}

async fn create(
    service: &dyn ChatService,
    id: &str,
    fields: ChannelFields,
) -> ServiceResult<Selected> {
    let channel = service.create_channel(id, fields).await?;
    watch(service, channel).await
}

async fn fetch(service: &dyn ChatService, id: &str) -> ServiceResult<Selected> {
    let channel = service
        .get_channel(id)
        .await?
        .ok_or_else(|| ServiceError::channel_not_found(id))?;
    watch(service, channel).await
}

async fn watch(service: &dyn ChatService, channel: Channel) -> ServiceResult<Selected> {
    let typing = service.get_typing(&channel.id).await?;
    Ok(Selected { channel, typing })
}

// ---------------------------------------------------------------------------
// Screen state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Channels,
    CreateId,
    CreateName,
    Lookup,
    UpdateId,
    UpdateName,
    UpdateDescription,
    UpdateStatus,
    Message,
}

impl Focus {
    const RING: [Focus; 9] = [
        Focus::Channels,
        Focus::CreateId,
        Focus::CreateName,
        Focus::Lookup,
        Focus::UpdateId,
        Focus::UpdateName,
        Focus::UpdateDescription,
        Focus::UpdateStatus,
        Focus::Message,
    ];

    fn label(self) -> &'static str {
        match self {
            Focus::Channels => "channels",
            Focus::CreateId => "create id",
            Focus::CreateName => "create name",
            Focus::Lookup => "get channel",
            Focus::UpdateId => "update id",
            Focus::UpdateName => "update name",
            Focus::UpdateDescription => "update description",
            Focus::UpdateStatus => "update status",
            Focus::Message => "message",
        }
    }

    /// Fields shown only while a channel is selected.
    fn needs_channel(self) -> bool {
        matches!(
            self,
            Focus::UpdateId
                | Focus::UpdateName
                | Focus::UpdateDescription
                | Focus::UpdateStatus
                | Focus::Message
        )
    }
}

/// Outcome of the last "get all channels".
struct AllChannels {
    channels: Vec<Channel>,
    total: usize,
    pages: usize,
    complete: bool,
}

#[derive(Default)]
struct UpdateForm {
    id: TextField,
    name: TextField,
    description: TextField,
    status: TextField,
}

impl UpdateForm {
    fn fill(&mut self, channel: &Channel) {
        self.id.set(&channel.id);
        self.name.set(channel.name.as_deref().unwrap_or_default());
        self.description
            .set(channel.description.as_deref().unwrap_or_default());
        self.status.set(channel.status.as_deref().unwrap_or_default());
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

pub struct ManagerScreen {
    user_label: String,
    page_limit: usize,
    max_pages: usize,
    focus: Focus,
    all: Option<AllChannels>,
    loading_all: bool,
    highlighted: usize,
    create_id: TextField,
    create_name: TextField,
    lookup: TextField,
    update: UpdateForm,
    message: TextField,
    channel: Option<Channel>,
    presence: Option<Vec<String>>,
    typing: Vec<String>,
    /// Feeds `Response::Typing` for the selected channel; replaced on every selection.
    typing_feed: Option<Forward>,
}

impl ManagerScreen {
    pub fn new(user_label: String, config: &Config) -> Self {
        Self {
            user_label,
            page_limit: config.page_limit,
            max_pages: config.max_pages,
            focus: Focus::Channels,
            all: None,
            loading_all: false,
            highlighted: 0,
            create_id: TextField::default(),
            create_name: TextField::default(),
            lookup: TextField::default(),
            update: UpdateForm::default(),
            message: TextField::default(),
            channel: None,
            presence: None,
            typing: Vec::new(),
            typing_feed: None,
        }
    }

    fn cycle_focus(&mut self, forward: bool) {
        let ring = Focus::RING;
        let mut idx = ring.iter().position(|f| *f == self.focus).unwrap_or(0);
        loop {
            idx = if forward {
                (idx + 1) % ring.len()
            } else {
                (idx + ring.len() - 1) % ring.len()
            };
            if self.channel.is_some() || !ring[idx].needs_channel() {
                break;
            }
        }
        self.focus = ring[idx];
    }

    fn focused_field(&mut self) -> Option<&mut TextField> {
        match self.focus {
            Focus::Channels => None,
            Focus::CreateId => Some(&mut self.create_id),
            Focus::CreateName => Some(&mut self.create_name),
            Focus::Lookup => Some(&mut self.lookup),
            Focus::UpdateId => Some(&mut self.update.id),
            Focus::UpdateName => Some(&mut self.update.name),
            Focus::UpdateDescription => Some(&mut self.update.description),
            Focus::UpdateStatus => Some(&mut self.update.status),
            Focus::Message => Some(&mut self.message),
        }
    }

    fn submit(&mut self, backend: &Backend<Command, Response>) {
        match self.focus {
            Focus::Channels => {
                self.loading_all = true;
                backend.send(Command::GetAll {
                    limit: self.page_limit,
                    max_pages: self.max_pages,
                });
            }
            Focus::CreateId | Focus::CreateName => backend.send(Command::Create {
                id: self.create_id.value().trim().to_string(),
                fields: ChannelFields::from_form(self.create_name.value(), "", ""),
            }),
            Focus::Lookup => backend.send(Command::Get {
                id: self.lookup.value().trim().to_string(),
            }),
            Focus::UpdateId
            | Focus::UpdateName
            | Focus::UpdateDescription
            | Focus::UpdateStatus => {
                backend.send(Command::Update {
                    id: self.update.id.value().trim().to_string(),
                    fields: ChannelFields::from_update_form(
                        self.update.name.value(),
                        self.update.description.value(),
                        self.update.status.value(),
                    ),
                })
            }
            Focus::Message => {}
        }
    }

    /// Make `selected` the current channel and start following its typing stream.
    fn select(&mut self, selected: Selected, backend: &Backend<Command, Response>) {
        let channel_id = selected.channel.id.clone();
        self.typing.clear();
        self.presence = None;
        let feed = backend.forward(selected.typing, move |user_ids| Response::Typing {
            channel_id: channel_id.clone(),
            user_ids,
        });
        if self.typing_feed.replace(feed).is_some() {
            tracing::debug!("previous typing subscription released");
        }
        self.channel = Some(selected.channel);
    }

    fn deselect(&mut self) {
        self.channel = None;
        if self.typing_feed.take().is_some() {
            tracing::debug!("typing subscription released");
        }
        self.typing.clear();
        self.presence = None;
        self.message.clear();
        if self.focus.needs_channel() {
            self.focus = Focus::Lookup;
        }
    }

    fn selected_id(&self) -> Option<String> {
        self.channel.as_ref().map(|c| c.id.clone())
    }
}

impl Screen for ManagerScreen {
    type Command = Command;
    type Response = Response;

    fn title(&self) -> String {
        "Channel Manager".to_string()
    }

    fn user_label(&self) -> String {
        self.user_label.clone()
    }

    fn focus_label(&self) -> &'static str {
        self.focus.label()
    }

    fn shortcuts(&self) -> &'static [&'static Category] {
        &[&SHORTCUTS]
    }

    fn start(&mut self, _backend: &Backend<Command, Response>) {}

    fn handle_key(
        &mut self,
        key: KeyEvent,
        backend: &Backend<Command, Response>,
        status: &mut Status,
    ) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Tab => self.cycle_focus(true),
            KeyCode::BackTab => self.cycle_focus(false),
            KeyCode::Enter => self.submit(backend),
            KeyCode::Char('p') if ctrl => match self.selected_id() {
                Some(id) => backend.send(Command::Presence { id }),
                None => status.info("Get a channel first"),
            },
            KeyCode::Char('d') | KeyCode::Char('x') if ctrl => match self.selected_id() {
                Some(id) => backend.send(Command::Delete {
                    id,
                    soft: key.code == KeyCode::Char('d'),
                }),
                None => status.info("Get a channel first"),
            },
            KeyCode::Char('u') if ctrl => {
                let typing_reset = self.focus == Focus::Message && !self.message.is_empty();
                if let Some(field) = self.focused_field() {
                    field.clear();
                }
                if typing_reset {
                    if let Some(id) = self.selected_id() {
                        backend.send(Command::Typing { id, active: false });
                    }
                }
            }
            KeyCode::Up if self.focus == Focus::Channels => {
                self.highlighted = self.highlighted.saturating_sub(1);
            }
            KeyCode::Down if self.focus == Focus::Channels => {
                let len = self.all.as_ref().map_or(0, |a| a.channels.len());
                if self.highlighted + 1 < len {
                    self.highlighted += 1;
                }
            }
            KeyCode::Char(' ') if self.focus == Focus::Channels => {
                if let Some(channel) = self
                    .all
                    .as_ref()
                    .and_then(|a| a.channels.get(self.highlighted))
                {
                    self.lookup.set(&channel.id);
                    backend.send(Command::Get {
                        id: channel.id.clone(),
                    });
                }
            }
            code if !ctrl => {
                let is_message = self.focus == Focus::Message;
                let changed = self.focused_field().is_some_and(|f| f.handle_key(code));
                if changed && is_message {
                    if let Some(id) = self.selected_id() {
                        backend.send(Command::Typing {
                            id,
                            active: !self.message.is_empty(),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_response(
        &mut self,
        response: Response,
        backend: &Backend<Command, Response>,
        status: &mut Status,
    ) {
        match response {
            Response::Listing(listing) => {
                self.loading_all = false;
                let complete = listing.list.is_complete();
                if let Some(err) = &listing.error {
                    status.error("Get all channels", err);
                } else {
                    status.info(format!(
                        "Fetched {} channel(s) in {} page(s)",
                        listing.list.items.len(),
                        listing.list.pages
                    ));
                }
                self.highlighted = 0;
                self.all = Some(AllChannels {
                    channels: listing.list.items,
                    total: listing.list.total,
                    pages: listing.list.pages,
                    complete,
                });
            }
            Response::Created(Ok(selected)) => {
                self.create_id.clear();
                self.create_name.clear();
                status.info(format!("Created channel {}", selected.channel.id));
                self.select(selected, backend);
            }
            Response::Created(Err(e)) => status.error("Create channel", &e),
            Response::Fetched(Ok(selected)) => {
                self.update.fill(&selected.channel);
                self.select(selected, backend);
            }
            Response::Fetched(Err(e)) => status.error("Get channel", &e),
            Response::Updated(Ok(channel)) => {
                self.update.clear();
                status.info(format!("Updated channel {}", channel.id));
                if self.selected_id().as_deref() != Some(channel.id.as_str()) {
                    self.typing_feed = None;
                    self.typing.clear();
                }
                self.channel = Some(channel);
            }
            Response::Updated(Err(e)) => status.error("Update channel", &e),
            Response::Deleted { id, soft, result } => match result {
                Ok(()) => {
                    self.update.clear();
                    let kind = if soft { "Soft" } else { "Hard" };
                    status.info(format!("{} deleted channel {}", kind, id));
                    if self.selected_id().as_deref() == Some(id.as_str()) {
                        self.deselect();
                    }
                }
                Err(e) => status.error("Delete channel", &e),
            },
            Response::Presence { id, result } => match result {
                Ok(ids) if self.selected_id().as_deref() == Some(id.as_str()) => {
                    self.presence = Some(ids);
                }
                Ok(_) => {}
                Err(e) => status.error("Get channel presence", &e),
            },
            Response::TypingSignal(Err(e)) => status.error("Typing", &e),
            Response::TypingSignal(Ok(())) => {}
            Response::Typing {
                channel_id,
                user_ids,
            } => {
                if self.selected_id().as_deref() == Some(channel_id.as_str()) {
                    self.typing = user_ids;
                }
            }
        }
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let [left, right] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(area);

        let [list_area, create_id_area, create_name_area, lookup_area] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(FIELD_HEIGHT),
            Constraint::Length(FIELD_HEIGHT),
            Constraint::Length(FIELD_HEIGHT),
        ])
        .areas(left);

        self.render_all_channels(frame, list_area);
        self.render_field(frame, create_id_area, Focus::CreateId);
        self.render_field(frame, create_name_area, Focus::CreateName);
        self.render_field(frame, lookup_area, Focus::Lookup);

        let Some(channel) = &self.channel else {
            let hint = Paragraph::new(Line::from(Span::styled(
                " Get a channel to unlock additional features",
                Style::default().fg(Color::DarkGray),
            )))
            .block(panel());
            frame.render_widget(hint, right);
            return;
        };

        let [info_area, id_area, name_area, desc_area, status_area, live_area, message_area] =
            Layout::vertical([
                Constraint::Length(3),
                Constraint::Length(FIELD_HEIGHT),
                Constraint::Length(FIELD_HEIGHT),
                Constraint::Length(FIELD_HEIGHT),
                Constraint::Length(FIELD_HEIGHT),
                Constraint::Fill(1),
                Constraint::Length(FIELD_HEIGHT),
            ])
            .areas(right);

        let label = Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::BOLD);
        let info = Paragraph::new(Line::from(vec![
            Span::styled(" Selected: ", label),
            Span::styled(channel.id.clone(), Style::default().fg(Color::Yellow)),
            Span::raw(format!(
                "  {}  [{}]",
                channel.display_name(),
                channel.status.as_deref().unwrap_or("-")
            )),
        ]))
        .block(panel());
        frame.render_widget(info, info_area);

        self.render_field(frame, id_area, Focus::UpdateId);
        self.render_field(frame, name_area, Focus::UpdateName);
        self.render_field(frame, desc_area, Focus::UpdateDescription);
        self.render_field(frame, status_area, Focus::UpdateStatus);

        let presence = match &self.presence {
            Some(ids) => ids.join(", "),
            None => "(Ctrl+P to fetch)".to_string(),
        };
        let live = Paragraph::new(vec![
            Line::from(vec![
                Span::styled(" Channel presence: ", label),
                Span::raw(presence),
            ]),
            Line::from(vec![
                Span::styled(" Currently typing user ids: ", label),
                Span::styled(self.typing.join(", "), Style::default().fg(Color::Cyan)),
            ]),
        ])
        .wrap(Wrap { trim: false })
        .block(panel());
        frame.render_widget(live, live_area);

        self.render_field(frame, message_area, Focus::Message);
    }
}

fn panel() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
}

impl ManagerScreen {
    fn render_field(&self, frame: &mut Frame, area: Rect, focus: Focus) {
        let (text, title, placeholder) = match focus {
            Focus::Channels => return,
            Focus::CreateId => (&self.create_id, "Create: channel ID", "new-channel"),
            Focus::CreateName => (&self.create_name, "Create: name", "Enter to create"),
            Focus::Lookup => (&self.lookup, "Get channel: ID", "Enter to fetch"),
            Focus::UpdateId => (&self.update.id, "Update: channel ID", ""),
            Focus::UpdateName => (&self.update.name, "Update: name", ""),
            Focus::UpdateDescription => (&self.update.description, "Update: description", ""),
            Focus::UpdateStatus => (&self.update.status, "Update: status", ""),
            Focus::Message => (&self.message, "Type a message", "typing starts as you type"),
        };
        field::render(frame, area, text, title, placeholder, self.focus == focus);
    }

    fn render_all_channels(&self, frame: &mut Frame, area: Rect) {
        let focused = self.focus == Focus::Channels;
        let border = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(" Get all channels (Enter) ");

        let mut lines = Vec::new();
        if self.loading_all {
            lines.push(Line::from(Span::styled(
                " Loading...",
                Style::default().fg(Color::DarkGray),
            )));
        }
        if let Some(all) = &self.all {
            let label = Style::default().add_modifier(Modifier::BOLD);
            let mut count = vec![
                Span::styled(" Total count: ", label),
                Span::raw(all.total.to_string()),
                Span::styled(
                    format!("  ({} page(s))", all.pages),
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            if !all.complete {
                count.push(Span::styled("  partial", Style::default().fg(Color::Red)));
            }
            lines.push(Line::from(count));
            let ids: Vec<&str> = all.channels.iter().map(|c| c.id.as_str()).collect();
            lines.push(Line::from(vec![
                Span::styled(" Existing Channels: ", label),
                Span::raw(ids.join(", ")),
            ]));
            lines.push(Line::from(""));
            for (idx, channel) in all.channels.iter().enumerate() {
                let style = if focused && idx == self.highlighted {
                    Style::default().fg(Color::Black).bg(Color::Yellow)
                } else {
                    Style::default()
                };
                lines.push(Line::from(Span::styled(
                    format!(
                        " {:<20} {:<20} {}",
                        channel.id,
                        channel.display_name(),
                        channel.status.as_deref().unwrap_or("")
                    ),
                    style,
                )));
            }
        }

        // Keep the highlighted row on screen.
        let visible = area.height.saturating_sub(2) as usize;
        let row = self.highlighted + 3 + usize::from(self.loading_all);
        let scroll = (row + 1).saturating_sub(visible) as u16;
        frame.render_widget(Paragraph::new(lines).block(block).scroll((scroll, 0)), area);
    }
}

/// Run the channel manager until the user quits.
pub async fn run(session: &Session, config: &Config, logs: Option<LogBuffer>) -> Result<()> {
    let label = match session.current_user().await {
        Ok(user) => user.display_name().to_string(),
        Err(_) => session.user_id().to_string(),
    };
    let screen = ManagerScreen::new(label, config);
    let backend = Backend::start(session.service(), execute);
    app::run(screen, backend, logs).await
}
