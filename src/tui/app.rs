//! Shared screen shell and the main event loop.
//!
//! Each screen owns its own state and command/response types. The shell
//! around it holds what every screen has: the status line (one error
//! slot), the help popup, the diagnostics pane and the exit flag.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{FutureExt, StreamExt};
use ratatui::{layout::Rect, DefaultTerminal, Frame};

use super::backend::Backend;
use super::debug_log::DebugLogState;
use super::help::Category;
use super::log_capture::LogBuffer;
use super::ui;

/// Redraw interval while idle, so captured logs show up (~30 fps).
const FRAME_DURATION_MS: u64 = 33;

/// Lines moved per PgUp/PgDn in the diagnostics pane.
const LOG_SCROLL_STEP: usize = 5;

/// One interactive screen.
pub trait Screen {
    type Command: Send + 'static;
    type Response: Send + 'static;

    /// Left side of the header bar.
    fn title(&self) -> String;

    /// Right side of the header bar.
    fn user_label(&self) -> String;

    /// Name of the focused field, for the status bar.
    fn focus_label(&self) -> &'static str;

    fn shortcuts(&self) -> &'static [&'static Category];

    /// Commands to issue before the first key press.
    fn start(&mut self, backend: &Backend<Self::Command, Self::Response>);

    fn handle_key(
        &mut self,
        key: KeyEvent,
        backend: &Backend<Self::Command, Self::Response>,
        status: &mut Status,
    );

    fn handle_response(
        &mut self,
        response: Self::Response,
        backend: &Backend<Self::Command, Self::Response>,
        status: &mut Status,
    );

    fn render(&self, frame: &mut Frame, area: Rect);
}

/// Message shown in the status bar.
#[derive(Debug, Default)]
pub struct Status {
    pub message: Option<String>,
    pub is_error: bool,
}

impl Status {
    pub fn info(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
        self.is_error = false;
    }

    /// Put `err` in the error slot and log it in full.
    pub fn error(&mut self, action: &str, err: &(dyn std::error::Error + 'static)) {
        tracing::error!("{} failed: {}", action, error_chain(err));
        self.message = Some(extract_error_message(err));
        self.is_error = true;
    }

    pub fn dismiss(&mut self) {
        self.message = None;
        self.is_error = false;
    }
}

/// User-facing text for a failed action.
pub fn extract_error_message(err: &(dyn std::error::Error + 'static)) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        message
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        // Errors that already print their cause are not repeated.
        let cause_text = cause.to_string();
        if !text.ends_with(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

/// State shared by every screen.
pub struct Shell {
    pub should_exit: bool,
    pub status: Status,
    pub show_help: bool,
    pub debug_log: Option<DebugLogState>,
}

impl Shell {
    fn new(logs: Option<LogBuffer>) -> Self {
        Self {
            should_exit: false,
            status: Status::default(),
            show_help: false,
            debug_log: logs.map(DebugLogState::new),
        }
    }

    /// Handle keys that mean the same on every screen.
    ///
    /// Returns true if the key was consumed.
    fn handle_global_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_exit = true;
            return true;
        }
        if self.show_help {
            self.show_help = false;
            return true;
        }
        match key.code {
            KeyCode::F(1) => {
                self.show_help = true;
                true
            }
            KeyCode::F(12) => {
                if let Some(log) = self.debug_log.as_mut() {
                    log.toggle();
                }
                true
            }
            KeyCode::PageUp | KeyCode::PageDown => {
                if let Some(log) = self.debug_log.as_mut().filter(|l| l.visible) {
                    if key.code == KeyCode::PageUp {
                        log.scroll_up(LOG_SCROLL_STEP);
                    } else {
                        log.scroll_down(LOG_SCROLL_STEP);
                    }
                    return true;
                }
                false
            }
            KeyCode::Esc if self.status.message.is_some() => {
                self.status.dismiss();
                true
            }
            _ => false,
        }
    }
}

/// Run `screen` full-screen with panic-safe terminal restore.
pub async fn run<S: Screen>(
    mut screen: S,
    backend: Backend<S::Command, S::Response>,
    logs: Option<LogBuffer>,
) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = AssertUnwindSafe(run_app(&mut terminal, &mut screen, backend, logs))
        .catch_unwind()
        .await;
    ratatui::restore();

    match result {
        Ok(r) => r,
        Err(e) => std::panic::resume_unwind(e),
    }
}

async fn run_app<S: Screen>(
    terminal: &mut DefaultTerminal,
    screen: &mut S,
    mut backend: Backend<S::Command, S::Response>,
    logs: Option<LogBuffer>,
) -> Result<()> {
    let mut shell = Shell::new(logs);
    let mut events = EventStream::new();
    let mut frame_tick = tokio::time::interval(Duration::from_millis(FRAME_DURATION_MS));

    screen.start(&backend);

    while !shell.should_exit {
        if let Some(log) = shell.debug_log.as_mut() {
            log.refresh();
        }
        terminal.draw(|frame| ui::render(frame, &shell, &*screen))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if !shell.handle_global_key(key) {
                        screen.handle_key(key, &backend, &mut shell.status);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            Some(response) = backend.recv() => {
                screen.handle_response(response, &backend, &mut shell.status);
            }
            _ = frame_tick.tick() => {}
        }
    }

    Ok(())
}
