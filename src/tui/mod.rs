//! Terminal screens for the chat demos.
//!
//! Both screens share one event loop and frame layout (`app`, `ui`).

mod app;
mod backend;
mod chat;
mod debug_log;
mod field;
mod help;
mod log_capture;
mod manager;
mod messages;
mod ui;

pub use chat::run as run_chat;
pub use log_capture::LogBuffer;
pub use manager::run as run_manager;
