//! Data models for chat entities

mod channel;
mod message;
mod timetoken;
mod user;

pub use channel::*;
pub use message::*;
pub use timetoken::*;
pub use user::*;
