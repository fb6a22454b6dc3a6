//! HTTP request handlers.

pub mod api_auth;
mod chat;
mod health;
pub mod rate_limit;

pub use chat::{chat, chat_stream};
pub use health::health;
