//! Messenger abstraction the bot talks through (Telegram in production, fakes in tests).

pub mod port;
pub mod types;
