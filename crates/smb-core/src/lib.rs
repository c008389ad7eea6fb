//! Core domain + application logic for Smart Media Bot.
//!
//! Framework-agnostic: Telegram, yt-dlp and HTTP page fetching live behind
//! ports (traits) implemented in adapter crates.

pub mod article;
pub mod bot;
pub mod callbacks;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod media;
pub mod messages;
pub mod messaging;
pub mod ports;
pub mod summarize;
pub mod urls;
pub mod users;

pub use errors::{Error, Result};
