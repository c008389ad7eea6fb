//! Telegram update handlers.
//!
//! Each handler converts a teloxide update into core types and calls into
//! `smb-core`'s `MediaBot`. Core errors are logged here and never stop the
//! dispatcher.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, User},
};

use smb_core::{
    bot::Sender,
    domain::{ChatId, UserId},
};

use crate::router::AppState;

mod callback;
mod commands;
mod text;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.starts_with('/') {
        return commands::handle_command(msg, state).await;
    }
    text::handle_text(msg, state).await
}

pub(crate) fn sender(chat_id: teloxide::types::ChatId, user: &User) -> Sender {
    Sender {
        chat_id: ChatId(chat_id.0),
        user_id: UserId(user.id.0 as i64),
        first_name: user.first_name.clone(),
    }
}

pub(crate) fn log_failure(what: &str, sender: &Sender, result: smb_core::Result<()>) {
    if let Err(e) = result {
        tracing::warn!(
            user_id = sender.user_id.0,
            chat_id = sender.chat_id.0,
            "{what} failed: {e}"
        );
    }
}
