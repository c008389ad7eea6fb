use std::sync::Arc;

use teloxide::prelude::*;

use smb_core::{
    bot::CallbackContext,
    domain::{MessageId, MessageRef},
};

use super::{log_failure, sender};
use crate::router::AppState;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    // Buttons on messages too old to be delivered have no chat to reply into.
    let Some(message) = q.message.as_ref() else {
        tracing::debug!(callback_id = %q.id, "callback without message");
        if let Err(e) = bot.answer_callback_query(q.id).await {
            tracing::debug!("answer callback query failed: {e}");
        }
        return Ok(());
    };

    let from = sender(message.chat.id, &q.from);
    let ctx = CallbackContext {
        callback_id: q.id.clone(),
        message: Some(MessageRef {
            chat_id: from.chat_id,
            message_id: MessageId(message.id.0),
        }),
        data: q.data.clone().unwrap_or_default(),
        from,
    };

    let result = state.bot.callback(&ctx).await;
    log_failure(&format!("callback {}", ctx.data), &ctx.from, result);
    Ok(())
}
