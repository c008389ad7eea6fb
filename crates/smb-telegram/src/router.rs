use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*};

use smb_core::{bot::MediaBot, config::Config};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub bot: Arc<MediaBot>,
}

/// Build a Bot API client with the configured connect/request timeouts.
pub fn build_bot(cfg: &Config) -> anyhow::Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .connect_timeout(cfg.telegram_connect_timeout)
        .timeout(cfg.telegram_request_timeout)
        .build()?;
    Ok(Bot::with_client(cfg.bot_token.clone(), client))
}

/// Verify the token with `getMe` and return the bot's username.
pub async fn check_token(bot: &Bot) -> anyhow::Result<String> {
    let me = bot.get_me().await?;
    Ok(me.username().to_string())
}

/// Long-poll until Ctrl-C.
pub async fn run_polling(bot: Bot, state: Arc<AppState>) -> anyhow::Result<()> {
    match check_token(&bot).await {
        Ok(username) => tracing::info!("Smart Media Bot started: @{username}"),
        Err(e) => tracing::warn!("getMe failed, polling anyway: {e}"),
    }
    tracing::info!(
        download_folder = %state.cfg.download_folder.display(),
        user_data = %state.cfg.user_data_file.display(),
        "ready"
    );

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text(
            "an error from the update listener",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("polling stopped");
    Ok(())
}
