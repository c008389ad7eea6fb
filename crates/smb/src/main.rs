use std::sync::Arc;

use smb_core::{
    bot::MediaBot, config::Config, media::MediaDownloader, summarize::ArticleSummarizer,
    users::UserStore,
};
use smb_telegram::{
    router::{build_bot, run_polling, AppState},
    TelegramMessenger,
};
use smb_web::HttpPageFetcher;
use smb_ytdlp::{YtDlpClient, YtDlpConfig};
use tokio_util::sync::CancellationToken;

mod health;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    smb_core::logging::init("smb")?;

    let cfg = Config::load().map_err(|e| {
        tracing::error!("{e}");
        e
    })?;
    let cfg = Arc::new(cfg);

    let shutdown = CancellationToken::new();
    let health = match health::bind(&cfg.health_bind, cfg.health_port).await {
        Ok(listener) => {
            tracing::info!("Health server starting on port {}", cfg.health_port);
            let shutdown = shutdown.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = health::serve(listener, shutdown).await {
                    tracing::error!("Health server error: {e}");
                }
            }))
        }
        Err(e) => {
            tracing::error!("Health server error: {e}");
            None
        }
    };

    let users = Arc::new(UserStore::open(cfg.clone()));
    let ytdlp = Arc::new(YtDlpClient::new(YtDlpConfig {
        program: cfg.ytdlp_path.clone(),
        timeout: cfg.download_timeout,
    }));
    let pages = Arc::new(HttpPageFetcher::new(cfg.fetch_timeout)?);

    let tg = build_bot(&cfg)?;
    let messenger = Arc::new(TelegramMessenger::new(tg.clone()));
    let media_bot = Arc::new(MediaBot::new(
        cfg.clone(),
        users,
        MediaDownloader::new(ytdlp, cfg.download_folder.clone(), cfg.cookies_file.clone()),
        ArticleSummarizer::new(pages),
        messenger,
    ));

    tracing::info!("Smart Media Bot starting...");
    let polled = run_polling(
        tg,
        Arc::new(AppState {
            cfg,
            bot: media_bot,
        }),
    )
    .await;

    shutdown.cancel();
    if let Some(health) = health {
        if let Err(e) = health.await {
            tracing::debug!("health server task failed: {e}");
        }
    }
    polled
}
