//! Plain-text liveness endpoint for hosting platforms that expect an open port.

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub const RUNNING: &str = "Smart Media Bot is running!";

async fn running() -> &'static str {
    RUNNING
}

/// Every path answers `GET`; nothing is logged per request.
pub fn router() -> Router {
    Router::new().fallback_service(get(running))
}

pub async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    Ok(TcpListener::bind((host, port)).await?)
}

pub async fn serve(listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { shutdown.cancelled_owned().await })
        .await?;
    Ok(())
}
