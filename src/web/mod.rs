mod error;
mod extractors;
mod flash;
mod handlers;
mod range;
mod routes;
pub mod security;
mod state;

pub use flash::{FlashLevel, FlashMessage};
pub use range::{parse_range_header, RangeSpec};
pub use state::AppState;

use crate::services::{self, Catalog};
use crate::storage::{self, MediaStore};
use crate::Config;
use anyhow::Result;
use axum::middleware;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// The full application router over an already assembled state.
pub fn build_router(state: Arc<AppState>) -> Result<Router> {
    let max_upload = state.config.media.max_upload_bytes()?;

    Ok(Router::new()
        .merge(routes::public_routes())
        .merge(routes::admin_routes(max_upload))
        .nest_service("/static/covers", ServeDir::new(&state.covers_dir))
        .layer(middleware::from_fn(security::apply_security_headers))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

pub fn build_state(
    config: Config,
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn MediaStore>,
) -> Result<Arc<AppState>> {
    Ok(Arc::new(AppState::new(config, catalog, store)?))
}

pub async fn serve(config: Config) -> Result<()> {
    let catalog = services::open_catalog(&config)?;
    let store = storage::open_store(&config.storage);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    std::fs::create_dir_all(&config.media.covers_dir)?;
    let state = build_state(config, catalog, store)?;

    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let expired = cleanup_state.sessions.cleanup_expired();
            if expired > 0 {
                tracing::debug!(expired, "removed expired sessions");
            }
            cleanup_state.login_limiter.cleanup();
        }
    });

    let app = build_router(state)?;

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
