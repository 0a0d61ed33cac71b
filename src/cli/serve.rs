use crate::{web, Config};
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!(
        catalog = ?config.catalog.backend,
        storage = ?config.storage.backend,
        download = ?config.download.mode,
        "Starting storefront"
    );

    web::serve(config).await
}
