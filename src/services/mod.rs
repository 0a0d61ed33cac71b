pub mod auth;
pub mod catalog;
pub mod json_catalog;
pub mod listing;
pub mod media;
pub mod sql_catalog;
pub mod tokens;

pub use catalog::{Catalog, CatalogError, CatalogResult};
pub use json_catalog::JsonCatalog;
pub use sql_catalog::SqlCatalog;

use crate::config::{CatalogBackend, Config};
use crate::Database;
use anyhow::Result;
use std::sync::Arc;

/// Opens the configured metadata backend, migrating SQLite on the way.
pub fn open_catalog(config: &Config) -> Result<Arc<dyn Catalog>> {
    match config.catalog.backend {
        CatalogBackend::Json => {
            tracing::info!(dir = %config.catalog.data_dir, "using JSON catalog");
            Ok(Arc::new(JsonCatalog::open(&config.catalog.data_dir)?))
        }
        CatalogBackend::Sqlite => {
            let path = &config.catalog.database_path;
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let db = Database::open_with_pool_size(path, config.catalog.pool_size)?;
            db.migrate()?;
            tracing::info!(path = %path, "using SQLite catalog");
            Ok(Arc::new(SqlCatalog::new(db)))
        }
    }
}
