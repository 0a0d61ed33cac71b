use crate::models::{Category, MediaKind, MediaRecord, NewMediaRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Metadata store for media records and categories.
///
/// Two backends share these semantics: `SqlCatalog` on SQLite and
/// `JsonCatalog` on flat JSON files.
pub trait Catalog: Send + Sync {
    fn list_categories(&self) -> CatalogResult<Vec<Category>>;

    fn get_category(&self, id: i64) -> CatalogResult<Option<Category>>;

    fn add_category(&self, name: &str) -> CatalogResult<Category>;

    /// Removes the category; records pointing at it lose their category.
    fn delete_category(&self, id: i64) -> CatalogResult<()>;

    fn insert_record(&self, record: NewMediaRecord) -> CatalogResult<MediaRecord>;

    fn find_record(&self, kind: MediaKind, filename: &str) -> CatalogResult<Option<MediaRecord>>;

    fn list_records(&self, kind: MediaKind) -> CatalogResult<Vec<MediaRecord>>;

    fn delete_record(&self, kind: MediaKind, filename: &str) -> CatalogResult<MediaRecord>;

    /// Audio takes precedence when both kinds carry the same filename.
    fn find_by_filename(&self, filename: &str) -> CatalogResult<Option<MediaRecord>> {
        for kind in MediaKind::ALL {
            if let Some(record) = self.find_record(kind, filename)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

pub(crate) fn normalize_category_name(name: &str) -> CatalogResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::Invalid(
            "category name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > 120 {
        return Err(CatalogError::Invalid(
            "category name must be 120 characters or less".to_string(),
        ));
    }
    Ok(name.to_string())
}
