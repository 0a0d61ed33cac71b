use crate::models::{Category, MediaKind, MediaRecord, NewMediaRecord};
use crate::services::catalog::{normalize_category_name, Catalog, CatalogError, CatalogResult};
use crate::Database;
use rusqlite::{ErrorCode, OptionalExtension, Row};

const RECORD_COLUMNS: &str =
    "kind, filename, url, artist, genre, title, price, thumb_url, category_id, created_at";

pub struct SqlCatalog {
    db: Database,
}

impl SqlCatalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<MediaRecord> {
    Ok(MediaRecord {
        kind: row
            .get::<_, String>(0)?
            .parse()
            .unwrap_or(MediaKind::Audio),
        filename: row.get(1)?,
        url: row.get(2)?,
        artist: row.get(3)?,
        genre: row.get(4)?,
        title: row.get(5)?,
        price: row.get(6)?,
        thumb_url: row.get(7)?,
        category_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn is_constraint(err: &rusqlite::Error, code: ErrorCode) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == code)
}

fn backend(err: rusqlite::Error) -> CatalogError {
    CatalogError::Backend(err.into())
}

impl Catalog for SqlCatalog {
    fn list_categories(&self) -> CatalogResult<Vec<Category>> {
        let conn = self.db.get()?;
        let mut stmt = conn
            .prepare("SELECT id, name, created_at FROM categories ORDER BY name")
            .map_err(backend)?;
        let categories = stmt
            .query_map([], row_to_category)
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        Ok(categories)
    }

    fn get_category(&self, id: i64) -> CatalogResult<Option<Category>> {
        let conn = self.db.get()?;
        conn.query_row(
            "SELECT id, name, created_at FROM categories WHERE id = ?",
            [id],
            row_to_category,
        )
        .optional()
        .map_err(backend)
    }

    fn add_category(&self, name: &str) -> CatalogResult<Category> {
        let name = normalize_category_name(name)?;
        let conn = self.db.get()?;
        match conn.execute("INSERT INTO categories (name) VALUES (?)", [&name]) {
            Ok(_) => {}
            Err(e) if is_constraint(&e, ErrorCode::ConstraintViolation) => {
                return Err(CatalogError::Conflict(format!("category '{}'", name)));
            }
            Err(e) => return Err(backend(e)),
        }
        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT id, name, created_at FROM categories WHERE id = ?",
            [id],
            row_to_category,
        )
        .map_err(backend)
    }

    fn delete_category(&self, id: i64) -> CatalogResult<()> {
        let conn = self.db.get()?;
        // foreign_keys is on, so ON DELETE SET NULL detaches the records
        let deleted = conn
            .execute("DELETE FROM categories WHERE id = ?", [id])
            .map_err(backend)?;
        if deleted == 0 {
            return Err(CatalogError::NotFound(format!("category {}", id)));
        }
        Ok(())
    }

    fn insert_record(&self, record: NewMediaRecord) -> CatalogResult<MediaRecord> {
        if let Some(category_id) = record.category_id {
            if self.get_category(category_id)?.is_none() {
                return Err(CatalogError::NotFound(format!("category {}", category_id)));
            }
        }

        let conn = self.db.get()?;
        let result = conn.execute(
            "INSERT INTO media (kind, filename, url, artist, genre, title, price, thumb_url, category_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                record.kind.to_string(),
                &record.filename,
                &record.url,
                &record.artist,
                &record.genre,
                &record.title,
                record.price,
                &record.thumb_url,
                record.category_id,
            ),
        );
        match result {
            Ok(_) => {}
            Err(e) if is_constraint(&e, ErrorCode::ConstraintViolation) => {
                return Err(CatalogError::Conflict(format!(
                    "{} '{}'",
                    record.kind, record.filename
                )));
            }
            Err(e) => return Err(backend(e)),
        }

        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {} FROM media WHERE id = ?", RECORD_COLUMNS),
            [id],
            row_to_record,
        )
        .map_err(backend)
    }

    fn find_record(&self, kind: MediaKind, filename: &str) -> CatalogResult<Option<MediaRecord>> {
        let conn = self.db.get()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM media WHERE kind = ? AND filename = ?",
                RECORD_COLUMNS
            ),
            (kind.to_string(), filename),
            row_to_record,
        )
        .optional()
        .map_err(backend)
    }

    fn list_records(&self, kind: MediaKind) -> CatalogResult<Vec<MediaRecord>> {
        let conn = self.db.get()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM media WHERE kind = ? ORDER BY id",
                RECORD_COLUMNS
            ))
            .map_err(backend)?;
        let records = stmt
            .query_map([kind.to_string()], row_to_record)
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        Ok(records)
    }

    fn delete_record(&self, kind: MediaKind, filename: &str) -> CatalogResult<MediaRecord> {
        let record = self
            .find_record(kind, filename)?
            .ok_or_else(|| CatalogError::NotFound(format!("{} '{}'", kind, filename)))?;
        let conn = self.db.get()?;
        conn.execute(
            "DELETE FROM media WHERE kind = ? AND filename = ?",
            (kind.to_string(), filename),
        )
        .map_err(backend)?;
        Ok(record)
    }
}
