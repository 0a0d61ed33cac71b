use crate::models::{stream_url, Category, MediaKind, MediaRecord, NewMediaRecord};
use crate::services::catalog::{normalize_category_name, Catalog, CatalogError, CatalogResult};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

const AUDIO_FILE: &str = "covers.json";
const VIDEO_FILE: &str = "videos.json";
const CATEGORY_FILE: &str = "categories.json";

/// Audio entries written without a price are listed at this many cents.
const LEGACY_AUDIO_PRICE: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JsonEntry {
    filename: String,
    #[serde(default)]
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thumb_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category_id: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    created_at: String,
}

impl JsonEntry {
    fn into_record(self, kind: MediaKind) -> MediaRecord {
        let url = if self.url.is_empty() {
            stream_url(&self.filename)
        } else {
            self.url
        };
        let price = match kind {
            MediaKind::Audio => self.price.unwrap_or(LEGACY_AUDIO_PRICE),
            MediaKind::Video => self.price.unwrap_or(0),
        };
        MediaRecord {
            kind,
            filename: self.filename,
            url,
            artist: self.artist,
            genre: self.genre,
            title: self.title,
            price,
            thumb_url: self.thumb_url,
            category_id: self.category_id,
            created_at: self.created_at,
        }
    }

    fn from_record(record: &MediaRecord) -> Self {
        Self {
            filename: record.filename.clone(),
            url: record.url.clone(),
            artist: record.artist.clone(),
            genre: record.genre.clone(),
            title: record.title.clone(),
            price: match record.kind {
                MediaKind::Audio => Some(record.price),
                MediaKind::Video => None,
            },
            thumb_url: record.thumb_url.clone(),
            category_id: record.category_id,
            created_at: record.created_at.clone(),
        }
    }
}

/// Catalog kept in `covers.json`, `videos.json` and `categories.json`.
///
/// Each mutation rewrites the affected file whole. Writers inside this
/// process are serialized; other processes editing the files are not.
pub struct JsonCatalog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCatalog {
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating catalog directory {}", dir.display()))?;
        for file in [AUDIO_FILE, VIDEO_FILE, CATEGORY_FILE] {
            let path = dir.join(file);
            if !path.exists() {
                std::fs::write(&path, "[]")
                    .with_context(|| format!("creating {}", path.display()))?;
            }
        }
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn records_path(&self, kind: MediaKind) -> PathBuf {
        match kind {
            MediaKind::Audio => self.dir.join(AUDIO_FILE),
            MediaKind::Video => self.dir.join(VIDEO_FILE),
        }
    }

    fn load_entries(&self, kind: MediaKind) -> CatalogResult<Vec<JsonEntry>> {
        read_json(&self.records_path(kind))
    }

    fn save_entries(&self, kind: MediaKind, entries: &[JsonEntry]) -> CatalogResult<()> {
        write_json(&self.records_path(kind), entries)
    }

    fn load_categories(&self) -> CatalogResult<Vec<Category>> {
        read_json(&self.dir.join(CATEGORY_FILE))
    }

    fn save_categories(&self, categories: &[Category]) -> CatalogResult<()> {
        write_json(&self.dir.join(CATEGORY_FILE), categories)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> CatalogResult<Vec<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("reading {}", path.display()))
                .into())
        }
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let items = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(items)
}

fn write_json<T: Serialize>(path: &Path, items: &[T]) -> CatalogResult<()> {
    let json = serde_json::to_string_pretty(items).context("serializing catalog")?;
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
    std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

impl Catalog for JsonCatalog {
    fn list_categories(&self) -> CatalogResult<Vec<Category>> {
        let mut categories = self.load_categories()?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    fn get_category(&self, id: i64) -> CatalogResult<Option<Category>> {
        Ok(self.load_categories()?.into_iter().find(|c| c.id == id))
    }

    fn add_category(&self, name: &str) -> CatalogResult<Category> {
        let name = normalize_category_name(name)?;
        let _guard = self.lock();
        let mut categories = self.load_categories()?;
        if categories.iter().any(|c| c.name == name) {
            return Err(CatalogError::Conflict(format!("category '{}'", name)));
        }
        let id = categories.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let category = Category {
            id,
            name,
            created_at: now(),
        };
        categories.push(category.clone());
        self.save_categories(&categories)?;
        Ok(category)
    }

    fn delete_category(&self, id: i64) -> CatalogResult<()> {
        let _guard = self.lock();
        let mut categories = self.load_categories()?;
        let before = categories.len();
        categories.retain(|c| c.id != id);
        if categories.len() == before {
            return Err(CatalogError::NotFound(format!("category {}", id)));
        }

        for kind in MediaKind::ALL {
            let mut entries = self.load_entries(kind)?;
            let mut touched = false;
            for entry in entries.iter_mut().filter(|e| e.category_id == Some(id)) {
                entry.category_id = None;
                touched = true;
            }
            if touched {
                self.save_entries(kind, &entries)?;
            }
        }

        self.save_categories(&categories)
    }

    fn insert_record(&self, record: NewMediaRecord) -> CatalogResult<MediaRecord> {
        let _guard = self.lock();
        if let Some(category_id) = record.category_id {
            if !self.load_categories()?.iter().any(|c| c.id == category_id) {
                return Err(CatalogError::NotFound(format!("category {}", category_id)));
            }
        }

        let kind = record.kind;
        let mut entries = self.load_entries(kind)?;
        if entries.iter().any(|e| e.filename == record.filename) {
            return Err(CatalogError::Conflict(format!(
                "{} '{}'",
                kind, record.filename
            )));
        }

        let record = record.into_record(now());
        entries.push(JsonEntry::from_record(&record));
        self.save_entries(kind, &entries)?;
        Ok(record)
    }

    fn find_record(&self, kind: MediaKind, filename: &str) -> CatalogResult<Option<MediaRecord>> {
        Ok(self
            .load_entries(kind)?
            .into_iter()
            .find(|e| e.filename == filename)
            .map(|e| e.into_record(kind)))
    }

    fn list_records(&self, kind: MediaKind) -> CatalogResult<Vec<MediaRecord>> {
        Ok(self
            .load_entries(kind)?
            .into_iter()
            .map(|e| e.into_record(kind))
            .collect())
    }

    fn delete_record(&self, kind: MediaKind, filename: &str) -> CatalogResult<MediaRecord> {
        let _guard = self.lock();
        let mut entries = self.load_entries(kind)?;
        let index = entries
            .iter()
            .position(|e| e.filename == filename)
            .ok_or_else(|| CatalogError::NotFound(format!("{} '{}'", kind, filename)))?;
        let removed = entries.remove(index);
        self.save_entries(kind, &entries)?;
        Ok(removed.into_record(kind))
    }
}

fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
