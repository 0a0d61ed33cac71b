use crate::models::{stream_url, Category, MediaKind, MediaRecord};
use crate::services::catalog::Catalog;
use crate::services::media::{basename, classify_key, file_stem, format_price};
use crate::storage::{MediaStore, ObjectInfo};
use anyhow::Result;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const UNCATEGORIZED: &str = "Uncategorized";

const DISCOVERED_AUDIO_PRICE: i64 = 100;
const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Serialize)]
pub struct CatalogItem {
    pub kind: MediaKind,
    pub filename: String,
    pub url: String,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub title: Option<String>,
    pub price: i64,
    pub price_display: String,
    pub thumb_url: Option<String>,
    pub category_id: Option<i64>,
    pub category_name: String,
    /// False for objects found in the bucket without a catalog record.
    pub in_catalog: bool,
}

impl CatalogItem {
    fn from_record(record: MediaRecord, category_names: &HashMap<i64, String>) -> Self {
        let category_name = record
            .category_id
            .and_then(|id| category_names.get(&id).cloned())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        let category_id = record
            .category_id
            .filter(|id| category_names.contains_key(id));
        Self {
            kind: record.kind,
            filename: record.filename,
            url: record.url,
            artist: record.artist,
            genre: record.genre,
            title: record.title,
            price: record.price,
            price_display: format_price(record.price),
            thumb_url: record.thumb_url,
            category_id,
            category_name,
            in_catalog: true,
        }
    }

    fn discovered(kind: MediaKind, object: &ObjectInfo) -> Self {
        let filename = basename(&object.key).to_string();
        let (artist, genre, title, price) = match kind {
            MediaKind::Audio => (
                Some(UNKNOWN.to_string()),
                Some(UNKNOWN.to_string()),
                None,
                DISCOVERED_AUDIO_PRICE,
            ),
            MediaKind::Video => (None, None, Some(file_stem(&filename)), 0),
        };
        Self {
            kind,
            url: stream_url(&object.key),
            filename,
            artist,
            genre,
            title,
            price,
            price_display: format_price(price),
            thumb_url: None,
            category_id: None,
            category_name: UNCATEGORIZED.to_string(),
            in_catalog: false,
        }
    }

    /// Case-insensitive match; `query` must already be lowercase.
    fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let hit = |field: &Option<String>| {
            field
                .as_deref()
                .map(|v| v.to_lowercase().contains(query))
                .unwrap_or(false)
        };
        if self.filename.to_lowercase().contains(query) {
            return true;
        }
        match self.kind {
            MediaKind::Audio => hit(&self.artist) || hit(&self.genre),
            MediaKind::Video => hit(&self.title),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySection {
    pub id: Option<i64>,
    pub name: String,
    pub audios: Vec<CatalogItem>,
    pub videos: Vec<CatalogItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogView {
    pub query: String,
    pub sections: Vec<CategorySection>,
}

impl CatalogView {
    pub fn items(&self) -> impl Iterator<Item = &CatalogItem> {
        self.sections
            .iter()
            .flat_map(|s| s.audios.iter().chain(s.videos.iter()))
    }
}

/// Flat audio and video lists: catalog records first, then bucket objects
/// that have no record of their kind.
pub fn merge_items(
    categories: &[Category],
    audios: Vec<MediaRecord>,
    videos: Vec<MediaRecord>,
    objects: &[ObjectInfo],
) -> (Vec<CatalogItem>, Vec<CatalogItem>) {
    let category_names: HashMap<i64, String> =
        categories.iter().map(|c| (c.id, c.name.clone())).collect();

    let known_audio: HashSet<String> = audios.iter().map(|r| r.filename.clone()).collect();
    let known_video: HashSet<String> = videos.iter().map(|r| r.filename.clone()).collect();

    let mut audio_items: Vec<CatalogItem> = audios
        .into_iter()
        .map(|r| CatalogItem::from_record(r, &category_names))
        .collect();
    let mut video_items: Vec<CatalogItem> = videos
        .into_iter()
        .map(|r| CatalogItem::from_record(r, &category_names))
        .collect();

    for object in objects {
        let name = basename(&object.key);
        match classify_key(&object.key) {
            Some(MediaKind::Audio) if !known_audio.contains(name) => {
                audio_items.push(CatalogItem::discovered(MediaKind::Audio, object));
            }
            Some(MediaKind::Video) if !known_video.contains(name) => {
                video_items.push(CatalogItem::discovered(MediaKind::Video, object));
            }
            _ => {}
        }
    }

    (audio_items, video_items)
}

/// Groups merged items by category, filtered by a search query.
pub fn build_view(
    categories: &[Category],
    audios: Vec<MediaRecord>,
    videos: Vec<MediaRecord>,
    objects: &[ObjectInfo],
    query: &str,
) -> CatalogView {
    let query = query.trim().to_lowercase();
    let (audio_items, video_items) = merge_items(categories, audios, videos, objects);

    let mut sections: Vec<CategorySection> = categories
        .iter()
        .map(|c| CategorySection {
            id: Some(c.id),
            name: c.name.clone(),
            audios: Vec::new(),
            videos: Vec::new(),
        })
        .collect();
    let mut uncategorized = CategorySection {
        id: None,
        name: UNCATEGORIZED.to_string(),
        audios: Vec::new(),
        videos: Vec::new(),
    };

    for item in audio_items.into_iter().chain(video_items) {
        if !item.matches(&query) {
            continue;
        }
        let section = match item.category_id {
            Some(id) => sections.iter_mut().find(|s| s.id == Some(id)),
            None => None,
        };
        let section = section.unwrap_or(&mut uncategorized);
        match item.kind {
            MediaKind::Audio => section.audios.push(item),
            MediaKind::Video => section.videos.push(item),
        }
    }

    if !uncategorized.audios.is_empty() || !uncategorized.videos.is_empty() {
        sections.push(uncategorized);
    }

    CatalogView { query, sections }
}

/// Bucket listing, or an empty one when storage is unreachable.
pub async fn list_objects_or_empty(store: &dyn MediaStore) -> Vec<ObjectInfo> {
    match store.list_objects().await {
        Ok(objects) => objects,
        Err(e) => {
            tracing::warn!(error = %e, "storage listing failed, showing catalog only");
            Vec::new()
        }
    }
}

pub async fn load_view(
    catalog: &dyn Catalog,
    store: &dyn MediaStore,
    query: &str,
) -> Result<CatalogView> {
    let objects = list_objects_or_empty(store).await;
    let categories = catalog.list_categories()?;
    let audios = catalog.list_records(MediaKind::Audio)?;
    let videos = catalog.list_records(MediaKind::Video)?;
    Ok(build_view(&categories, audios, videos, &objects, query))
}
