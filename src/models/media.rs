use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Audio, MediaKind::Video];
}

impl FromStr for MediaKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Catalog entry for one uploaded file. Prices are in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRecord {
    pub kind: MediaKind,
    pub filename: String,
    pub url: String,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub title: Option<String>,
    pub price: i64,
    pub thumb_url: Option<String>,
    pub category_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewMediaRecord {
    pub kind: MediaKind,
    pub filename: String,
    pub url: String,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub title: Option<String>,
    pub price: i64,
    pub thumb_url: Option<String>,
    pub category_id: Option<i64>,
}

impl NewMediaRecord {
    pub fn audio(filename: &str, artist: &str, genre: &str, price: i64) -> Self {
        Self {
            kind: MediaKind::Audio,
            filename: filename.to_string(),
            url: stream_url(filename),
            artist: Some(artist.to_string()),
            genre: Some(genre.to_string()),
            title: None,
            price,
            thumb_url: None,
            category_id: None,
        }
    }

    pub fn video(filename: &str, title: &str) -> Self {
        Self {
            kind: MediaKind::Video,
            filename: filename.to_string(),
            url: stream_url(filename),
            artist: None,
            genre: None,
            title: Some(title.to_string()),
            price: 0,
            thumb_url: None,
            category_id: None,
        }
    }

    pub fn with_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id;
        self
    }

    pub fn with_thumb(mut self, thumb_url: Option<String>) -> Self {
        self.thumb_url = thumb_url;
        self
    }

    pub fn into_record(self, created_at: String) -> MediaRecord {
        MediaRecord {
            kind: self.kind,
            filename: self.filename,
            url: self.url,
            artist: self.artist,
            genre: self.genre,
            title: self.title,
            price: self.price,
            thumb_url: self.thumb_url,
            category_id: self.category_id,
            created_at,
        }
    }
}

pub fn stream_url(key: &str) -> String {
    format!("/stream/{}", key)
}
