use crate::models::MediaKind;
use std::path::Path;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "aac", "flac"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv", "avi"];

const MAX_FILENAME_LENGTH: usize = 200;

fn extension(key: &str) -> Option<String> {
    Path::new(key)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Kind of a storage key judged by its extension; `None` for anything else.
pub fn classify_key(key: &str) -> Option<MediaKind> {
    let ext = extension(key)?;
    if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Audio)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

pub fn content_type_for(key: &str) -> String {
    match mime_guess::from_path(key).first() {
        Some(mime) => mime.essence_str().to_string(),
        None if extension(key).as_deref() == Some("mp3") => "audio/mpeg".to_string(),
        None => "video/mp4".to_string(),
    }
}

/// Extension-based type first, then whatever the store or client reported.
pub fn resolve_content_type(key: &str, reported: Option<&str>) -> String {
    if let Some(mime) = mime_guess::from_path(key).first() {
        return mime.essence_str().to_string();
    }
    match reported {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
        _ => content_type_for(key),
    }
}

/// Last path segment of a storage key.
pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

pub fn file_stem(filename: &str) -> String {
    Path::new(basename(filename))
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .to_string()
}

/// Reduces an uploaded name to a safe flat filename: ASCII letters, digits,
/// `.`, `_` and `-` only, no leading dots, whitespace runs become `_`.
/// Returns `None` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut out = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    for c in name.trim().chars() {
        let mapped = if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            Some(c)
        } else if c == '_' || c.is_whitespace() {
            Some('_')
        } else {
            None
        };
        if let Some(c) = mapped {
            if c == '_' && last_was_underscore {
                continue;
            }
            last_was_underscore = c == '_';
            out.push(c);
        }
    }

    let out = out.trim_start_matches(['.', '_']).trim_end_matches('_');
    if out.is_empty() || out.chars().all(|c| c == '.') {
        return None;
    }
    let mut out = out.to_string();
    if out.len() > MAX_FILENAME_LENGTH {
        // An extension that does not fit is cut along with the rest.
        let ext = extension(&out)
            .map(|e| format!(".{}", e))
            .filter(|e| e.len() < MAX_FILENAME_LENGTH)
            .unwrap_or_default();
        out.truncate(MAX_FILENAME_LENGTH - ext.len());
        out.push_str(&ext);
    }
    Some(out)
}

/// Decimal price from the admin form, in cents. Anything unparsable is free.
pub fn parse_price(raw: &str) -> i64 {
    match raw.trim().replace(',', ".").parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => (v * 100.0).round() as i64,
        _ => 0,
    }
}

pub fn format_price(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}
