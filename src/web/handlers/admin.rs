use crate::models::{MediaKind, NewMediaRecord};
use crate::services::listing::{self, merge_items};
use crate::services::media::{self, parse_price, sanitize_filename};
use crate::web::error::{catalog_failure, json_failure, AppResult};
use crate::web::extractors::{CurrentAdmin, OptionalAdmin};
use crate::web::flash;
use crate::web::state::AppState;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum::Form;
use axum_extra::extract::CookieJar;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use std::path::Path as FsPath;
use std::sync::Arc;
use tracing::{error, info, warn};

const COVERS_URL_PREFIX: &str = "/static/covers/";
const LOGIN_REDIRECT: &str = "/admin/login?next=/admin";

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    admin: OptionalAdmin,
    jar: CookieJar,
) -> AppResult<Response> {
    if !admin.is_logged_in() {
        return Ok(Redirect::to(LOGIN_REDIRECT).into_response());
    }

    let objects = listing::list_objects_or_empty(state.store.as_ref()).await;
    let categories = state.catalog.list_categories()?;
    let audios = state.catalog.list_records(MediaKind::Audio)?;
    let videos = state.catalog.list_records(MediaKind::Video)?;
    let (audios, videos) = merge_items(&categories, audios, videos, &objects);

    let (jar, flashes) = flash::take(jar);
    let mut ctx = state.page_context(&flashes);
    ctx.insert("audios", &audios);
    ctx.insert("videos", &videos);
    ctx.insert("categories", &categories);

    let html = state.templates.render("admin/index.html", &ctx)?;
    Ok((jar, Html(html)).into_response())
}

/// Fields of the admin upload form.
#[derive(Default)]
struct UploadForm {
    file: Option<(String, String, Bytes)>,
    thumb: Option<(String, String, Bytes)>,
    media_type: String,
    artist: String,
    genre: String,
    price: String,
    title: String,
    category_id: String,
}

async fn read_upload_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "thumb" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?;
                if file_name.is_empty() || data.is_empty() {
                    continue;
                }
                let part = Some((file_name, content_type, data));
                if name == "file" {
                    form.file = part;
                } else {
                    form.thumb = part;
                }
            }
            "media_type" => form.media_type = field.text().await?,
            "artist" => form.artist = field.text().await?,
            "genre" => form.genre = field.text().await?,
            "price" => form.price = field.text().await?,
            "title" => form.title = field.text().await?,
            "category_id" => form.category_id = field.text().await?,
            _ => {}
        }
    }

    Ok(form)
}

fn or_default(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Writes a cover image under `covers_dir` with a random name and returns
/// its public URL.
async fn save_thumb(
    covers_dir: &FsPath,
    file_name: &str,
    content_type: &str,
    data: &[u8],
) -> anyhow::Result<Option<String>> {
    if !content_type.starts_with("image/") {
        return Ok(None);
    }
    let ext = FsPath::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string());
    let name = format!("{}.{}", uuid::Uuid::new_v4(), ext);

    tokio::fs::create_dir_all(covers_dir).await?;
    tokio::fs::write(covers_dir.join(&name), data).await?;
    Ok(Some(format!("{}{}", COVERS_URL_PREFIX, name)))
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    admin: OptionalAdmin,
    jar: CookieJar,
    multipart: Multipart,
) -> AppResult<Response> {
    if !admin.is_logged_in() {
        return Ok(Redirect::to(LOGIN_REDIRECT).into_response());
    }
    let back = |jar: CookieJar| -> AppResult<Response> {
        Ok((jar, Redirect::to("/admin")).into_response())
    };

    let form = read_upload_form(multipart).await?;

    let Some((raw_name, reported_type, data)) = form.file else {
        return back(flash::error(jar, "No file selected"));
    };
    let Ok(kind) = form.media_type.trim().parse::<MediaKind>() else {
        return back(flash::error(jar, "Invalid media type"));
    };
    let Some(filename) = sanitize_filename(&raw_name) else {
        return back(flash::error(jar, "Invalid file name"));
    };

    if state.catalog.find_record(kind, &filename)?.is_some() {
        return back(flash::error(
            jar,
            format!("A {} named '{}' already exists", kind, filename),
        ));
    }

    // Everything that can be rejected is settled before the object is written.
    let mut jar = jar;
    let category_id = match form.category_id.trim().parse::<i64>() {
        Ok(id) => match state.catalog.get_category(id)? {
            Some(_) => Some(id),
            None => {
                warn!(category_id = id, "upload referenced an unknown category");
                jar = flash::push(
                    jar,
                    flash::FlashLevel::Warning,
                    "Selected category no longer exists; saved without a category",
                );
                None
            }
        },
        Err(_) => None,
    };

    let record = match kind {
        MediaKind::Audio => NewMediaRecord::audio(
            &filename,
            &or_default(&form.artist, "Unknown"),
            &or_default(&form.genre, "Unknown"),
            parse_price(&form.price),
        ),
        MediaKind::Video => NewMediaRecord::video(&filename, &or_default(&form.title, &filename)),
    }
    .with_category(category_id);

    let content_type = media::resolve_content_type(&filename, Some(reported_type.as_str()));
    let size = data.len();
    if let Err(e) = state.store.put_object(&filename, data, &content_type).await {
        error!(filename = %filename, error = %e, "upload to storage failed");
        return back(flash::error(jar, format!("Upload failed: {}", e)));
    }
    info!(filename = %filename, kind = %kind, size, "uploaded media");

    let thumb_url = match form.thumb {
        Some((thumb_name, thumb_type, thumb_data)) => {
            match save_thumb(&state.covers_dir, &thumb_name, &thumb_type, &thumb_data).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, "could not save thumbnail");
                    None
                }
            }
        }
        None => None,
    };

    match state.catalog.insert_record(record.with_thumb(thumb_url.clone())) {
        Ok(record) => {
            let jar = flash::success(jar, format!("Uploaded '{}'", record.filename));
            back(jar)
        }
        Err(e) => {
            error!(filename = %filename, error = %e, "could not save catalog record");
            if let Err(e) = state.store.delete_object(&filename).await {
                warn!(filename = %filename, error = %e, "could not roll back stored object");
            }
            if let Some(url) = thumb_url.as_deref() {
                remove_thumb(&state.covers_dir, url).await;
            }
            back(flash::error(jar, format!("Could not save '{}': {}", filename, e)))
        }
    }
}

/// Removes a cover written by `save_thumb`; URLs outside the covers prefix
/// are left alone.
async fn remove_thumb(covers_dir: &FsPath, thumb_url: &str) {
    let Some(name) = thumb_url.strip_prefix(COVERS_URL_PREFIX) else {
        return;
    };
    let path = covers_dir.join(media::basename(name));
    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!(path = %path.display(), error = %e, "could not remove thumbnail");
    }
}

pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    CurrentAdmin(_): CurrentAdmin,
    Path((kind, filename)): Path<(String, String)>,
) -> AppResult<Response> {
    let Ok(kind) = kind.parse::<MediaKind>() else {
        return Ok(json_failure(StatusCode::BAD_REQUEST, "Invalid media type"));
    };
    if state.catalog.find_record(kind, &filename)?.is_none() {
        return Ok(json_failure(StatusCode::NOT_FOUND, "File not found"));
    }

    let mut warning = None;
    if let Err(e) = state.store.delete_object(&filename).await {
        error!(filename = %filename, error = %e, "storage delete failed");
        warning = Some(format!("Storage delete failed: {}", e));
    }

    let record = match state.catalog.delete_record(kind, &filename) {
        Ok(record) => record,
        Err(e) => return Ok(catalog_failure(e)),
    };

    if let Some(url) = record.thumb_url.as_deref() {
        remove_thumb(&state.covers_dir, url).await;
    }

    info!(filename = %filename, kind = %kind, "deleted media");
    let mut body = json!({
        "success": true,
        "message": format!("Deleted '{}'", filename),
    });
    if let Some(warning) = warning {
        body["warning"] = json!(warning);
    }
    Ok(Json(body).into_response())
}

#[derive(Deserialize)]
pub struct AddCategoryForm {
    #[serde(default)]
    category_name: String,
}

pub async fn add_category(
    State(state): State<Arc<AppState>>,
    CurrentAdmin(_): CurrentAdmin,
    Form(form): Form<AddCategoryForm>,
) -> Response {
    match state.catalog.add_category(&form.category_name) {
        Ok(category) => {
            info!(id = category.id, name = %category.name, "added category");
            Json(json!({
                "success": true,
                "message": format!("Category '{}' added", category.name),
                "category": category,
            }))
            .into_response()
        }
        Err(e) => catalog_failure(e),
    }
}

#[derive(Deserialize)]
pub struct DeleteCategoryForm {
    #[serde(default)]
    category_id: String,
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    CurrentAdmin(_): CurrentAdmin,
    Form(form): Form<DeleteCategoryForm>,
) -> Response {
    let Ok(id) = form.category_id.trim().parse::<i64>() else {
        return json_failure(StatusCode::NOT_FOUND, "Category not found");
    };
    match state.catalog.delete_category(id) {
        Ok(()) => {
            info!(id, "deleted category");
            Json(json!({
                "success": true,
                "message": "Category deleted",
                "category_id": id,
            }))
            .into_response()
        }
        Err(e) => catalog_failure(e),
    }
}
