use crate::config::DownloadMode;
use crate::services::listing;
use crate::services::media::resolve_content_type;
use crate::storage::{StorageError, StoredObject};
use crate::web::error::AppResult;
use crate::web::flash;
use crate::web::range::parse_range_header;
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(search): Query<SearchQuery>,
) -> AppResult<Response> {
    let view = listing::load_view(state.catalog.as_ref(), state.store.as_ref(), &search.q).await?;

    let (jar, flashes) = flash::take(jar);
    let mut ctx = state.page_context(&flashes);
    ctx.insert("query", &view.query);
    ctx.insert("sections", &view.sections);

    let html = state.templates.render("public/index.html", &ctx)?;
    Ok((jar, Html(html)).into_response())
}

/// Same view as the index page, as JSON.
pub async fn catalog_json(
    State(state): State<Arc<AppState>>,
    Query(search): Query<SearchQuery>,
) -> AppResult<Response> {
    let view = listing::load_view(state.catalog.as_ref(), state.store.as_ref(), &search.q).await?;
    Ok(Json(view).into_response())
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn storage_failure(key: &str, err: &StorageError) -> Response {
    error!(key, error = %err, "storage error");
    (StatusCode::BAD_GATEWAY, "Storage unavailable").into_response()
}

fn range_not_satisfiable(size: u64) -> Response {
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [
            (header::CONTENT_RANGE, format!("bytes */{}", size)),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
    )
        .into_response()
}

/// `GET /stream/*key` with Range support.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Response {
    let meta = match state.store.head_object(&key).await {
        Ok(meta) => meta,
        Err(e) if e.is_not_found() => return (StatusCode::NOT_FOUND, "File not found").into_response(),
        Err(e) => return storage_failure(&key, &e),
    };
    let size = meta.size;
    let content_type = resolve_content_type(&key, meta.content_type.as_deref());

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range_header);

    let Some(range) = range else {
        return match state.store.get_object(&key).await {
            Ok(StoredObject { body, .. }) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CONTENT_LENGTH, body.len().to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                body,
            )
                .into_response(),
            Err(e) if e.is_not_found() => (StatusCode::NOT_FOUND, "File not found").into_response(),
            Err(e) => storage_failure(&key, &e),
        };
    };

    let Some((start, end)) = range.resolve(size) else {
        return range_not_satisfiable(size);
    };

    match state.store.get_object_range(&key, start, end).await {
        Ok(StoredObject { body, .. }) => (
            StatusCode::PARTIAL_CONTENT,
            [
                (header::CONTENT_TYPE, content_type),
                (header::CONTENT_LENGTH, body.len().to_string()),
                (header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, size)),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            body,
        )
            .into_response(),
        Err(e) if e.is_not_found() => (StatusCode::NOT_FOUND, "File not found").into_response(),
        Err(StorageError::InvalidRange { size, .. }) => range_not_satisfiable(size),
        Err(e) => storage_failure(&key, &e),
    }
}

/// `POST /fake-buy/*filename`: no payment, just a one-time download link.
pub async fn fake_buy(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let Some(record) = state.catalog.find_by_filename(&filename)? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "File not found" })),
        )
            .into_response());
    };

    let token = state.tokens.issue(&record.filename);
    info!(
        filename = %record.filename,
        kind = %record.kind,
        pending = state.tokens.pending(),
        "issued download token"
    );

    Ok(Json(json!({
        "success": true,
        "download_url": format!("/download/{}", token),
    }))
    .into_response())
}

/// `GET /download/:token`: redeems a token once.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<Response> {
    let Some(filename) = state.tokens.redeem(&token) else {
        return Ok((
            StatusCode::GONE,
            "This link is invalid or has already been used.",
        )
            .into_response());
    };

    if state.catalog.find_by_filename(&filename)?.is_none() {
        warn!(filename = %filename, "token redeemed for a file no longer in the catalog");
        return Ok((StatusCode::NOT_FOUND, "File not found").into_response());
    }

    match state.config.download.mode {
        DownloadMode::Redirect => {
            let expires = Duration::from_secs(state.config.download.presign_expiry_secs);
            match state.store.presign_get(&filename, expires).await {
                Ok(url) => Ok(Redirect::to(&url).into_response()),
                Err(e) if e.is_not_found() => {
                    Ok((StatusCode::NOT_FOUND, "File not found").into_response())
                }
                Err(e) => Ok(storage_failure(&filename, &e)),
            }
        }
        DownloadMode::Proxy => match state.store.get_object(&filename).await {
            Ok(object) => {
                let content_type =
                    resolve_content_type(&filename, object.content_type.as_deref());
                let disposition = format!(
                    "attachment; filename=\"{}\"",
                    filename.replace(['"', '\\'], "_")
                );
                Ok((
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE, content_type),
                        (header::CONTENT_LENGTH, object.body.len().to_string()),
                        (header::CONTENT_DISPOSITION, disposition),
                    ],
                    object.body,
                )
                    .into_response())
            }
            Err(e) if e.is_not_found() => {
                Ok((StatusCode::NOT_FOUND, "File not found").into_response())
            }
            Err(e) => Ok(storage_failure(&filename, &e)),
        },
    }
}
