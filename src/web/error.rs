use crate::services::catalog::CatalogError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Application error: {:?}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// `{"success": false, "message": ...}` with the given status.
pub fn json_failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "success": false, "message": message.into() })),
    )
        .into_response()
}

pub fn catalog_failure(err: CatalogError) -> Response {
    match err {
        CatalogError::NotFound(what) => {
            json_failure(StatusCode::NOT_FOUND, format!("{} not found", what))
        }
        CatalogError::Conflict(what) => {
            json_failure(StatusCode::CONFLICT, format!("{} already exists", what))
        }
        CatalogError::Invalid(reason) => json_failure(StatusCode::BAD_REQUEST, reason),
        CatalogError::Backend(e) => {
            tracing::error!("Catalog error: {:?}", e);
            json_failure(StatusCode::INTERNAL_SERVER_ERROR, "Catalog unavailable")
        }
    }
}
