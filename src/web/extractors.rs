use crate::web::error::json_failure;
use crate::web::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "session";

fn session_token(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

/// A request carrying a live admin session. Rejects with a 401 JSON body.
pub struct CurrentAdmin(pub String);

impl FromRequestParts<Arc<AppState>> for CurrentAdmin {
    type Rejection = Response;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let token = session_token(parts).filter(|t| state.sessions.validate(t));
        Box::pin(async move {
            token
                .map(CurrentAdmin)
                .ok_or_else(|| json_failure(StatusCode::UNAUTHORIZED, "Not authorized"))
        })
    }
}

/// Admin session if there is one; page handlers redirect when it is missing.
pub struct OptionalAdmin(pub Option<String>);

impl OptionalAdmin {
    pub fn is_logged_in(&self) -> bool {
        self.0.is_some()
    }
}

impl FromRequestParts<Arc<AppState>> for OptionalAdmin {
    type Rejection = std::convert::Infallible;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let token = session_token(parts).filter(|t| state.sessions.validate(t));
        Box::pin(async move { Ok(OptionalAdmin(token)) })
    }
}
