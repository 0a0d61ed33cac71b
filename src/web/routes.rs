use super::handlers;
use super::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::public::index))
        .route("/api/catalog", get(handlers::public::catalog_json))
        .route(
            "/stream/*key",
            get(handlers::public::stream).layer(CorsLayer::permissive()),
        )
        .route("/fake-buy/*filename", post(handlers::public::fake_buy))
        .route("/download/:token", get(handlers::public::download))
        .route("/health", get(handlers::public::health))
}

pub fn admin_routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/login", get(handlers::auth::login_form))
        .route("/admin/login", post(handlers::auth::login))
        .route("/admin/logout", get(handlers::auth::logout))
        .route("/admin", get(handlers::admin::dashboard))
        .route(
            "/admin",
            post(handlers::admin::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route(
            "/admin/delete/:kind/:filename",
            post(handlers::admin::delete_media),
        )
        .route(
            "/admin/category/add",
            post(handlers::admin::add_category),
        )
        .route(
            "/admin/category/delete",
            post(handlers::admin::delete_category),
        )
}
