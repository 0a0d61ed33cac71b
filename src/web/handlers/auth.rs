use crate::services::auth;
use crate::web::error::AppResult;
use crate::web::extractors::{OptionalAdmin, SESSION_COOKIE};
use crate::web::flash;
use crate::web::state::AppState;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use std::sync::Arc;
use time::Duration;
use tracing::{info, warn};

const DEFAULT_NEXT: &str = "/admin";

#[derive(Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

/// Only same-site absolute paths are allowed as a post-login target.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n,
        _ => DEFAULT_NEXT,
    }
}

pub async fn login_form(
    State(state): State<Arc<AppState>>,
    admin: OptionalAdmin,
    jar: CookieJar,
    Query(query): Query<NextQuery>,
) -> AppResult<Response> {
    if admin.is_logged_in() {
        return Ok(Redirect::to(DEFAULT_NEXT).into_response());
    }

    let (jar, flashes) = flash::take(jar);
    let mut ctx = state.page_context(&flashes);
    ctx.insert("next", safe_next(query.next.as_deref()));
    let html = state.templates.render("admin/login.html", &ctx)?;
    Ok((jar, Html(html)).into_response())
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let limiter_key = format!("login:{}", form.username);
    if !state.login_limiter.check(&limiter_key) {
        warn!(username = %form.username, "login rate limit reached");
        let jar = flash::error(jar, "Too many login attempts. Try again later.");
        return Ok((jar, Redirect::to("/admin/login")).into_response());
    }

    if !auth::check_admin_credentials(&state.config.admin, &form.username, &form.password) {
        state.login_limiter.record_attempt(&limiter_key);
        warn!(username = %form.username, "failed admin login");
        let jar = flash::error(jar, "Invalid username or password");
        return Ok((jar, Redirect::to("/admin/login")).into_response());
    }

    state.login_limiter.clear(&limiter_key);
    let token = state.sessions.create();
    let max_age = Duration::try_from(state.sessions.lifetime()).unwrap_or(Duration::days(7));
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .max_age(max_age)
        .build();

    info!(username = %form.username, "admin logged in");
    let jar = flash::success(jar.add(cookie), "Logged in");
    let next = safe_next(form.next.as_deref()).to_string();
    Ok((jar, Redirect::to(&next)).into_response())
}

pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> AppResult<Response> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }

    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    let jar = flash::success(jar, "Logged out");
    Ok((jar, Redirect::to("/admin/login")).into_response())
}
