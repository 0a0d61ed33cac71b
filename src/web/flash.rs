use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub message: String,
}

fn decode(jar: &CookieJar) -> Vec<FlashMessage> {
    jar.get(FLASH_COOKIE)
        .and_then(|c| URL_SAFE_NO_PAD.decode(c.value()).ok())
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

/// Queues a message for the next rendered page.
pub fn push(jar: CookieJar, level: FlashLevel, message: impl Into<String>) -> CookieJar {
    let mut messages = decode(&jar);
    messages.push(FlashMessage {
        level,
        message: message.into(),
    });
    let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&messages).unwrap_or_default());
    let cookie = Cookie::build((FLASH_COOKIE, encoded))
        .path("/")
        .http_only(true)
        .build();
    jar.add(cookie)
}

pub fn success(jar: CookieJar, message: impl Into<String>) -> CookieJar {
    push(jar, FlashLevel::Success, message)
}

pub fn error(jar: CookieJar, message: impl Into<String>) -> CookieJar {
    push(jar, FlashLevel::Error, message)
}

/// Drains queued messages, clearing the cookie.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<FlashMessage>) {
    let messages = decode(&jar);
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, messages);
    }
    let jar = jar.remove(Cookie::build((FLASH_COOKIE, "")).path("/"));
    (jar, messages)
}
