use crate::config::AdminConfig;
use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dW5rbm93bg$0000000000000000000000000000000000000000000";

pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => {
            if let Ok(dummy) = PasswordHash::new(DUMMY_HASH) {
                let _ = Argon2::default().verify_password(password.as_bytes(), &dummy);
            }
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Checks submitted credentials against the configured administrator.
pub fn check_admin_credentials(admin: &AdminConfig, username: &str, password: &str) -> bool {
    let user_ok = constant_time_eq(username.as_bytes(), admin.username.as_bytes());
    let pass_ok = match admin.password_hash.as_deref() {
        Some(hash) => verify_password(password, hash),
        None => {
            !admin.password.is_empty()
                && constant_time_eq(password.as_bytes(), admin.password.as_bytes())
        }
    };
    user_ok && pass_ok
}

pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// In-memory admin sessions. Restarting the process logs everyone out.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Instant>>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn create(&self) -> String {
        let token = generate_session_token();
        let expires_at = Instant::now() + self.lifetime;
        self.sessions
            .write()
            .unwrap()
            .insert(token.clone(), expires_at);
        token
    }

    pub fn validate(&self, token: &str) -> bool {
        let now = Instant::now();
        match self.sessions.read().unwrap().get(token) {
            Some(expires_at) => *expires_at > now,
            None => false,
        }
    }

    pub fn remove(&self, token: &str) {
        self.sessions.write().unwrap().remove(token);
    }

    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().unwrap();
        let before = sessions.len();
        sessions.retain(|_, expires_at| *expires_at > now);
        before - sessions.len()
    }
}
