use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use std::collections::HashMap;
use std::sync::Mutex;

/// One-time download tokens, kept in process memory only.
///
/// A token maps to the filename it was bought for and is removed the first
/// time it is redeemed. Tokens never expire on their own.
#[derive(Default)]
pub struct DownloadTokens {
    tokens: Mutex<HashMap<String, String>>,
}

impl DownloadTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, filename: &str) -> String {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        self.tokens
            .lock()
            .unwrap()
            .insert(token.clone(), filename.to_string());
        token
    }

    /// Consumes the token, returning its filename the first time only.
    pub fn redeem(&self, token: &str) -> Option<String> {
        self.tokens.lock().unwrap().remove(token)
    }

    pub fn pending(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }
}
