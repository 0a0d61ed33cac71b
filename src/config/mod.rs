use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_title")]
    pub title: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_site_title(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_backend")]
    pub backend: CatalogBackend,
    /// Directory holding covers.json, videos.json and categories.json.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            backend: default_catalog_backend(),
            data_dir: default_data_dir(),
            database_path: default_database_path(),
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Empty means the DigitalOcean Spaces endpoint for `region`.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub path_style: bool,
    #[serde(default)]
    pub public_read: bool,
}

impl StorageConfig {
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.is_empty() {
            format!("https://{}.digitaloceanspaces.com", self.region)
        } else {
            self.endpoint.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Argon2 PHC string; takes precedence over `password` when set.
    #[serde(default)]
    pub password_hash: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password: String::new(),
            password_hash: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_lifetime")]
    pub session_lifetime: String,
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_lifetime: default_session_lifetime(),
            max_login_attempts: default_max_login_attempts(),
        }
    }
}

impl AuthConfig {
    pub fn session_duration(&self) -> Result<Duration> {
        parse_duration(&self.session_lifetime)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    Redirect,
    Proxy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_mode")]
    pub mode: DownloadMode,
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            mode: default_download_mode(),
            presign_expiry_secs: default_presign_expiry(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    #[serde(default = "default_covers_dir")]
    pub covers_dir: String,
    #[serde(default = "default_max_upload")]
    pub max_upload_size: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            covers_dir: default_covers_dir(),
            max_upload_size: default_max_upload(),
        }
    }
}

impl MediaConfig {
    pub fn max_upload_bytes(&self) -> Result<usize> {
        parse_size(&self.max_upload_size)
    }
}

fn default_site_title() -> String {
    "Media Storefront".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_catalog_backend() -> CatalogBackend {
    CatalogBackend::Sqlite
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_database_path() -> String {
    "./data/storefront.db".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::S3
}

fn default_region() -> String {
    "fra1".to_string()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_session_lifetime() -> String {
    "7d".to_string()
}

fn default_max_login_attempts() -> usize {
    5
}

fn default_download_mode() -> DownloadMode {
    DownloadMode::Redirect
}

fn default_presign_expiry() -> u64 {
    3600
}

fn default_covers_dir() -> String {
    "./static/covers".to_string()
}

fn default_max_upload() -> String {
    "512MB".to_string()
}

/// Parses sizes such as `512MB`, `10 KB` or `1048576`.
pub fn parse_size(s: &str) -> Result<usize> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();
    let (digits, multiplier) = if let Some(n) = upper.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = upper.strip_suffix('B') {
        (n, 1)
    } else {
        (upper.as_str(), 1)
    };
    let value: usize = digits
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid size '{}'", s))?;
    Ok(value * multiplier)
}

/// Parses durations such as `7d`, `12h`, `30m` or `45s`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.len() < 2 {
        anyhow::bail!("Invalid duration '{}'", s);
    }
    let (digits, unit) = s.split_at(s.len() - 1);
    let value: u64 = digits
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid duration '{}'", s))?;
    let secs = match unit {
        "d" => value * 86_400,
        "h" => value * 3_600,
        "m" => value * 60,
        "s" => value,
        _ => anyhow::bail!("Invalid duration unit in '{}' (use d, h, m or s)", s),
    };
    Ok(Duration::from_secs(secs))
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Could not read config file '{}': {}. Run `storefront init` to create one.",
                path.display(),
                e
            )
        })?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Environment variables win over the file so secrets can stay out of it.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: [(&str, &mut String); 7] = [
            ("SPACES_KEY", &mut self.storage.access_key),
            ("SPACES_SECRET", &mut self.storage.secret_key),
            ("SPACES_BUCKET", &mut self.storage.bucket),
            ("SPACES_REGION", &mut self.storage.region),
            ("SPACES_ENDPOINT", &mut self.storage.endpoint),
            ("ADMIN_USER", &mut self.admin.username),
            ("ADMIN_PASS", &mut self.admin.password),
        ];
        for (key, field) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.backend == StorageBackend::S3 {
            let missing: Vec<&str> = [
                ("bucket", &self.storage.bucket),
                ("access_key", &self.storage.access_key),
                ("secret_key", &self.storage.secret_key),
                ("region", &self.storage.region),
            ]
            .iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(k, _)| *k)
            .collect();
            if !missing.is_empty() {
                anyhow::bail!(
                    "storage settings missing: {} (set them in the config file or via SPACES_* variables)",
                    missing.join(", ")
                );
            }
        }
        if self.admin.username.is_empty() {
            anyhow::bail!("admin.username must not be empty");
        }
        if self.admin.password.is_empty() && self.admin.password_hash.is_none() {
            anyhow::bail!("admin.password or admin.password_hash must be set (or ADMIN_PASS)");
        }
        if self.download.presign_expiry_secs == 0 {
            anyhow::bail!("download.presign_expiry_secs must be greater than 0");
        }
        if self.download.presign_expiry_secs > 7 * 86_400 {
            anyhow::bail!("download.presign_expiry_secs must be 604800 (7 days) or less");
        }
        if self.auth.max_login_attempts == 0 {
            anyhow::bail!("auth.max_login_attempts must be greater than 0");
        }
        self.auth.session_duration()?;
        self.media.max_upload_bytes()?;
        Ok(())
    }
}
