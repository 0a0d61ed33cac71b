use crate::config::Config;
use crate::services::auth::SessionStore;
use crate::services::catalog::Catalog;
use crate::services::tokens::DownloadTokens;
use crate::storage::MediaStore;
use crate::web::flash::FlashMessage;
use crate::web::security::RateLimiter;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tera::{Context, Tera};

const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<dyn Catalog>,
    pub store: Arc<dyn MediaStore>,
    pub templates: Tera,
    pub tokens: DownloadTokens,
    pub sessions: SessionStore,
    pub login_limiter: RateLimiter,
    pub covers_dir: PathBuf,
}

impl AppState {
    pub fn new(
        config: Config,
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn MediaStore>,
    ) -> Result<Self> {
        let mut templates = Tera::default();
        templates.add_raw_templates(vec![
            ("base.html", include_str!("../../templates/base.html")),
            ("public/index.html", include_str!("../../templates/public/index.html")),
            ("admin/login.html", include_str!("../../templates/admin/login.html")),
            ("admin/index.html", include_str!("../../templates/admin/index.html")),
        ])?;

        let sessions = SessionStore::new(config.auth.session_duration()?);
        let login_limiter = RateLimiter::new(config.auth.max_login_attempts, LOGIN_WINDOW);
        let covers_dir = PathBuf::from(&config.media.covers_dir);

        Ok(Self {
            config,
            catalog,
            store,
            templates,
            tokens: DownloadTokens::new(),
            sessions,
            login_limiter,
            covers_dir,
        })
    }

    pub fn page_context(&self, flashes: &[FlashMessage]) -> Context {
        let mut ctx = Context::new();
        ctx.insert("site", &self.config.site);
        ctx.insert("flashes", flashes);
        ctx.insert("version", env!("CARGO_PKG_VERSION"));
        ctx
    }
}
