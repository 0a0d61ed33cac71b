use anyhow::Result;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "storefront.toml";

fn starter_config() -> &'static str {
    r#"[site]
title = "Media Storefront"

[server]
host = "127.0.0.1"
port = 5001

[catalog]
# "sqlite" or "json"
backend = "sqlite"
data_dir = "./data"
database_path = "./data/storefront.db"

[storage]
# "s3" or "memory"
backend = "s3"
bucket = ""
region = "fra1"
# Leave empty for https://<region>.digitaloceanspaces.com
endpoint = ""
# Prefer SPACES_KEY / SPACES_SECRET in the environment
access_key = ""
secret_key = ""
public_read = false

[admin]
username = "admin"
# Prefer ADMIN_PASS in the environment, or set password_hash to an argon2 PHC string
password = ""

[auth]
session_lifetime = "7d"
max_login_attempts = 5

[download]
# "redirect" to a presigned URL, or "proxy" through this server
mode = "redirect"
presign_expiry_secs = 3600

[media]
covers_dir = "./static/covers"
max_upload_size = "512MB"
"#
}

pub async fn run(path: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&path)?;
    std::fs::create_dir_all(path.join("data"))?;
    std::fs::create_dir_all(path.join("static/covers"))?;

    let config_path = path.join(CONFIG_FILE);
    write_config(&config_path)?;

    tracing::info!("Created storefront at {:?}", path);
    tracing::info!("Fill in [storage] and [admin] in {}", CONFIG_FILE);
    tracing::info!("Run 'storefront serve' to start the server");

    Ok(())
}

fn write_config(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        anyhow::bail!(
            "{} already exists; remove it first to start over",
            config_path.display()
        );
    }
    std::fs::write(config_path, starter_config())?;
    Ok(())
}
