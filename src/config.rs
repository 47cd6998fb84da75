use std::path::PathBuf;

use anyhow::Context;

const DEFAULT_SESSION_DAYS: i64 = 14;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub media_root: PathBuf,
    pub session_lifetime: time::Duration,
    pub max_upload_bytes: usize,
    /// Username promoted to staff at startup, if it exists.
    pub admin_username: Option<String>,
    pub secure_cookies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://socialapp.db".into(),
            host: "127.0.0.1".into(),
            port: 8000,
            media_root: PathBuf::from("media"),
            session_lifetime: time::Duration::days(DEFAULT_SESSION_DAYS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            admin_username: None,
            secure_cookies: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let database_url = env_or("DATABASE_URL", defaults.database_url);
        let host = env_or("HOST", defaults.host);
        let port = match std::env::var("PORT") {
            Ok(value) => value.parse().context("PORT must be a valid port number")?,
            Err(_) => defaults.port,
        };
        let media_root = std::env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.media_root);
        let session_lifetime = match std::env::var("SESSION_DAYS") {
            Ok(value) => {
                let days: i64 = value.parse().context("SESSION_DAYS must be an integer")?;
                anyhow::ensure!(days > 0, "SESSION_DAYS must be positive");
                time::Duration::days(days)
            }
            Err(_) => defaults.session_lifetime,
        };
        let max_upload_bytes = match std::env::var("MAX_UPLOAD_BYTES") {
            Ok(value) => value
                .parse()
                .context("MAX_UPLOAD_BYTES must be a byte count")?,
            Err(_) => defaults.max_upload_bytes,
        };
        let admin_username = std::env::var("ADMIN_USERNAME")
            .ok()
            .filter(|name| !name.trim().is_empty());
        let secure_cookies = std::env::var("SECURE_COOKIES")
            .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.secure_cookies);

        Ok(Self {
            database_url,
            host,
            port,
            media_root,
            session_lifetime,
            max_upload_bytes,
            admin_username,
            secure_cookies,
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}
