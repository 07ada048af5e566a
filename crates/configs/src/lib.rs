use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_STORAGE_PATH: &str = "data/session.json";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Whole-request timeout; `None` leaves it to the transport.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: default_base_url(), request_timeout_secs: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: default_storage_path() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { poll_interval_secs: default_poll_interval() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `compact` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: default_log_format() }
    }
}

fn default_base_url() -> String { DEFAULT_API_BASE_URL.to_string() }
fn default_storage_path() -> String { DEFAULT_STORAGE_PATH.to_string() }
fn default_poll_interval() -> u64 { 5 }
fn default_log_format() -> String { "compact".to_string() }

/// Load from `CONFIG_PATH` (default `config.toml`); a missing file yields defaults.
pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if !std::path::Path::new(&path).exists() {
        return Ok(AppConfig::default());
    }
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.api.normalize_from_env();
        self.api.validate()?;
        self.storage.normalize_from_env();
        self.storage.validate()?;
        self.feed.validate()?;
        Ok(())
    }
}

impl ApiConfig {
    /// `API_BASE_URL` wins over the file value; trailing slashes are dropped.
    pub fn normalize_from_env(&mut self) {
        if let Ok(url) = std::env::var("API_BASE_URL") {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        self.normalize();
    }

    pub fn normalize(&mut self) {
        let trimmed = self.base_url.trim().trim_end_matches('/').to_string();
        self.base_url = if trimmed.is_empty() { default_base_url() } else { trimmed };
    }

    pub fn validate(&self) -> Result<()> {
        let lower = self.base_url.to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(anyhow!("api.base_url must start with http:// or https://, got {}", self.base_url));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(anyhow!("api.request_timeout_secs must be a positive number of seconds"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl StorageConfig {
    pub fn normalize_from_env(&mut self) {
        if let Ok(path) = std::env::var("SESSION_STORE_PATH") {
            if !path.trim().is_empty() {
                self.path = path;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(anyhow!("storage.path is empty; set it in config.toml or SESSION_STORE_PATH"));
        }
        Ok(())
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(anyhow!("feed.poll_interval_secs must be >= 1"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.api.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.storage.path, DEFAULT_STORAGE_PATH);
        assert_eq!(cfg.feed.poll_interval_secs, 5);
        assert_eq!(cfg.logging.format, "compact");
        assert!(cfg.api.request_timeout().is_none());
    }

    #[test]
    fn parses_sections() {
        let cfg = parse(
            r#"
            [api]
            base_url = "https://attendance.example.com/"
            request_timeout_secs = 10

            [feed]
            poll_interval_secs = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.api.request_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(cfg.feed.poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn normalize_trims_trailing_slash() {
        let mut api = ApiConfig { base_url: " http://backend:8000// ".into(), request_timeout_secs: None };
        api.normalize();
        assert_eq!(api.base_url, "http://backend:8000");
        assert!(api.validate().is_ok());
    }

    #[test]
    fn rejects_non_http_scheme() {
        let api = ApiConfig { base_url: "ftp://backend".into(), request_timeout_secs: None };
        assert!(api.validate().is_err());
    }

    #[test]
    fn rejects_zero_values() {
        let api = ApiConfig { base_url: DEFAULT_API_BASE_URL.into(), request_timeout_secs: Some(0) };
        assert!(api.validate().is_err());
        assert!(FeedConfig { poll_interval_secs: 0 }.validate().is_err());
        assert!(StorageConfig { path: "  ".into() }.validate().is_err());
    }
}
