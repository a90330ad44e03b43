//! Configuration loader and validator for the catalog mirror.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub app: App,
    pub source: Source,
    pub ingest: Ingest,
    #[serde(default)]
    pub notify: Notify,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Directory for staged photo files; defaults to `{data_dir}/staging`.
    #[serde(default)]
    pub scratch_dir: Option<String>,
    pub interval_seconds: u64,
}

/// Authoritative catalog source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub query_timeout_seconds: u64,
    /// Listing query returning `(code, name, price, owner)`.
    #[serde(default)]
    pub list_query: Option<String>,
    /// Detail query bound to one code, returning `(photo, name, price)`.
    #[serde(default)]
    pub detail_query: Option<String>,
}

/// Remote ingestion service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingest {
    pub base_url: String,
    pub timeout_seconds: u64,
}

/// Per-cycle status notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notify {
    pub desktop: bool,
    pub title: String,
    pub subtitle: String,
}

impl Default for Notify {
    fn default() -> Self {
        Self {
            desktop: false,
            title: "Sync status".into(),
            subtitle: "Catalog sync".into(),
        }
    }
}

/// Reconciliation switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSettings {
    /// Publish products that have no photo and no ledger entry yet.
    #[serde(default)]
    pub publish_without_photo: bool,
}

impl App {
    pub fn resolved_scratch_dir(&self) -> PathBuf {
        match self.scratch_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => Path::new(&self.data_dir).join("staging"),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Source {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }
}

impl Ingest {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    /// Ensure required directories exist (data dir and scratch dir).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)?;
        fs::create_dir_all(self.app.resolved_scratch_dir())
    }

    /// Default ledger URL when `DATABASE_URL` is not set.
    pub fn ledger_url(&self) -> String {
        format!("sqlite://{}/ledger.db", self.app.data_dir.trim_end_matches('/'))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.interval_seconds == 0 {
        return Err(ConfigError::Invalid("app.interval_seconds must be > 0"));
    }

    if cfg.source.url.trim().is_empty() {
        return Err(ConfigError::Invalid("source.url must be non-empty"));
    }
    if cfg.source.query_timeout_seconds == 0 {
        return Err(ConfigError::Invalid(
            "source.query_timeout_seconds must be > 0",
        ));
    }
    if matches!(cfg.source.list_query.as_deref(), Some(q) if q.trim().is_empty()) {
        return Err(ConfigError::Invalid("source.list_query must be non-empty when set"));
    }
    if matches!(cfg.source.detail_query.as_deref(), Some(q) if q.trim().is_empty()) {
        return Err(ConfigError::Invalid("source.detail_query must be non-empty when set"));
    }

    if Url::parse(&cfg.ingest.base_url).is_err() {
        return Err(ConfigError::Invalid("ingest.base_url must be an absolute URL"));
    }
    if cfg.ingest.timeout_seconds == 0 {
        return Err(ConfigError::Invalid("ingest.timeout_seconds must be > 0"));
    }

    Ok(())
}

/// Returns the canonical example YAML content.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  interval_seconds: 3600

source:
  url: "sqlite://catalog.db"
  query_timeout_seconds: 30

ingest:
  base_url: "http://localhost:3000/"
  timeout_seconds: 30

notify:
  desktop: false
  title: "Sync status"
  subtitle: "Catalog sync"

sync:
  publish_without_photo: false
"#
}
