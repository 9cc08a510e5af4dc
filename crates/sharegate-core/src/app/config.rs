//! BrokerConfig - 設定の読み込み
//!
//! 優先順位: デフォルト値 < 設定ファイル（TOML / JSON）< 環境変数（`SHAREGATE_*`）
//!
//! ```toml
//! [broker]
//! default_ttl_secs = 604800
//! max_token_attempts = 3
//!
//! [sweeper]
//! interval_secs = 60
//!
//! [storage]
//! bucket = "exports"
//! public_base_url = "https://storage.example.com"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::DEFAULT_RETIRED_CAPACITY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format: {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub broker: BrokerSection,
    pub sweeper: SweeperSection,
    pub storage: StorageSection,
    pub notification: NotificationSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSection {
    /// TTL used by `issue_default` (7 days).
    pub default_ttl_secs: u64,
    /// Collision retries before issuance gives up as misconfigured.
    pub max_token_attempts: u32,
    pub upload_timeout_ms: u64,
    pub notify_timeout_ms: u64,
    pub delete_timeout_ms: u64,
    /// Removed tokens the in-memory store keeps refusing to reissue.
    pub retired_token_capacity: usize,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            default_ttl_secs: 7 * 24 * 60 * 60,
            max_token_attempts: 3,
            upload_timeout_ms: 30_000,
            notify_timeout_ms: 10_000,
            delete_timeout_ms: 10_000,
            retired_token_capacity: DEFAULT_RETIRED_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperSection {
    pub interval_secs: u64,
}

impl Default for SweeperSection {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub bucket: String,
    pub public_base_url: String,
    /// Root directory of the local gateway.
    pub root: PathBuf,
    /// Prefix of generated export names (`{prefix}_Export_{date}.xlsx`).
    pub file_prefix: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            bucket: "exports".to_string(),
            public_base_url: "http://localhost:8080/storage".to_string(),
            root: PathBuf::from("./data"),
            file_prefix: "LogiX".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSection {
    pub subject: String,
}

impl Default for NotificationSection {
    fn default() -> Self {
        Self {
            subject: "Your export is ready".to_string(),
        }
    }
}

impl BrokerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a `.toml` or `.json` file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// File (if any), then `SHAREGATE_*` overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.merge_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn merge_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
            value.parse().map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value,
            })
        }

        if let Some(v) = lookup("SHAREGATE_DEFAULT_TTL_SECS") {
            self.broker.default_ttl_secs = parse("SHAREGATE_DEFAULT_TTL_SECS", v)?;
        }
        if let Some(v) = lookup("SHAREGATE_MAX_TOKEN_ATTEMPTS") {
            self.broker.max_token_attempts = parse("SHAREGATE_MAX_TOKEN_ATTEMPTS", v)?;
        }
        if let Some(v) = lookup("SHAREGATE_SWEEP_INTERVAL_SECS") {
            self.sweeper.interval_secs = parse("SHAREGATE_SWEEP_INTERVAL_SECS", v)?;
        }
        if let Some(v) = lookup("SHAREGATE_BUCKET") {
            self.storage.bucket = v;
        }
        if let Some(v) = lookup("SHAREGATE_PUBLIC_BASE_URL") {
            self.storage.public_base_url = v;
        }
        if let Some(v) = lookup("SHAREGATE_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid =
            |msg: &str| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg.to_string())) };

        if self.broker.default_ttl_secs == 0 {
            return invalid("broker.default_ttl_secs must be positive");
        }
        let deadline = self
            .checked_default_ttl()
            .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl));
        if deadline.is_none() {
            return invalid("broker.default_ttl_secs is too large");
        }
        if self.broker.max_token_attempts == 0 {
            return invalid("broker.max_token_attempts must be at least 1");
        }
        if self.broker.retired_token_capacity == 0 {
            return invalid("broker.retired_token_capacity must be at least 1");
        }
        if self.broker.upload_timeout_ms == 0
            || self.broker.notify_timeout_ms == 0
            || self.broker.delete_timeout_ms == 0
        {
            return invalid("broker timeouts must be positive");
        }
        if self.sweeper.interval_secs == 0 {
            return invalid("sweeper.interval_secs must be positive");
        }
        if self.storage.bucket.trim_matches('/').is_empty() {
            return invalid("storage.bucket must not be empty");
        }
        if self.storage.public_base_url.is_empty() {
            return invalid("storage.public_base_url must not be empty");
        }
        Ok(())
    }

    /// Saturates at `TimeDelta::MAX`; `validate` rejects anything that large.
    pub fn default_ttl(&self) -> chrono::Duration {
        self.checked_default_ttl().unwrap_or(chrono::Duration::MAX)
    }

    fn checked_default_ttl(&self) -> Option<chrono::Duration> {
        i64::try_from(self.broker.default_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.broker.upload_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.broker.notify_timeout_ms)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_millis(self.broker.delete_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweeper.interval_secs)
    }
}
