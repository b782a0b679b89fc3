//! Configuration data model.
//!
//! Struct/enum definitions plus default values. Loader and source-resolution
//! logic lives in `config::mod`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults::{
    DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT_SECS, DEFAULT_LOG_LEVEL,
    DEFAULT_REFRESH_WAIT_TIMEOUT_SECS,
};
use crate::api::DEFAULT_REFRESH_PATH;
use crate::auth::{CredentialKeys, DEFAULT_ACCESS_KEY, DEFAULT_REFRESH_KEY};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Remote API connection settings (`[api]`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub refresh_path: String,
    pub refresh_wait_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            refresh_wait_timeout_secs: DEFAULT_REFRESH_WAIT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn refresh_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_wait_timeout_secs.max(1))
    }
}

/// Where the credential pair is persisted.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

/// Credential storage settings (`[storage]`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Credential file path; defaults to `~/.config/storefront/credentials.json`.
    pub path: Option<String>,
    pub access_key: String,
    pub refresh_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: None,
            access_key: DEFAULT_ACCESS_KEY.to_string(),
            refresh_key: DEFAULT_REFRESH_KEY.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn keys(&self) -> CredentialKeys {
        CredentialKeys {
            access: self.access_key.clone(),
            refresh: self.refresh_key.clone(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings (`[logging]`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Result of writing the default global config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalConfigInitResult {
    Created { path: std::path::PathBuf },
    AlreadyExists { path: std::path::PathBuf },
}
