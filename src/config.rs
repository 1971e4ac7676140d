//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_REAUTH_PATH: &str = "/auth/google?reauth=true";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL in {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Failed to determine data directory")]
    NoDataDir,
}

/// Settings for the REST backend and local storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend origin, e.g. `https://app.example.com`
    pub api_base_url: String,

    /// Where the browser is sent to grant Gmail permissions again
    pub reauth_url: String,

    /// Directory holding `smartFilters.json`
    pub storage_dir: PathBuf,

    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            reauth_url: format!("{}{}", DEFAULT_API_BASE_URL, DEFAULT_REAUTH_PATH),
            storage_dir: default_storage_dir().unwrap_or_else(|_| PathBuf::from(".smart-filters")),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Build from the environment (and a `.env` file when present).
    ///
    /// Reads `SMART_FILTERS_API_URL`, `SMART_FILTERS_REAUTH_URL`,
    /// `SMART_FILTERS_DATA_DIR` and `SMART_FILTERS_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(api_url) = std::env::var("SMART_FILTERS_API_URL") {
            config.reauth_url = format!("{}{}", api_url.trim_end_matches('/'), DEFAULT_REAUTH_PATH);
            config.api_base_url = api_url;
        }
        if let Ok(reauth_url) = std::env::var("SMART_FILTERS_REAUTH_URL") {
            config.reauth_url = reauth_url;
        }
        if let Ok(dir) = std::env::var("SMART_FILTERS_DATA_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Ok(timeout) = std::env::var("SMART_FILTERS_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                name: "SMART_FILTERS_TIMEOUT_SECS",
                value: timeout.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_url()?;
        url::Url::parse(&self.reauth_url).map_err(|source| ConfigError::InvalidUrl {
            name: "reauth_url",
            source,
        })?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "request_timeout_secs",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn api_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.api_base_url).map_err(|source| ConfigError::InvalidUrl {
            name: "api_base_url",
            source,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Per-user data directory for the filter store
pub fn default_storage_dir() -> Result<PathBuf, ConfigError> {
    directories::ProjectDirs::from("com", "smartfilters", "smart-filters")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(ConfigError::NoDataDir)
}
