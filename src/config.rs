//! Connection configuration
//!
//! Defaults, overridden by an optional JSON file in the platform config
//! directory, overridden by environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Bucket holding cabin images
const DEFAULT_ASSET_BUCKET: &str = "cabin-images";

/// HTTP request timeout
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Cached entries are dropped after this long even without invalidation
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Longest natural cache expiry accepted (one week)
const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

pub const ENV_API_URL: &str = "CABINSYNC_API_URL";
pub const ENV_API_KEY: &str = "CABINSYNC_API_KEY";
pub const ENV_ASSET_BUCKET: &str = "CABINSYNC_ASSET_BUCKET";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project base URL shared by the table and storage services
    pub api_url: String,
    pub api_key: String,
    pub asset_bucket: String,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: String::new(),
            asset_bucket: DEFAULT_ASSET_BUCKET.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl Config {
    /// `<config dir>/cabinsync/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cabinsync").join("config.json"))
    }

    /// Load from the default file location and the process environment
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        Self::load_from(path.as_deref(), |key| std::env::var(key).ok())
    }

    /// Load from `path` (skipped when absent) and an environment lookup
    pub fn load_from<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                let config: Config = serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?;
                debug!(path = %path.display(), "Loaded config file");
                config
            }
            _ => Config::default(),
        };

        if let Some(url) = env(ENV_API_URL) {
            config.api_url = url;
        }
        if let Some(key) = env(ENV_API_KEY) {
            config.api_key = key;
        }
        if let Some(bucket) = env(ENV_ASSET_BUCKET) {
            config.asset_bucket = bucket;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(anyhow!("API URL not configured (set {})", ENV_API_URL));
        }
        if self.api_key.trim().is_empty() {
            return Err(anyhow!("API key not configured (set {})", ENV_API_KEY));
        }
        if self.asset_bucket.trim().is_empty() {
            return Err(anyhow!("Asset bucket must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("Request timeout must be at least 1 second"));
        }
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(anyhow!(
                "Cache TTL of {}s exceeds the maximum of {}s",
                self.cache_ttl_secs,
                MAX_CACHE_TTL_SECS
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
