// Configuration structs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Settings for the API client (`[client]` table in config.toml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL, e.g. "https://school.example.com/api"
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// Token refresh endpoint, relative to `base_url`
    pub refresh_path: String,

    /// Login endpoint, relative to `base_url`
    pub login_path: String,

    /// Route the host navigates to when the session cannot be recovered
    pub login_route: String,

    /// Credentials file (default: ~/.rollcall/credentials.json)
    pub credentials_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            refresh_path: "/auth/refresh/".to_string(),
            login_path: "/auth/login/".to_string(),
            login_route: "/login".to_string(),
            credentials_path: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            bail!("base_url is empty");
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!("base_url must start with http:// or https:// (got {})", base_url);
        }
        if self.timeout_seconds == 0 {
            bail!("timeout_seconds must be greater than zero");
        }
        Ok(())
    }
}
