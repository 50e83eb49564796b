//! Client configuration with sensible defaults.
//!
//! [`GateConfig`] captures where the API lives, how long to wait for it, and
//! where exported tracking records go. Environment overrides are applied by
//! [`from_env`](GateConfig::from_env); the CLI layers its flags on top.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::GateError;

pub const ENV_BASE_URL: &str = "QUOTA_GATE_URL";
pub const ENV_TIMEOUT_SECS: &str = "QUOTA_GATE_TIMEOUT_SECS";
pub const ENV_EXPORT_DIR: &str = "QUOTA_GATE_EXPORT_DIR";

/// Configuration for talking to the quota-bearing API.
#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    /// API root. Default: `"http://127.0.0.1:5000"`.
    pub base_url: String,
    /// Per-request timeout. Default: 120 seconds.
    pub timeout: Duration,
    /// `User-Agent` header. Default: `"quota-gate/<version>"`.
    pub user_agent: String,
    /// Directory for exported tracking records. Default: `"."`.
    pub export_dir: PathBuf,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout: Duration::from_secs(120),
            user_agent: concat!("quota-gate/", env!("CARGO_PKG_VERSION")).to_string(),
            export_dir: PathBuf::from("."),
        }
    }
}

impl GateConfig {
    /// Defaults overridden by `QUOTA_GATE_URL`, `QUOTA_GATE_TIMEOUT_SECS`
    /// and `QUOTA_GATE_EXPORT_DIR` when set.
    pub fn from_env() -> Result<Self, GateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GateError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                GateError::validation(
                    "timeout",
                    format!("{ENV_TIMEOUT_SECS}='{raw}' is not a whole number of seconds"),
                )
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = lookup(ENV_EXPORT_DIR).filter(|v| !v.trim().is_empty()) {
            config.export_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    /// Build the HTTP client used by [`HttpApi`](crate::api::HttpApi).
    pub fn build_client(&self) -> Result<reqwest::Client, GateError> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .build()
            .map_err(|e| GateError::Transport(format!("failed to build HTTP client: {e}")))
    }
}
