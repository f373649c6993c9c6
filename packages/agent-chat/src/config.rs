//! Application configuration
//!
//! Layered as: built-in defaults, then `config.toml`, then environment, then
//! command-line flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_chat_core::{ReconcilePolicy, SessionConfig};
use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_BASE_URL: &str = "AGENT_CHAT_BASE_URL";
pub const ENV_TENANT: &str = "AGENT_CHAT_TENANT";
pub const ENV_TOKEN: &str = "AGENT_CHAT_TOKEN";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub tenant_id: Option<String>,
    pub api_token: Option<String>,
    /// Agent to open on startup
    pub agent_id: Option<String>,
    pub request_timeout_secs: u64,
    pub reconcile: ReconcilePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            tenant_id: None,
            api_token: None,
            agent_id: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            reconcile: ReconcilePolicy::default(),
        }
    }
}

/// Values supplied on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub tenant_id: Option<String>,
    pub agent_id: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

/// `<config_dir>/agent-chat/config.toml`
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "agent-chat")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl AppConfig {
    /// Read a config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load every layer.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match path.map(Path::to_path_buf).or_else(default_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok());
        config.apply_overrides(overrides);
        Ok(config)
    }

    /// Apply environment values. Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_blank(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(tenant) = non_blank(ENV_TENANT) {
            self.tenant_id = Some(tenant);
        }
        if let Some(token) = non_blank(ENV_TOKEN) {
            self.api_token = Some(token);
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.base_url {
            self.base_url = url;
        }
        if let Some(tenant) = overrides.tenant_id {
            self.tenant_id = Some(tenant);
        }
        if let Some(agent) = overrides.agent_id {
            self.agent_id = Some(agent);
        }
        if let Some(secs) = overrides.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_request_timeout(self.request_timeout())
            .with_reconcile(self.reconcile)
    }
}
