// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::controller::ControllerConfig;

pub const ENV_CONFIG_PATH: &str = "DASHBOARD_CONFIG_PATH";
pub const ENV_API_BASE_URL: &str = "DASHBOARD_API_BASE_URL";
pub const ENV_BIND_ADDR: &str = "DASHBOARD_BIND_ADDR";
pub const ENV_REFRESH_SECS: &str = "DASHBOARD_REFRESH_SECS";

fn default_api_base_url() -> String {
    "http://localhost:5000/api".to_string()
}
fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_recent_insights_limit() -> usize {
    6
}
fn default_push_buffer() -> usize {
    256
}
fn default_notice_limit() -> usize {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Insight polling period for the focused competitor; 0 disables polling.
    #[serde(default)]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_recent_insights_limit")]
    pub recent_insights_limit: usize,
    #[serde(default = "default_push_buffer")]
    pub push_buffer: usize,
    #[serde(default = "default_notice_limit")]
    pub notice_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            bind_addr: default_bind_addr(),
            request_timeout_secs: default_request_timeout_secs(),
            refresh_interval_secs: 0,
            recent_insights_limit: default_recent_insights_limit(),
            push_buffer: default_push_buffer(),
            notice_limit: default_notice_limit(),
        }
    }
}

impl DashboardConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading dashboard config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, &ext)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $DASHBOARD_CONFIG_PATH
    /// 2) config/dashboard.toml
    /// 3) config/dashboard.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let toml_p = PathBuf::from("config/dashboard.toml");
            let json_p = PathBuf::from("config/dashboard.json");
            if toml_p.exists() {
                Self::load_from(&toml_p)?
            } else if json_p.exists() {
                Self::load_from(&json_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var(ENV_API_BASE_URL) {
            if !v.trim().is_empty() {
                self.api_base_url = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var(ENV_BIND_ADDR) {
            if !v.trim().is_empty() {
                self.bind_addr = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var(ENV_REFRESH_SECS) {
            self.refresh_interval_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_REFRESH_SECS} must be an integer, got {v:?}"))?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            recent_insights_limit: self.recent_insights_limit,
            refresh_interval: (self.refresh_interval_secs > 0)
                .then(|| Duration::from_secs(self.refresh_interval_secs)),
            notice_limit: self.notice_limit,
        }
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<DashboardConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing dashboard config as JSON");
    }
    match toml::from_str(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s).map_err(|_| {
            anyhow!("unsupported dashboard config format: {toml_err}")
        }),
    }
}
