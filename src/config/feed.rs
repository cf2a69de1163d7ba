// src/config/feed.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feed::providers::github::DEFAULT_EVENTS_URL;

pub const ENV_CONFIG_PATH: &str = "FEED_CONFIG_PATH";

// Upper bounds; anything above falls back to the default.
pub const MAX_STALE_AFTER_SECS: i64 = 30 * 24 * 3600;
pub const MAX_POLL_INTERVAL_SECS: u64 = 24 * 3600;
pub const MAX_FETCH_TIMEOUT_SECS: u64 = 600;

fn default_url() -> String {
    DEFAULT_EVENTS_URL.to_string()
}
fn default_user_agent() -> String {
    format!("activity-feed/{}", env!("CARGO_PKG_VERSION"))
}
fn default_stale_after_secs() -> i64 {
    60
}
fn default_poll_interval_secs() -> u64 {
    30
}
fn default_fetch_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Cached snapshot counts as stale once this many seconds passed since the last success.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: i64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            user_agent: default_user_agent(),
            stale_after_secs: default_stale_after_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl FeedConfig {
    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feed config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: FeedConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content).context("parsing feed config json")?,
            "toml" => toml::from_str(&content).context("parsing feed config toml")?,
            other => return Err(anyhow!("unsupported feed config format: {other:?}")),
        };
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $FEED_CONFIG_PATH
    /// 2) config/feed.toml
    /// 3) config/feed.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let toml_p = PathBuf::from("config/feed.toml");
            let json_p = PathBuf::from("config/feed.json");
            if toml_p.exists() {
                Self::load_from(&toml_p)?
            } else if json_p.exists() {
                Self::load_from(&json_p)?
            } else {
                Self::default()
            }
        };
        Ok(base.with_env_overrides())
    }

    /// FEED_URL, FEED_STALE_AFTER_SECS, FEED_POLL_INTERVAL_SECS, FEED_FETCH_TIMEOUT_SECS.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("FEED_URL") {
            if !url.trim().is_empty() {
                self.url = url.trim().to_string();
            }
        }
        if let Some(v) = env_parse("FEED_STALE_AFTER_SECS") {
            self.stale_after_secs = v;
        }
        if let Some(v) = env_parse("FEED_POLL_INTERVAL_SECS") {
            self.poll_interval_secs = v;
        }
        if let Some(v) = env_parse("FEED_FETCH_TIMEOUT_SECS") {
            self.fetch_timeout_secs = v;
        }
        self.sanitized()
    }

    fn sanitized(mut self) -> Self {
        if !(1..=MAX_STALE_AFTER_SECS).contains(&self.stale_after_secs) {
            self.stale_after_secs = default_stale_after_secs();
        }
        if !(1..=MAX_POLL_INTERVAL_SECS).contains(&self.poll_interval_secs) {
            self.poll_interval_secs = default_poll_interval_secs();
        }
        if !(1..=MAX_FETCH_TIMEOUT_SECS).contains(&self.fetch_timeout_secs) {
            self.fetch_timeout_secs = default_fetch_timeout_secs();
        }
        if self.user_agent.trim().is_empty() {
            self.user_agent = default_user_agent();
        }
        self
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.stale_after_secs)
            .unwrap_or_else(|| chrono::Duration::seconds(default_stale_after_secs()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable config override");
            None
        }
    }
}
