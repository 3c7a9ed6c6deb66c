//! Persisted user settings.
//!
//! Stored as JSON at `~/.local/share/wish-danmaku/config.json`. Loaded once
//! on startup; command-line flags override individual fields for one run.

use crate::api::DEFAULT_SERVER_URL;
use crate::danmaku::PagePreset;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file path.
pub fn default_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wish-danmaku")
        .join("config.json")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub page: PagePreset,
    /// Seconds between background refreshes of the wish list.
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: f64,
    /// Milliseconds between scheduler ticks in live sessions.
    #[serde(default = "default_frame_ms")]
    pub frame_interval_ms: u64,
    /// Fixed RNG seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Path the config was loaded from (not serialized).
    #[serde(skip)]
    path: PathBuf,
}

fn default_server_url() -> String { DEFAULT_SERVER_URL.into() }
fn default_poll_secs() -> f64 { 30.0 }
fn default_frame_ms() -> u64 { 50 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            page: PagePreset::default(),
            poll_interval_secs: default_poll_secs(),
            frame_interval_ms: default_frame_ms(),
            seed: None,
            path: default_path(),
        }
    }
}

impl AppConfig {
    /// Load from the default location, falling back to defaults on any error.
    pub fn load() -> Self {
        Self::load_from(&default_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        config.path = path.to_path_buf();
        config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist current settings.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Set one field from its JSON name and a textual value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let bad = |what: &str| Error::InvalidConfig(format!("{key}: expected {what}, got {value:?}"));
        match key {
            "server_url" => self.server_url = value.trim_end_matches('/').to_string(),
            "page" => self.page = value.parse()?,
            "poll_interval_secs" => {
                let secs: f64 = value.parse().map_err(|_| bad("seconds"))?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(bad("a positive number of seconds"));
                }
                self.poll_interval_secs = secs;
            }
            "frame_interval_ms" => {
                let ms: u64 = value.parse().map_err(|_| bad("milliseconds"))?;
                if ms == 0 {
                    return Err(bad("a positive number of milliseconds"));
                }
                self.frame_interval_ms = ms;
            }
            "seed" => {
                self.seed = match value {
                    "" | "none" => None,
                    v => Some(v.parse().map_err(|_| bad("an integer or \"none\""))?),
                }
            }
            other => return Err(Error::InvalidConfig(format!("unknown setting: {other}"))),
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs.max(1.0))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}
