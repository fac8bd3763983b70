use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Engine tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between status polls in the synchronous webhook wait.
    #[serde(default = "default_wait_poll_interval_ms")]
    pub wait_poll_interval_ms: u64,
    /// Hard cap on webhook-wait polls before reporting a timeout.
    #[serde(default = "default_wait_max_polls")]
    pub wait_max_polls: u32,
    /// Interval between scheduled-resume poller scans.
    #[serde(default = "default_poller_interval_secs")]
    pub poller_interval_secs: u64,
}

fn default_wait_poll_interval_ms() -> u64 {
    500
}

fn default_wait_max_polls() -> u32 {
    60
}

fn default_poller_interval_secs() -> u64 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait_poll_interval_ms: default_wait_poll_interval_ms(),
            wait_max_polls: default_wait_max_polls(),
            poller_interval_secs: default_poller_interval_secs(),
        }
    }
}

/// Top-level Loomflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("loomflow.db")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| FlowError::Config(e.to_string()))
    }
}
