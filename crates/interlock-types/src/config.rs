//! Runner configuration types.
//!
//! `RunnerConfig` represents `interlock.toml`: default timeouts, suite
//! concurrency, and connection settings for the bundled drivers. Every field
//! has a default so an empty file is valid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level runner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Applied to workflows without `timeout_secs`.
    #[serde(default = "default_workflow_timeout_secs")]
    pub default_workflow_timeout_secs: u64,

    /// Applied per attempt to steps without `timeout_secs`.
    #[serde(default = "default_step_timeout_secs")]
    pub default_step_timeout_secs: u64,

    /// Upper bound on concurrently executing runs in a suite.
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    /// Broadcast channel capacity for run events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

fn default_workflow_timeout_secs() -> u64 {
    600
}

fn default_step_timeout_secs() -> u64 {
    60
}

fn default_max_concurrent_runs() -> usize {
    4
}

fn default_event_capacity() -> usize {
    256
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_workflow_timeout_secs: default_workflow_timeout_secs(),
            default_step_timeout_secs: default_step_timeout_secs(),
            max_concurrent_runs: default_max_concurrent_runs(),
            event_capacity: default_event_capacity(),
            api: ApiConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

/// Settings for the HTTP API driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Joined with relative endpoints (None = endpoints must be absolute).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Sent with every request; per-action headers win on conflict.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("interlock/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            default_headers: BTreeMap::new(),
        }
    }
}

/// Settings for the SQLite database driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection name -> SQLite URL (e.g. `sqlite://app.db`).
    #[serde(default)]
    pub connections: BTreeMap<String, String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connections: BTreeMap::new(),
            max_connections: default_max_connections(),
        }
    }
}
