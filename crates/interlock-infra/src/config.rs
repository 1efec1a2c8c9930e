//! Runner configuration loader.
//!
//! Reads `interlock.toml` into [`RunnerConfig`]. [`load_config`] falls back to
//! defaults when the file is missing or malformed; [`load_config_strict`]
//! treats a malformed file as an error. Both apply environment overrides last.

use std::path::{Path, PathBuf};

use interlock_types::config::RunnerConfig;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "interlock.toml";

/// Overrides `[api].base_url`.
pub const ENV_API_BASE_URL: &str = "INTERLOCK_API_BASE_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load configuration from `path`.
///
/// - Missing file: defaults.
/// - Unreadable or malformed file: logs a warning and returns defaults.
pub async fn load_config(path: &Path) -> RunnerConfig {
    let config = match read_config(path).await {
        Ok(Some(config)) => config,
        Ok(None) => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            RunnerConfig::default()
        }
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            RunnerConfig::default()
        }
    };
    apply_env_overrides(config)
}

/// Load configuration from `path`, failing on unreadable or malformed files.
///
/// A missing file still yields defaults.
pub async fn load_config_strict(path: &Path) -> Result<RunnerConfig, ConfigError> {
    let config = read_config(path).await?.unwrap_or_default();
    Ok(apply_env_overrides(config))
}

async fn read_config(path: &Path) -> Result<Option<RunnerConfig>, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    parse_config(&content)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Parse TOML content without touching the environment.
pub fn parse_config(content: &str) -> Result<RunnerConfig, toml::de::Error> {
    toml::from_str(content)
}

fn apply_env_overrides(mut config: RunnerConfig) -> RunnerConfig {
    if let Ok(base_url) = std::env::var(ENV_API_BASE_URL) {
        if !base_url.trim().is_empty() {
            tracing::debug!(base_url = %base_url, "API base URL overridden from environment");
            config.api.base_url = Some(base_url);
        }
    }
    config
}
