//! Client configuration with layered TOML discovery.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/hexdriver/config.toml` (XDG user config)
//! 2. `./hexdriver.toml` (project-local)
//!
//! Every field is optional in the files; anything unset falls back to the
//! built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "hexdriver.toml";

/// Default config filename within the XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "hexdriver";

/// Environment variable to override the config directory.
///
/// Useful for testing and for pointing several checkouts at one config.
const CONFIG_DIR_ENV: &str = "HEXDRIVER_CONFIG_DIR";

/// Result type alias for config operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Connection and identity settings for a client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Host of the MCP endpoint.
    pub host: String,
    /// Port of the MCP endpoint.
    pub port: u16,
    /// Socket timeout in seconds, applied to connect and every read/write.
    pub timeout_secs: u64,
    /// Client name declared during the handshake.
    pub client_name: String,
    /// Client version declared during the handshake.
    pub client_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            client_name: "hexdriver".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a config with the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the endpoint port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the socket timeout, in whole seconds.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the client identity declared during the handshake.
    pub fn with_client_info(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.client_name = name.into();
        self.client_version = version.into();
        self
    }

    /// Socket timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One config file's contents; unset fields leave the layer below intact.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    host: Option<String>,
    port: Option<u16>,
    timeout_secs: Option<u64>,
    client_name: Option<String>,
    client_version: Option<String>,
}

impl ConfigLayer {
    fn apply(self, config: &mut ClientConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        if let Some(client_name) = self.client_name {
            config.client_name = client_name;
        }
        if let Some(client_version) = self.client_version {
            config.client_version = client_version;
        }
    }
}

/// Get the user config file path.
///
/// Checks `HEXDRIVER_CONFIG_DIR` first, then the platform config directory
/// (`~/.config/hexdriver/config.toml` on Linux).
pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir).join(USER_CONFIG_FILE));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME).join(USER_CONFIG_FILE))
}

/// Load configuration by discovering and merging all config layers.
///
/// Missing files are skipped; a file that exists but fails to load is
/// logged as a warning and skipped, so a broken config never blocks a
/// connection with defaults.
pub fn load_config(project_dir: Option<&Path>) -> ClientConfig {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `HEXDRIVER_CONFIG_DIR` and the platform
/// default. Pass `None` to use the default resolution.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> ClientConfig {
    let mut config = ClientConfig::default();

    let user_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_path {
        load_layer(&mut config, &path);
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    load_layer(&mut config, &project_path);

    config
}

/// Load config from a specific file path (no discovery, no fallback).
pub fn load_config_file(path: &Path) -> ConfigResult<ClientConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let layer: ConfigLayer = toml::from_str(&contents)?;

    let mut config = ClientConfig::default();
    layer.apply(&mut config);
    Ok(config)
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(config: &mut ClientConfig, path: &Path) {
    if !path.is_file() {
        return;
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read config file");
            return;
        }
    };

    match toml::from_str::<ConfigLayer>(&contents) {
        Ok(layer) => {
            layer.apply(config);
            tracing::debug!(path = %path.display(), "loaded config layer");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse config file");
        }
    }
}
