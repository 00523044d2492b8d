//! Configuration module
//!
//! Handles loading and saving client configuration from TOML files and the
//! environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::connection::transport::DEFAULT_BASE_URL;

/// Well-known daemon socket location
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Daemon socket path; may be a symbolic link
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Logical base used to build request targets
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            base_url: default_base_url(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl DockerConfig {
    /// Configuration for a specific socket path
    pub fn with_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: path.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: DockerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Defaults, with the socket taken from `DOCKER_HOST` when it names a unix socket
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(path) = std::env::var("DOCKER_HOST")
            .ok()
            .as_deref()
            .and_then(socket_from_host)
        {
            config.socket_path = path;
        }
        config
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}

/// Socket path of a `unix://` daemon host; other schemes yield `None`
pub fn socket_from_host(host: &str) -> Option<PathBuf> {
    let path = host.strip_prefix("unix://")?;
    if path.is_empty() {
        return None;
    }
    Some(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DockerConfig::default();
        assert_eq!(config.socket_path, PathBuf::from("/var/run/docker.sock"));
        assert_eq!(config.base_url, "http://localhost");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml_content = r#"
            socket_path = "/run/user/1000/docker.sock"

            [logging]
            format = "json"
        "#;

        let config: DockerConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/run/user/1000/docker.sock"));
        assert_eq!(config.base_url, "http://localhost");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = DockerConfig::with_socket("/tmp/podman.sock");

        config.save(&path).unwrap();
        assert_eq!(DockerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_socket_from_host() {
        assert_eq!(
            socket_from_host("unix:///var/run/docker.sock"),
            Some(PathBuf::from("/var/run/docker.sock"))
        );
        assert_eq!(socket_from_host("tcp://127.0.0.1:2375"), None);
        assert_eq!(socket_from_host("unix://"), None);
    }
}
