//! CLI Configuration
//!
//! Resolves the client configuration from ~/.docksock/config.toml, the
//! environment and command-line overrides.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use docksock::DockerConfig;

/// Get the default config file path (~/.docksock/config.toml)
pub fn path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".docksock").join("config.toml"))
}

/// Load config from an explicit file, the default file, or the environment
pub fn load(explicit: Option<&Path>, socket: Option<PathBuf>) -> Result<DockerConfig> {
    let mut config = match explicit {
        Some(file) => DockerConfig::load(file)?,
        None => {
            let default = path()?;
            if default.exists() {
                DockerConfig::load(&default)?
            } else {
                DockerConfig::from_env()
            }
        }
    };

    if let Some(socket) = socket {
        config.socket_path = socket;
    }

    Ok(config)
}
