use anyhow::{Context, Result};
use docksock::{DockerConfig, DockerSocket};

pub mod build;
pub mod info;
pub mod login;
pub mod logs;
pub mod ps;
pub mod pull;
pub mod save;
pub mod stats;
pub mod version;

/// Connect to the daemon and negotiate the API version
pub async fn connect(config: &DockerConfig) -> Result<DockerSocket> {
    DockerSocket::connect(config).await.with_context(|| {
        format!(
            "Failed to connect to daemon at {}",
            config.socket_path.display()
        )
    })
}
