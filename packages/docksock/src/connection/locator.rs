//! Socket Locator
//!
//! Resolves the configured daemon endpoint to the socket file it points at.

use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum number of symbolic links followed before giving up
pub const MAX_SYMLINK_HOPS: usize = 32;

/// Reasons a path does not lead to a daemon socket
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("cannot inspect {}: {source}", .path.display())]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is a {kind}, not a socket", .path.display())]
    NotASocket { path: PathBuf, kind: &'static str },

    #[error("more than {hops} symbolic links while resolving {}", .path.display())]
    TooManyLinks { path: PathBuf, hops: usize },
}

/// Follows a (possibly symlinked) endpoint to the daemon socket
#[derive(Debug, Clone)]
pub struct SocketLocator {
    path: PathBuf,
}

impl SocketLocator {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Current endpoint; the socket itself after a successful `resolve`
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }

    /// Check whether the endpoint leads to a socket.
    ///
    /// On success the locator now points at the final link target. Failures
    /// are logged and reported as `false`.
    pub async fn resolve(&mut self) -> bool {
        match self.locate().await {
            Ok(socket) => {
                if socket != self.path {
                    debug!(from = %self.path.display(), to = %socket.display(), "Resolved socket link");
                }
                self.path = socket;
                true
            }
            Err(e) => {
                warn!(error = %e, "Daemon socket not ready");
                false
            }
        }
    }

    /// Walk the link chain without touching the locator
    pub async fn locate(&self) -> Result<PathBuf, LocateError> {
        let mut current = self.path.clone();

        for _ in 0..=MAX_SYMLINK_HOPS {
            let metadata = tokio::fs::symlink_metadata(&current)
                .await
                .map_err(|source| LocateError::Inaccessible {
                    path: current.clone(),
                    source,
                })?;
            let file_type = metadata.file_type();

            if file_type.is_symlink() {
                let target = tokio::fs::read_link(&current)
                    .await
                    .map_err(|source| LocateError::Inaccessible {
                        path: current.clone(),
                        source,
                    })?;
                current = match current.parent() {
                    Some(parent) if target.is_relative() => parent.join(target),
                    _ => target,
                };
                continue;
            }

            if file_type.is_socket() {
                return Ok(current);
            }

            let kind = if file_type.is_dir() {
                "directory"
            } else if file_type.is_file() {
                "regular file"
            } else {
                "special file"
            };
            return Err(LocateError::NotASocket { path: current, kind });
        }

        Err(LocateError::TooManyLinks {
            path: self.path.clone(),
            hops: MAX_SYMLINK_HOPS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use std::os::unix::net::UnixListener;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_resolves_socket_directly() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("docker.sock");
        let _listener = UnixListener::bind(&socket).unwrap();

        let mut locator = SocketLocator::new(&socket);
        assert!(locator.resolve().await);
        assert_eq!(locator.path(), socket.as_path());
    }

    #[tokio::test]
    async fn test_follows_link_chain() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("real.sock");
        let _listener = UnixListener::bind(&socket).unwrap();
        let second = dir.path().join("second.sock");
        let first = dir.path().join("first.sock");
        symlink(&socket, &second).unwrap();
        symlink(&second, &first).unwrap();

        let mut locator = SocketLocator::new(&first);
        assert!(locator.resolve().await);
        assert_eq!(locator.path(), socket.as_path());
    }

    #[tokio::test]
    async fn test_relative_link_target() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("real.sock");
        let _listener = UnixListener::bind(&socket).unwrap();
        let link = dir.path().join("link.sock");
        symlink("real.sock", &link).unwrap();

        let mut locator = SocketLocator::new(&link);
        assert!(locator.resolve().await);
        assert_eq!(locator.path(), socket.as_path());
    }

    #[tokio::test]
    async fn test_missing_path_is_not_ready() {
        let dir = TempDir::new().unwrap();
        let mut locator = SocketLocator::new(dir.path().join("absent.sock"));

        assert!(!locator.resolve().await);
        assert!(matches!(
            locator.locate().await,
            Err(LocateError::Inaccessible { .. })
        ));
    }

    #[tokio::test]
    async fn test_regular_file_is_not_ready() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("docker.sock");
        std::fs::write(&file, b"not a socket").unwrap();

        let mut locator = SocketLocator::new(&file);
        assert!(!locator.resolve().await);
        assert!(matches!(
            locator.locate().await,
            Err(LocateError::NotASocket { kind: "regular file", .. })
        ));
    }

    #[tokio::test]
    async fn test_link_cycle_is_bounded() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.sock");
        let b = dir.path().join("b.sock");
        symlink(&b, &a).unwrap();
        symlink(&a, &b).unwrap();

        let locator = SocketLocator::new(&a);
        assert!(matches!(
            locator.locate().await,
            Err(LocateError::TooManyLinks { hops: MAX_SYMLINK_HOPS, .. })
        ));
    }
}
