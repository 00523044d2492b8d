//! Version Negotiation
//!
//! The bootstrap `/version` call and the path rewriting it enables.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::connection::request::ApiRequest;
use crate::connection::transport::Transport;
use crate::error::{ApiError, Result};

/// API version reported by the daemon, e.g. `1.43`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiVersion(String);

impl ApiVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rewrite a logical path to `/v{version}/{path}`
    pub fn versioned_path(&self, path: &str) -> String {
        format!("/v{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload of `GET /version`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionInfo {
    pub api_version: ApiVersion,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, rename = "MinAPIVersion")]
    pub min_api_version: Option<String>,
    #[serde(default)]
    pub git_commit: Option<String>,
    #[serde(default)]
    pub go_version: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub kernel_version: Option<String>,
    #[serde(default)]
    pub build_time: Option<String>,
    #[serde(default)]
    pub experimental: Option<bool>,
}

/// Ask the daemon for its version metadata over an unversioned path
pub async fn negotiate(transport: &Transport) -> Result<VersionInfo> {
    let response = transport.send(ApiRequest::get("/version")).await?;
    let info: VersionInfo = response.decode().await?.into_json()?;
    if info.api_version.as_str().is_empty() {
        return Err(ApiError::protocol(
            "malformed version response",
            "empty ApiVersion field",
        ));
    }
    debug!(api_version = %info.api_version, "Negotiated API version");
    Ok(info)
}
