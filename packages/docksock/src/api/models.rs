//! Daemon payload types
//!
//! The subset of response shapes the endpoint wrappers decode. Anything not
//! modelled here is returned as a raw JSON value.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Filter map sent as a JSON query value, e.g. `{"status": ["running"]}`
pub type Filters = BTreeMap<String, Vec<String>>;

/// The daemon sends `null` for empty lists and maps
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Container state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerState::Created => write!(f, "created"),
            ContainerState::Running => write!(f, "running"),
            ContainerState::Paused => write!(f, "paused"),
            ContainerState::Restarting => write!(f, "restarting"),
            ContainerState::Removing => write!(f, "removing"),
            ContainerState::Exited => write!(f, "exited"),
            ContainerState::Dead => write!(f, "dead"),
            ContainerState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Published port of a listed container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    #[serde(rename = "IP", default)]
    pub ip: Option<String>,
    #[serde(rename = "PrivatePort")]
    pub private_port: u16,
    #[serde(rename = "PublicPort", default)]
    pub public_port: Option<u16>,
    #[serde(rename = "Type")]
    pub protocol: String,
}

/// Entry of `GET /containers/json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub names: Vec<String>,
    pub image: String,
    #[serde(rename = "ImageID", default)]
    pub image_id: String,
    #[serde(default)]
    pub command: String,
    pub created: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ports: Vec<Port>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    pub state: ContainerState,
    #[serde(default)]
    pub status: String,
}

impl ContainerSummary {
    /// First name without the leading slash
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map(|name| name.trim_start_matches('/'))
            .unwrap_or(&self.id)
    }
}

/// Reply of `POST /containers/create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerCreated {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub warnings: Vec<String>,
}

/// Reply of `GET /containers/{id}/top`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerTop {
    #[serde(default, deserialize_with = "null_as_default")]
    pub titles: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub processes: Vec<Vec<String>>,
}

/// Reply of `POST /containers/prune`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerPrune {
    #[serde(default, deserialize_with = "null_as_default")]
    pub containers_deleted: Vec<String>,
    #[serde(default)]
    pub space_reclaimed: u64,
}

/// Entry of `GET /images/json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageSummary {
    pub id: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repo_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repo_digests: Vec<String>,
    pub created: i64,
    pub size: i64,
    #[serde(default)]
    pub shared_size: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub containers: i64,
}

/// Entry of `DELETE /images/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageDeleted {
    #[serde(default)]
    pub untagged: Option<String>,
    #[serde(default)]
    pub deleted: Option<String>,
}

/// OCI platform selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    pub fn new(os: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: None,
            variant: None,
        }
    }

    pub fn architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = Some(architecture.into());
        self
    }

    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_summary_with_nulls() {
        let payload = r#"{
            "Id": "8dfafdbc3a40",
            "Names": ["/boring_feynman"],
            "Image": "ubuntu:latest",
            "ImageID": "sha256:d74508fb",
            "Command": "echo 1",
            "Created": 1367854155,
            "Ports": null,
            "Labels": null,
            "State": "running",
            "Status": "Up 2 minutes"
        }"#;

        let summary: ContainerSummary = serde_json::from_str(payload).unwrap();
        assert_eq!(summary.display_name(), "boring_feynman");
        assert_eq!(summary.state, ContainerState::Running);
        assert!(summary.ports.is_empty());
        assert!(summary.labels.is_empty());
    }

    #[test]
    fn test_unknown_state() {
        let state: ContainerState = serde_json::from_str(r#""hibernating""#).unwrap();
        assert_eq!(state, ContainerState::Unknown);
        assert_eq!(ContainerState::Exited.to_string(), "exited");
    }

    #[test]
    fn test_platform_serialization() {
        let platform = Platform::new("linux").architecture("arm").variant("v8");
        assert_eq!(
            serde_json::to_string(&platform).unwrap(),
            r#"{"os":"linux","architecture":"arm","variant":"v8"}"#
        );
        assert_eq!(
            serde_json::to_string(&Platform::new("linux")).unwrap(),
            r#"{"os":"linux"}"#
        );
    }
}
