//! Container endpoints
//!
//! Lifecycle, inspection, logs and stats of containers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::api::models::{
    ContainerCreated, ContainerPrune, ContainerSummary, ContainerTop, Filters,
};
use crate::client::socket::DockerSocket;
use crate::connection::request::{ApiRequest, Query};
use crate::connection::stream::{demux_logs, LiveStream, LogFrame};
use crate::error::{ApiError, Result};

/// Options for `GET /containers/json`
#[derive(Debug, Clone, Default)]
pub struct ListContainersOptions {
    /// Include stopped containers
    pub all: bool,
    pub limit: Option<u32>,
    /// Report container sizes
    pub size: bool,
    pub filters: Filters,
}

/// How many trailing log lines to return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tail {
    #[default]
    All,
    Lines(usize),
}

impl fmt::Display for Tail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tail::All => write!(f, "all"),
            Tail::Lines(n) => write!(f, "{}", n),
        }
    }
}

/// Container logs options
#[derive(Debug, Clone)]
pub struct LogsOptions {
    pub stdout: bool,
    pub stderr: bool,
    pub timestamps: bool,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub tail: Tail,
}

impl Default for LogsOptions {
    fn default() -> Self {
        Self {
            stdout: true,
            stderr: true,
            timestamps: false,
            since: None,
            until: None,
            tail: Tail::All,
        }
    }
}

impl LogsOptions {
    fn query(&self, follow: bool) -> Query {
        Query::new()
            .flag("follow", follow)
            .flag("stdout", self.stdout)
            .flag("stderr", self.stderr)
            .number("since", self.since.map_or(0, |t| t.timestamp()))
            .number("until", self.until.map_or(0, |t| t.timestamp()))
            .flag("timestamps", self.timestamps)
            .set("tail", self.tail.to_string())
    }
}

/// Stats delivery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsMode {
    /// A new sample roughly every second until the caller disconnects
    Stream,
    /// One sample; `one_shot` skips the second pre-read sample used for CPU deltas
    Single { one_shot: bool },
}

impl StatsMode {
    pub fn query(self) -> Query {
        let (stream, one_shot) = match self {
            StatsMode::Stream => (true, false),
            StatsMode::Single { one_shot } => (false, one_shot),
        };
        Query::new()
            .flag("stream", stream)
            .flag("one-shot", one_shot)
    }
}

/// Check a container name against `[a-zA-Z0-9][a-zA-Z0-9_.-]+`
pub fn validate_container_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {
            let rest = chars.as_str();
            !rest.is_empty()
                && rest
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ApiError::InvalidRequest(format!(
            "invalid container name {name:?}"
        )))
    }
}

/// Check a detach key sequence: `ctrl-<x>` or a single lowercase letter
pub fn validate_detach_keys(keys: &str) -> Result<()> {
    let valid = match keys.strip_prefix("ctrl-") {
        Some(rest) => {
            let mut chars = rest.chars();
            matches!(
                (chars.next(), chars.next()),
                (Some('a'..='z' | '@' | '^' | '[' | ',' | '_'), None)
            )
        }
        None => keys.len() == 1 && keys.chars().all(|c| c.is_ascii_lowercase()),
    };

    if valid {
        Ok(())
    } else {
        Err(ApiError::InvalidRequest(format!(
            "invalid detach key sequence {keys:?}"
        )))
    }
}

fn signal_query(signal: Option<&str>, timeout: Option<u32>) -> Query {
    Query::new().opt("signal", signal).opt("t", timeout)
}

/// Container endpoints bound to a client
#[derive(Debug, Clone, Copy)]
pub struct ContainersApi<'a> {
    socket: &'a DockerSocket,
}

impl<'a> ContainersApi<'a> {
    pub fn new(socket: &'a DockerSocket) -> Self {
        Self { socket }
    }

    pub async fn list(&self, options: &ListContainersOptions) -> Result<Vec<ContainerSummary>> {
        let query = Query::new()
            .flag("all", options.all)
            .opt("limit", options.limit)
            .flag("size", options.size)
            .json("filters", &options.filters)?;

        self.socket
            .api_call(ApiRequest::get("/containers/json").query(query))
            .await
    }

    /// Low-level details of one container
    pub async fn inspect(&self, id: &str, size: bool) -> Result<Value> {
        let query = Query::new().flag("size", size);
        self.socket
            .api_call(ApiRequest::get(format!("/containers/{id}/json")).query(query))
            .await
    }

    /// Processes running inside a container; `ps_args` defaults to `-ef`
    pub async fn top(&self, id: &str, ps_args: Option<&str>) -> Result<ContainerTop> {
        let query = Query::new().set("ps_args", ps_args.unwrap_or("-ef"));
        self.socket
            .api_call(ApiRequest::get(format!("/containers/{id}/top")).query(query))
            .await
    }

    /// Logs produced so far, split into stdout/stderr frames
    pub async fn logs(&self, id: &str, options: &LogsOptions) -> Result<Vec<LogFrame>> {
        let request = ApiRequest::get(format!("/containers/{id}/logs")).query(options.query(false));
        let raw = self.socket.api_bytes(request).await?;
        demux_logs(raw).map_err(|e| ApiError::protocol("malformed log stream", e))
    }

    /// Live log stream; decode with [`LiveStream::log_frames`]
    pub async fn follow_logs(&self, id: &str, options: &LogsOptions) -> Result<LiveStream> {
        let request = ApiRequest::get(format!("/containers/{id}/logs")).query(options.query(true));
        self.socket.stream(request).await
    }

    /// One stats sample
    pub async fn stats(&self, id: &str, one_shot: bool) -> Result<Value> {
        let query = StatsMode::Single { one_shot }.query();
        self.socket
            .api_call(ApiRequest::get(format!("/containers/{id}/stats")).query(query))
            .await
    }

    /// Continuous stats samples; decode with [`LiveStream::json_lines`]
    pub async fn stats_stream(&self, id: &str) -> Result<LiveStream> {
        let query = StatsMode::Stream.query();
        self.socket
            .stream(ApiRequest::get(format!("/containers/{id}/stats")).query(query))
            .await
    }

    /// Create a container from a creation body
    pub async fn create<B: Serialize + ?Sized>(
        &self,
        body: &B,
        name: Option<&str>,
        platform: Option<&str>,
    ) -> Result<ContainerCreated> {
        if let Some(name) = name {
            validate_container_name(name)?;
        }
        let query = Query::new().opt("name", name).opt("platform", platform);
        let request = ApiRequest::post("/containers/create").query(query).json(body)?;

        self.socket.api_call(request).await
    }

    pub async fn start(&self, id: &str, detach_keys: Option<&str>) -> Result<()> {
        if let Some(keys) = detach_keys {
            validate_detach_keys(keys)?;
        }
        let query = Query::new().opt("detachKeys", detach_keys);
        self.socket
            .api_unit(ApiRequest::post(format!("/containers/{id}/start")).query(query))
            .await
    }

    /// Stop a container, killing it after `timeout` seconds
    pub async fn stop(&self, id: &str, signal: Option<&str>, timeout: Option<u32>) -> Result<()> {
        self.socket
            .api_unit(
                ApiRequest::post(format!("/containers/{id}/stop"))
                    .query(signal_query(signal, timeout)),
            )
            .await
    }

    pub async fn restart(
        &self,
        id: &str,
        signal: Option<&str>,
        timeout: Option<u32>,
    ) -> Result<()> {
        self.socket
            .api_unit(
                ApiRequest::post(format!("/containers/{id}/restart"))
                    .query(signal_query(signal, timeout)),
            )
            .await
    }

    pub async fn kill(&self, id: &str, signal: Option<&str>) -> Result<()> {
        self.socket
            .api_unit(
                ApiRequest::post(format!("/containers/{id}/kill"))
                    .query(signal_query(signal, None)),
            )
            .await
    }

    pub async fn pause(&self, id: &str) -> Result<()> {
        self.socket
            .api_unit(ApiRequest::post(format!("/containers/{id}/pause")))
            .await
    }

    pub async fn unpause(&self, id: &str) -> Result<()> {
        self.socket
            .api_unit(ApiRequest::post(format!("/containers/{id}/unpause")))
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        self.socket
            .api_unit(ApiRequest::delete(format!("/containers/{id}")))
            .await
    }

    /// Delete stopped containers
    pub async fn prune(&self, filters: &Filters) -> Result<ContainerPrune> {
        let query = Query::new().json("filters", filters)?;
        self.socket
            .api_call(ApiRequest::post("/containers/prune").query(query))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::request::QueryValue;
    use chrono::TimeZone;

    #[test]
    fn test_container_names() {
        assert!(validate_container_name("web-1").is_ok());
        assert!(validate_container_name("a_b.c").is_ok());
        assert!(validate_container_name("x").is_err());
        assert!(validate_container_name("-web").is_err());
        assert!(validate_container_name("web/1").is_err());
        assert!(validate_container_name("").is_err());
    }

    #[test]
    fn test_detach_keys() {
        assert!(validate_detach_keys("ctrl-p").is_ok());
        assert!(validate_detach_keys("ctrl-@").is_ok());
        assert!(validate_detach_keys("q").is_ok());
        assert!(validate_detach_keys("ctrl-").is_err());
        assert!(validate_detach_keys("ctrl-pq").is_err());
        assert!(validate_detach_keys("Q").is_err());
        assert!(validate_detach_keys("ab").is_err());
    }

    #[test]
    fn test_stats_modes() {
        assert_eq!(StatsMode::Stream.query().encode(), "stream=true&one-shot=false");
        assert_eq!(
            StatsMode::Single { one_shot: true }.query().encode(),
            "stream=false&one-shot=true"
        );
    }

    #[test]
    fn test_logs_query() {
        let options = LogsOptions {
            since: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            tail: Tail::Lines(50),
            ..LogsOptions::default()
        };
        let query = options.query(true);

        assert_eq!(query.get("follow"), Some(&QueryValue::from("true")));
        assert_eq!(query.get("since"), Some(&QueryValue::from("1704067200")));
        assert_eq!(query.get("until"), Some(&QueryValue::from("0")));
        assert_eq!(query.get("tail"), Some(&QueryValue::from("50")));
        assert_eq!(LogsOptions::default().query(false).get("tail"), Some(&QueryValue::from("all")));
    }

    #[test]
    fn test_signal_query_drops_absent_values() {
        assert_eq!(signal_query(None, None).encode(), "");
        assert_eq!(signal_query(Some("SIGTERM"), Some(5)).encode(), "signal=SIGTERM&t=5");
    }
}
