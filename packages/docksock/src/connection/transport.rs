//! Transport
//!
//! One HTTP/1.1 exchange per call over the daemon's Unix socket.

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::header::{HeaderValue, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use hyper::http::response::Parts;
use hyper::{Request, Uri};
use hyper_util::rt::TokioIo;
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;
use tracing::debug;
use url::Url;

use crate::connection::request::{ApiRequest, RequestBody};
use crate::connection::response::RawResponse;
use crate::connection::stream::{ConnectionTask, LiveStream};
use crate::error::{classify_status, is_failure, ApiError, Result};

/// Logical base used to build request targets; never dialled
pub const DEFAULT_BASE_URL: &str = "http://localhost";

/// How the response body is consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Drain before returning
    Buffered,
    /// Return once the status line is in
    Streaming,
}

/// Request/response exchange over a resolved socket path
#[derive(Debug, Clone)]
pub struct Transport {
    socket_path: PathBuf,
    base_url: Url,
}

impl Transport {
    pub fn new(socket_path: impl Into<PathBuf>, base_url: Url) -> Self {
        Self {
            socket_path: socket_path.into(),
            base_url,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join a path and query against the logical base
    pub fn target(&self, request: &ApiRequest) -> Result<Url> {
        let path = format!("/{}", request.path().trim_start_matches('/'));
        let mut url = self
            .base_url
            .join(&path)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid path {path:?}: {e}")))?;
        request.query_params().append_to(&mut url);
        Ok(url)
    }

    /// Send a request and drain the response, whatever its status
    pub async fn send(&self, request: ApiRequest) -> Result<RawResponse> {
        let (parts, body, connection) = self.exchange(request).await?;
        let bytes = body
            .collect()
            .await
            .map_err(|e| ApiError::protocol("failed to read response body", e))?
            .to_bytes();
        drop(connection);

        Ok(RawResponse::buffered(parts.status, parts.headers, bytes))
    }

    /// Send a request and hand back the body as soon as the status is known.
    ///
    /// A failed status is drained and classified instead of being exposed.
    pub async fn open_stream(&self, request: ApiRequest) -> Result<LiveStream> {
        let (parts, body, connection) = self.exchange(request).await?;

        if is_failure(parts.status) {
            let bytes = body
                .collect()
                .await
                .map_err(|e| ApiError::protocol("failed to read error body", e))?
                .to_bytes();
            return Err(classify_status(parts.status, &bytes));
        }

        Ok(LiveStream::new(parts.status, parts.headers, body, connection))
    }

    /// Send a request in the given mode
    pub async fn dispatch(&self, request: ApiRequest, mode: ReadMode) -> Result<RawResponse> {
        match mode {
            ReadMode::Buffered => self.send(request).await,
            ReadMode::Streaming => self.open_stream(request).await.map(RawResponse::live),
        }
    }

    async fn exchange(&self, request: ApiRequest) -> Result<(Parts, Incoming, ConnectionTask)> {
        let url = self.target(&request)?;
        let ApiRequest {
            method,
            mut headers,
            body,
            ..
        } = request;

        if !headers.contains_key(CONTENT_LENGTH) && !headers.contains_key(TRANSFER_ENCODING) {
            if let RequestBody::Buffer(bytes) = &body {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            }
        }
        if !headers.contains_key(HOST) {
            let host = match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{host}:{port}"),
                (Some(host), None) => host.to_string(),
                (None, _) => "localhost".to_string(),
            };
            let host = HeaderValue::from_str(&host)
                .map_err(|e| ApiError::InvalidRequest(format!("host {host:?}: {e}")))?;
            headers.insert(HOST, host);
        }

        let target = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let uri: Uri = target
            .parse()
            .map_err(|e| ApiError::InvalidRequest(format!("request target {target:?}: {e}")))?;

        debug!(
            method = %method,
            path = %target,
            socket = %self.socket_path.display(),
            "Sending request to daemon"
        );

        let mut outbound = Request::new(body.into_outbound());
        *outbound.method_mut() = method;
        *outbound.uri_mut() = uri;
        *outbound.headers_mut() = headers;

        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            ApiError::protocol(
                format!(
                    "failed to connect to daemon at {}",
                    self.socket_path.display()
                ),
                e,
            )
        })?;

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| ApiError::protocol("HTTP handshake failed", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "Daemon connection closed");
            }
        });

        let response = sender
            .send_request(outbound)
            .await
            .map_err(|e| ApiError::protocol("failed to send request", e))?;
        let connection = ConnectionTask::new(handle, sender);

        let (parts, body) = response.into_parts();
        debug!(status = %parts.status, "Daemon responded");

        Ok((parts, body, connection))
    }
}
