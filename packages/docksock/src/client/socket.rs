//! Docker Socket Client
//!
//! The entry point of the crate. A [`DockerSocket`] resolves the daemon
//! socket and negotiates the API version once in [`DockerSocket::init`];
//! every later call goes through the resulting [`Session`].

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};
use url::Url;

use crate::api::containers::ContainersApi;
use crate::api::images::ImagesApi;
use crate::client::auth::{encode_credential, AuthResponse, AuthToken, RegistryCredential};
use crate::client::version::{negotiate, ApiVersion, VersionInfo};
use crate::config::DockerConfig;
use crate::connection::locator::SocketLocator;
use crate::connection::request::ApiRequest;
use crate::connection::response::{Decoded, RawResponse};
use crate::connection::stream::LiveStream;
use crate::connection::transport::{ReadMode, Transport};
use crate::error::{ApiError, Result};

/// Resolved socket and negotiated version, fixed once `init` completes
#[derive(Debug, Clone)]
pub struct Session {
    transport: Transport,
    version: VersionInfo,
}

impl Session {
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn version(&self) -> &VersionInfo {
        &self.version
    }

    pub fn api_version(&self) -> &ApiVersion {
        &self.version.api_version
    }

    /// Rewrite the request onto the negotiated version
    fn bind(&self, request: ApiRequest) -> ApiRequest {
        let path = self.api_version().versioned_path(request.path());
        request.with_path(path)
    }
}

/// Client for a container engine daemon listening on a Unix socket
#[derive(Debug)]
pub struct DockerSocket {
    locator: SocketLocator,
    base_url: Url,
    session: Option<Session>,
}

impl DockerSocket {
    /// Create an uninitialized client from configuration
    pub fn new(config: &DockerConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ApiError::InvalidRequest(format!("invalid base URL {:?}: {e}", config.base_url))
        })?;

        Ok(Self {
            locator: SocketLocator::new(&config.socket_path),
            base_url,
            session: None,
        })
    }

    /// Create an uninitialized client for a socket path with default settings
    pub fn with_socket(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(&DockerConfig::with_socket(path.as_ref()))
    }

    /// Create a client and run [`DockerSocket::init`] on it
    pub async fn connect(config: &DockerConfig) -> Result<Self> {
        let mut socket = Self::new(config)?;
        socket.init().await?;
        Ok(socket)
    }

    /// Current socket path; the resolved target once the socket was found
    pub fn socket_path(&self) -> &Path {
        self.locator.path()
    }

    /// Whether the configured endpoint leads to a socket.
    ///
    /// Follows symbolic links and remembers the final target.
    pub async fn is_ready(&mut self) -> bool {
        self.locator.resolve().await
    }

    /// Resolve the socket and negotiate the API version.
    ///
    /// Calling it again re-resolves and replaces the previous session.
    pub async fn init(&mut self) -> Result<&VersionInfo> {
        if !self.is_ready().await {
            return Err(ApiError::Unreachable {
                path: self.locator.path().to_path_buf(),
            });
        }

        let transport = Transport::new(self.locator.path(), self.base_url.clone());
        let version = negotiate(&transport).await?;

        info!(
            socket = %transport.socket_path().display(),
            api_version = %version.api_version,
            daemon_version = version.version.as_deref().unwrap_or("unknown"),
            "Connected to daemon"
        );

        let session = self.session.insert(Session { transport, version });
        Ok(&session.version)
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Negotiated session, or `Uninitialized` before `init`
    pub fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(ApiError::Uninitialized)
    }

    /// Cached `/version` payload
    pub fn version(&self) -> Result<&VersionInfo> {
        self.session().map(Session::version)
    }

    pub fn api_version(&self) -> Result<&ApiVersion> {
        self.session().map(Session::api_version)
    }

    /// Issue a versioned request without classifying the response
    pub async fn send(&self, request: ApiRequest, mode: ReadMode) -> Result<RawResponse> {
        let session = self.session()?;
        session.transport.dispatch(session.bind(request), mode).await
    }

    /// Issue a versioned request and apply the buffered decoding rules
    pub async fn api_decoded(&self, request: ApiRequest) -> Result<Decoded> {
        let response = self.send(request, ReadMode::Buffered).await?;
        response.decode().await
    }

    /// Issue a versioned request and deserialize the reply
    pub async fn api_call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.api_decoded(request).await?.into_json()
    }

    /// Issue a versioned request and return the reply as text
    pub async fn api_text(&self, request: ApiRequest) -> Result<String> {
        Ok(self.api_decoded(request).await?.into_text())
    }

    /// Issue a versioned request whose reply carries nothing of interest
    pub async fn api_unit(&self, request: ApiRequest) -> Result<()> {
        self.api_decoded(request).await.map(|_| ())
    }

    /// Issue a versioned request and return the raw body of a successful reply
    pub async fn api_bytes(&self, request: ApiRequest) -> Result<Bytes> {
        let response = self.send(request, ReadMode::Buffered).await?;
        response.into_bytes().await
    }

    /// Issue a versioned request and hand back the live body
    pub async fn stream(&self, request: ApiRequest) -> Result<LiveStream> {
        let session = self.session()?;
        session.transport.open_stream(session.bind(request)).await
    }

    /// Daemon-wide information (`GET /info`)
    pub async fn info(&self) -> Result<Value> {
        self.api_call(ApiRequest::get("/info")).await
    }

    /// Log in to a registry through the daemon.
    ///
    /// The returned token is the encoded login payload, to be attached to
    /// later registry-facing calls.
    pub async fn authenticate(&self, credential: &RegistryCredential) -> Result<AuthToken> {
        let request = ApiRequest::post("/auth").json(credential)?;

        let reply = match self.api_decoded(request).await {
            Ok(decoded) => decoded,
            Err(ApiError::Status { status: 401, message }) => {
                warn!(registry = %credential.serveraddress, reason = %message, "Login rejected");
                return Err(ApiError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        let reply: AuthResponse = match reply {
            Decoded::Json(value) => serde_json::from_value(value)?,
            Decoded::Text(_) => AuthResponse::default(),
        };
        if !reply.succeeded() {
            warn!(registry = %credential.serveraddress, status = %reply.status, "Login rejected");
            return Err(ApiError::InvalidCredentials);
        }

        info!(registry = %credential.serveraddress, user = %credential.username, "Login succeeded");
        Ok(AuthToken::new(encode_credential(credential)?))
    }

    pub fn containers(&self) -> ContainersApi<'_> {
        ContainersApi::new(self)
    }

    pub fn images(&self) -> ImagesApi<'_> {
        ImagesApi::new(self)
    }
}
