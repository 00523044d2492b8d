//! Docksock Library
//!
//! This crate provides a client for container engine daemons listening on a
//! local Unix socket, including socket discovery, API version negotiation,
//! buffered and streaming responses, and registry authentication.

pub mod api;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;

// Re-exports for convenience
pub use api::containers::{ContainersApi, ListContainersOptions, LogsOptions, StatsMode, Tail};
pub use api::images::{
    BuildOptions, BuilderVersion, CreateImageOptions, ImageSource, ImagesApi, ListImagesOptions,
    PushOptions, RemoveImageOptions,
};
pub use client::auth::{AuthToken, RegistryAuth, RegistryConfig, RegistryCredential};
pub use client::socket::{DockerSocket, Session};
pub use client::version::{ApiVersion, VersionInfo};
pub use config::{DockerConfig, LoggingConfig};
pub use connection::locator::{LocateError, SocketLocator};
pub use connection::request::{ApiRequest, Query, QueryValue, RequestBody};
pub use connection::response::{Decoded, RawResponse, ResponseBody};
pub use connection::stream::{
    JsonLines, LiveStream, LogFrame, LogFrameCodec, LogFrames, LogFraming, StdStream,
};
pub use connection::transport::{ReadMode, Transport};
pub use error::{ApiError, Result};
