//! Error Types
//!
//! Every failure a daemon call can produce, and the rules that turn a raw
//! response into one of them.

use hyper::StatusCode;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Status reported for failures that never produced an HTTP status line.
pub const PROTOCOL_FAILURE_STATUS: u16 = 999;

/// Boxed underlying cause of a protocol failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by daemon calls
#[derive(Debug, Error)]
pub enum ApiError {
    /// The socket is missing or is not a socket
    #[error("Cannot connect to the Docker daemon at unix://{}. Is the docker daemon running?", .path.display())]
    Unreachable { path: PathBuf },

    /// A versioned call was issued before `init()` completed
    #[error("DockerSocket: wrapper uninitialized, call init() first")]
    Uninitialized,

    /// Connection-level failure while sending or receiving
    #[error("transport failure: {message}")]
    Protocol {
        message: String,
        #[source]
        source: BoxError,
    },

    /// The daemon answered with a non-success status line
    #[error("daemon returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The status looked successful but the body carried an error record
    #[error("daemon reported an error ({status}): {message}")]
    Embedded { status: u16, message: String },

    /// The login call did not report a successful login
    #[error("DockerSocket: invalid credentials")]
    InvalidCredentials,

    /// Caller input rejected before any I/O
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A successful response did not match the expected shape
    #[error("failed to decode daemon response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub(crate) fn protocol(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ApiError::Protocol {
            message: message.into(),
            source: source.into(),
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Protocol { .. } => Some(PROTOCOL_FAILURE_STATUS),
            ApiError::Status { status, .. } | ApiError::Embedded { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the daemon could not be reached or the exchange broke down
    pub fn is_protocol(&self) -> bool {
        matches!(self, ApiError::Protocol { .. })
    }

    /// True for failures reported by the daemon itself
    pub fn is_application(&self) -> bool {
        matches!(self, ApiError::Status { .. } | ApiError::Embedded { .. })
    }

    /// Human-readable reason without the status prefix
    pub fn reason(&self) -> String {
        match self {
            ApiError::Status { message, .. } | ApiError::Embedded { message, .. } => {
                message.clone()
            }
            ApiError::Protocol { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Whether a status line already signals failure
pub fn is_failure(status: StatusCode) -> bool {
    status.as_u16() >= 300
}

/// Classify a failed status line using the drained body.
///
/// The message comes from the JSON `message` field when the body has one,
/// otherwise from the raw body text.
pub fn classify_status(status: StatusCode, body: &[u8]) -> ApiError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim_end().to_string());

    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Message of an embedded error record, if the record is one
pub fn embedded_error(record: &Value) -> Option<String> {
    match record.get("error")? {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        other => Some(
            record
                .get("errorDetail")
                .and_then(|detail| detail.get("message"))
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

/// Turn an embedded error record into a classified error
pub fn classify_record(status: StatusCode, record: &Value) -> Option<ApiError> {
    embedded_error(record).map(|message| ApiError::Embedded {
        status: status.as_u16(),
        message,
    })
}
