//! Request Model
//!
//! Method, logical path, query, headers and body of a daemon call, before it
//! is bound to a socket or an API version.

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, Method};
use serde::Serialize;
use std::fmt;
use std::io;
use std::pin::Pin;
use url::Url;

use crate::error::{ApiError, Result};

/// Open-ended byte source used for streamed request bodies
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;

/// Body type handed to hyper
pub(crate) type OutboundBody = UnsyncBoxBody<Bytes, io::Error>;

/// One query parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// Dropped when the query is encoded
    Absent,
    Single(String),
    /// Encoded as one `key=value` entry per element
    List(Vec<String>),
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<Option<String>> for QueryValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(QueryValue::Absent, QueryValue::Single)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(value: Vec<String>) -> Self {
        QueryValue::List(value)
    }
}

/// Ordered query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, QueryValue)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter; a later value for the same key replaces the earlier one
    pub fn set(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.params.push((key, value)),
        }
        self
    }

    /// Booleans are sent as `true` / `false`
    pub fn flag(self, key: impl Into<String>, value: bool) -> Self {
        self.set(key, value.to_string())
    }

    pub fn number<N: fmt::Display>(self, key: impl Into<String>, value: N) -> Self {
        self.set(key, value.to_string())
    }

    /// Add the value's string form when present
    pub fn opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        self.set(key, value.map(|v| v.to_string()))
    }

    /// Structured values travel as one JSON string
    pub fn json<T: Serialize + ?Sized>(self, key: impl Into<String>, value: &T) -> Result<Self> {
        Ok(self.set(key, serde_json::to_string(value)?))
    }

    pub fn opt_json<T: Serialize>(self, key: impl Into<String>, value: Option<&T>) -> Result<Self> {
        match value {
            Some(value) => self.json(key, value),
            None => Ok(self.set(key, QueryValue::Absent)),
        }
    }

    pub fn list<I, S>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(key, values.into_iter().map(Into::into).collect::<Vec<_>>())
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Flattened `(key, value)` entries in encoding order
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs = Vec::new();
        for (key, value) in &self.params {
            match value {
                QueryValue::Absent => {}
                QueryValue::Single(v) => pairs.push((key.as_str(), v.as_str())),
                QueryValue::List(values) => {
                    pairs.extend(values.iter().map(|v| (key.as_str(), v.as_str())))
                }
            }
        }
        pairs
    }

    /// Append the encoded parameters to a URL, leaving it untouched when empty
    pub fn append_to(&self, url: &mut Url) {
        let pairs = self.pairs();
        if pairs.is_empty() {
            return;
        }
        url.query_pairs_mut().extend_pairs(pairs);
    }

    /// `application/x-www-form-urlencoded` rendering of the query
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs())
            .finish()
    }
}

/// Request body variants
pub enum RequestBody {
    Empty,
    /// Finite buffer, sent with a computed `Content-Length`
    Buffer(Bytes),
    /// Piped to the connection chunk by chunk
    Stream(ByteStream),
}

impl RequestBody {
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        RequestBody::Stream(Box::pin(stream))
    }

    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(RequestBody::Buffer(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// Known length of the body, if finite
    pub fn len(&self) -> Option<u64> {
        match self {
            RequestBody::Empty => Some(0),
            RequestBody::Buffer(bytes) => Some(bytes.len() as u64),
            RequestBody::Stream(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    pub(crate) fn into_outbound(self) -> OutboundBody {
        match self {
            RequestBody::Empty => Empty::<Bytes>::new()
                .map_err::<_, io::Error>(|never| match never {})
                .boxed_unsync(),
            RequestBody::Buffer(bytes) => Full::new(bytes)
                .map_err::<_, io::Error>(|never| match never {})
                .boxed_unsync(),
            RequestBody::Stream(stream) => {
                StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync()
            }
        }
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        RequestBody::Empty
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => write!(f, "Empty"),
            RequestBody::Buffer(bytes) => write!(f, "Buffer({} bytes)", bytes.len()),
            RequestBody::Stream(_) => write!(f, "Stream"),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Buffer(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Buffer(Bytes::from(bytes))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Buffer(Bytes::from(text))
    }
}

impl From<&'static str> for RequestBody {
    fn from(text: &'static str) -> Self {
        RequestBody::Buffer(Bytes::from_static(text.as_bytes()))
    }
}

/// A daemon call addressed by its version-unaware path
#[derive(Debug)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Query,
    pub(crate) headers: HeaderMap,
    pub(crate) body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Query::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a header from strings, rejecting values that cannot travel on the wire
    pub fn try_header(self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::InvalidRequest(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidRequest(format!("header {name}: {e}")))?;
        Ok(self.header(name, value))
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.body = RequestBody::json(value)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_params(&self) -> &Query {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Replace the logical path, keeping everything else
    pub(crate) fn with_path(mut self, path: String) -> Self {
        self.path = path;
        self
    }
}
