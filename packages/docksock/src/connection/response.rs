//! Response Reader
//!
//! Raw responses as they come back from the transport, and the buffered
//! decoding rules applied to drained bodies.

use bytes::Bytes;
use hyper::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::connection::stream::LiveStream;
use crate::error::{classify_record, classify_status, is_failure, ApiError, Result};

/// Body of a raw response, decided once the status line is known
#[derive(Debug)]
pub enum ResponseBody {
    /// Fully drained
    Buffered(Bytes),
    /// Still arriving; owned by the caller
    Live(LiveStream),
}

/// Status, headers and body of one exchange, before classification
#[derive(Debug)]
pub struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl RawResponse {
    pub(crate) fn buffered(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body: ResponseBody::Buffered(body),
        }
    }

    pub(crate) fn live(stream: LiveStream) -> Self {
        Self {
            status: stream.status(),
            headers: stream.headers().clone(),
            body: ResponseBody::Live(stream),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Drain the body if needed and apply the buffered decoding rules
    pub async fn decode(self) -> Result<Decoded> {
        let bytes = match self.body {
            ResponseBody::Buffered(bytes) => bytes,
            ResponseBody::Live(stream) => stream.collect_bytes().await?,
        };
        read_buffered(self.status, &bytes)
    }

    /// Classify a failed status, handing back the drained body otherwise
    pub async fn into_bytes(self) -> Result<Bytes> {
        let bytes = match self.body {
            ResponseBody::Buffered(bytes) => bytes,
            ResponseBody::Live(stream) => stream.collect_bytes().await?,
        };
        if is_failure(self.status) {
            return Err(classify_status(self.status, &bytes));
        }
        Ok(bytes)
    }
}

/// Outcome of buffered decoding
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The whole body was one JSON document
    Json(Value),
    /// Anything else, verbatim
    Text(String),
}

impl Decoded {
    /// Deserialize into `T`; text bodies are offered as a JSON string
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        let value = match self {
            Decoded::Json(value) => value,
            Decoded::Text(text) => Value::String(text),
        };
        Ok(serde_json::from_value(value)?)
    }

    pub fn into_text(self) -> String {
        match self {
            Decoded::Json(value) => value.to_string(),
            Decoded::Text(text) => text,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Decoded::Json(value) => Some(value),
            Decoded::Text(_) => None,
        }
    }
}

/// Decode a drained body.
///
/// A failed status is classified straight away. Otherwise the body is tried
/// as one JSON document, then scanned line by line for embedded error
/// records, and finally returned as text.
pub fn read_buffered(status: StatusCode, body: &[u8]) -> Result<Decoded> {
    if is_failure(status) {
        return Err(classify_status(status, body));
    }

    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(err) = classify_record(status, &value) {
            return Err(err);
        }
        return Ok(Decoded::Json(value));
    }

    if let Some(err) = JsonRecords::new(body).find_map(|record| classify_record(status, &record)) {
        return Err(err);
    }

    Ok(Decoded::Text(String::from_utf8_lossy(body).into_owned()))
}

/// Lazy iterator over the JSON records of a newline-delimited buffer.
///
/// Lines that are blank or not JSON are skipped.
pub struct JsonRecords<'a> {
    lines: std::slice::Split<'a, u8, fn(&u8) -> bool>,
}

impl<'a> JsonRecords<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        fn is_newline(byte: &u8) -> bool {
            *byte == b'\n'
        }
        Self {
            lines: body.split(is_newline as fn(&u8) -> bool),
        }
    }
}

impl Iterator for JsonRecords<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.lines.find_map(|line| {
            if line.iter().all(u8::is_ascii_whitespace) {
                return None;
            }
            serde_json::from_slice(line).ok()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_document_is_parsed() {
        let decoded = read_buffered(StatusCode::OK, br#"{"Id":"abc","Warnings":[]}"#).unwrap();
        assert_eq!(decoded, Decoded::Json(json!({"Id": "abc", "Warnings": []})));
    }

    #[test]
    fn test_embedded_error_on_third_line() {
        let body = b"{\"status\":\"Pulling\"}\n{\"status\":\"Extracting\"}\n{\"error\":\"x\"}\n{\"status\":\"Done\"}\n";
        match read_buffered(StatusCode::OK, body) {
            Err(ApiError::Embedded { status, message }) => {
                assert_eq!(status, 200);
                assert_eq!(message, "x");
            }
            other => panic!("Expected Embedded error, got {:?}", other),
        }
    }

    #[test]
    fn test_progress_without_errors_returns_text() {
        let body = "{\"stream\":\"Step 1/2\"}\n{\"stream\":\"Step 2/2\"}\n";
        let decoded = read_buffered(StatusCode::OK, body.as_bytes()).unwrap();
        assert_eq!(decoded, Decoded::Text(body.to_string()));
    }

    #[test]
    fn test_plain_text_is_returned_verbatim() {
        let body = "2024-01-01T00:00:00Z started\nlistening on :8080\n";
        let decoded = read_buffered(StatusCode::OK, body.as_bytes()).unwrap();
        assert_eq!(decoded, Decoded::Text(body.to_string()));
    }

    #[test]
    fn test_empty_body_is_empty_text() {
        let decoded = read_buffered(StatusCode::NO_CONTENT, b"").unwrap();
        assert_eq!(decoded, Decoded::Text(String::new()));
    }

    #[test]
    fn test_failed_status_skips_line_scan() {
        let body = b"{\"message\":\"conflict\"}";
        match read_buffered(StatusCode::CONFLICT, body) {
            Err(ApiError::Status { status, message }) => {
                assert_eq!(status, 409);
                assert_eq!(message, "conflict");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[test]
    fn test_single_error_object_is_embedded() {
        let result = read_buffered(StatusCode::OK, br#"{"error":"pull access denied"}"#);
        assert!(matches!(result, Err(ApiError::Embedded { .. })));
    }

    #[test]
    fn test_records_skip_noise() {
        let body = b"not json\n\n{\"a\":1}\r\n{\"b\":2}";
        let records: Vec<Value> = JsonRecords::new(body).collect();
        assert_eq!(records, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn test_into_json_accepts_text_for_strings() {
        let text: String = Decoded::Text("raw".to_string()).into_json().unwrap();
        assert_eq!(text, "raw");
    }
}
