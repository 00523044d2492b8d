//! Live Streams
//!
//! Response bodies handed to the caller while the daemon is still writing
//! them: follow-logs, stats streams, build and pull progress.

use bytes::{Buf, Bytes, BytesMut};
use futures_util::stream::MapErr;
use futures_util::{Stream, TryStreamExt};
use hyper::body::{Body, Incoming};
use hyper::client::conn::http1::SendRequest;
use hyper::header::CONTENT_TYPE;
use hyper::{HeaderMap, StatusCode};
use serde_json::Value;
use std::borrow::Cow;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::connection::request::OutboundBody;
use crate::error::{classify_record, ApiError, Result};

/// Longest single record accepted from a JSON-lines stream
pub const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

/// Size of the header in front of every multiplexed log frame
pub const LOG_FRAME_HEADER_LEN: usize = 8;

/// Content type of log output that carries frame headers
pub const MULTIPLEXED_STREAM: &str = "application/vnd.docker.multiplexed-stream";

/// Background task driving one HTTP connection; aborted when dropped
#[derive(Debug)]
pub(crate) struct ConnectionTask {
    handle: JoinHandle<()>,
    _sender: SendRequest<OutboundBody>,
}

impl ConnectionTask {
    pub(crate) fn new(handle: JoinHandle<()>, sender: SendRequest<OutboundBody>) -> Self {
        Self {
            handle,
            _sender: sender,
        }
    }
}

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A response whose body is still arriving.
///
/// Yields body chunks as they come off the socket. Dropping the stream (or
/// calling [`LiveStream::close`]) tears the connection down.
#[derive(Debug)]
pub struct LiveStream {
    status: StatusCode,
    headers: HeaderMap,
    body: Incoming,
    connection: ConnectionTask,
}

impl LiveStream {
    pub(crate) fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Incoming,
        connection: ConnectionTask,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            connection,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Drain the rest of the body
    pub async fn collect_bytes(self) -> Result<Bytes> {
        use http_body_util::BodyExt;

        let LiveStream {
            body, connection, ..
        } = self;
        let collected = body
            .collect()
            .await
            .map_err(|e| ApiError::protocol("failed to read response body", e))?;
        drop(connection);
        Ok(collected.to_bytes())
    }

    /// Decode the body as newline-delimited JSON records
    pub fn json_lines(self) -> JsonLines {
        let status = self.status;
        JsonLines {
            status,
            lines: FramedRead::new(
                self.into_reader(),
                LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
            ),
        }
    }

    /// Decode the body as multiplexed stdout/stderr frames
    ///
    /// Output of TTY containers carries no frame headers and is passed
    /// through as stdout frames.
    pub fn log_frames(self) -> LogFrames {
        let codec = LogFrameCodec::for_headers(&self.headers);
        LogFrames {
            frames: FramedRead::new(self.into_reader(), codec),
        }
    }

    /// Expose the body as an `AsyncRead`
    pub fn into_reader(self) -> ChunkReader {
        StreamReader::new(self.map_err(into_io as fn(ApiError) -> io::Error))
    }

    /// Stop reading and close the connection
    pub fn close(self) {
        drop(self);
    }
}

impl Stream for LiveStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(Pin::new(&mut self.body).poll_frame(cx)) {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) if !data.is_empty() => return Poll::Ready(Some(Ok(data))),
                    // trailers or an empty chunk
                    _ => continue,
                },
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(ApiError::protocol(
                        "failed to read response stream",
                        e,
                    ))))
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

/// `AsyncRead` view over a live stream
pub type ChunkReader = StreamReader<MapErr<LiveStream, fn(ApiError) -> io::Error>, Bytes>;

fn into_io(e: ApiError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

/// Recover the original error from an I/O error raised by a [`ChunkReader`]
fn from_io(e: io::Error) -> ApiError {
    if !e.get_ref().is_some_and(|inner| inner.is::<ApiError>()) {
        return ApiError::protocol("failed to read response stream", e);
    }
    match e.into_inner().map(|inner| inner.downcast::<ApiError>()) {
        Some(Ok(original)) => *original,
        Some(Err(other)) => ApiError::protocol("failed to read response stream", other),
        None => ApiError::protocol(
            "failed to read response stream",
            io::Error::from(io::ErrorKind::Other),
        ),
    }
}

/// Lazily decoded JSON records of a live stream.
///
/// Lines are parsed one at a time as they complete, so records split across
/// chunk boundaries are reassembled. A record with an `error` field is
/// yielded as [`ApiError::Embedded`].
pub struct JsonLines {
    status: StatusCode,
    lines: FramedRead<ChunkReader, LinesCodec>,
}

impl Stream for JsonLines {
    type Item = Result<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let line = match ready!(Pin::new(&mut self.lines).poll_next(cx)) {
                Some(Ok(line)) => line,
                Some(Err(LinesCodecError::Io(e))) => return Poll::Ready(Some(Err(from_io(e)))),
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(ApiError::protocol(
                        "unreadable record in response stream",
                        e,
                    ))))
                }
                None => return Poll::Ready(None),
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record = match serde_json::from_str::<Value>(line) {
                Ok(record) => record,
                Err(e) => return Poll::Ready(Some(Err(e.into()))),
            };

            if let Some(err) = classify_record(self.status, &record) {
                return Poll::Ready(Some(Err(err)));
            }
            return Poll::Ready(Some(Ok(record)));
        }
    }
}

/// Origin of a log frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdin,
    Stdout,
    Stderr,
}

impl StdStream {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(StdStream::Stdin),
            1 => Some(StdStream::Stdout),
            2 => Some(StdStream::Stderr),
            _ => None,
        }
    }
}

impl std::fmt::Display for StdStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StdStream::Stdin => write!(f, "stdin"),
            StdStream::Stdout => write!(f, "stdout"),
            StdStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// One frame of container output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFrame {
    pub stream: StdStream,
    pub message: Bytes,
}

impl LogFrame {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.message)
    }
}

/// How container output is laid out on the wire
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LogFraming {
    /// Decided from the first bytes received
    #[default]
    Detect,
    /// 8-byte header in front of every frame
    Multiplexed,
    /// TTY output, no headers
    Raw,
}

/// Decoder for container output.
///
/// Multiplexed header layout: stream type, three zero bytes, big-endian
/// payload length. Raw output is yielded as stdout frames, one per read.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFrameCodec {
    framing: LogFraming,
}

impl LogFrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_framing(framing: LogFraming) -> Self {
        Self { framing }
    }

    /// Trust an explicit multiplexed content type, otherwise detect.
    ///
    /// Older daemons label multiplexed output as a raw stream, so the raw
    /// content type alone is not taken at its word.
    pub fn for_headers(headers: &HeaderMap) -> Self {
        let multiplexed = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with(MULTIPLEXED_STREAM));
        if multiplexed {
            Self::with_framing(LogFraming::Multiplexed)
        } else {
            Self::new()
        }
    }

    pub fn framing(&self) -> LogFraming {
        self.framing
    }

    fn decode_frame(src: &mut BytesMut) -> io::Result<Option<LogFrame>> {
        if src.len() < LOG_FRAME_HEADER_LEN {
            return Ok(None);
        }

        let stream = StdStream::from_byte(src[0]).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown log stream type {}", src[0]),
            )
        })?;
        let size = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;

        let frame_len = LOG_FRAME_HEADER_LEN + size;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(LOG_FRAME_HEADER_LEN);
        let message = src.split_to(size).freeze();
        Ok(Some(LogFrame { stream, message }))
    }
}

/// Framing implied by the start of a stream, once enough of it is in
fn sniff_framing(src: &[u8]) -> Option<LogFraming> {
    let first = *src.first()?;
    if StdStream::from_byte(first).is_none() {
        return Some(LogFraming::Raw);
    }
    let padding = &src[1..src.len().min(4)];
    if padding.iter().any(|byte| *byte != 0) {
        return Some(LogFraming::Raw);
    }
    (src.len() >= 4).then_some(LogFraming::Multiplexed)
}

impl Decoder for LogFrameCodec {
    type Item = LogFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<LogFrame>> {
        if self.framing == LogFraming::Detect {
            match sniff_framing(src) {
                Some(framing) => self.framing = framing,
                None => return Ok(None),
            }
        }

        match self.framing {
            LogFraming::Raw if src.is_empty() => Ok(None),
            LogFraming::Raw => Ok(Some(LogFrame {
                stream: StdStream::Stdout,
                message: src.split().freeze(),
            })),
            _ => Self::decode_frame(src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<LogFrame>> {
        // a stream too short to tell is TTY output
        if self.framing == LogFraming::Detect && !src.is_empty() {
            self.framing = LogFraming::Raw;
        }
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "log stream ended inside a frame",
            )),
        }
    }
}

/// Whether a buffer starts with a multiplexed frame header
pub fn looks_multiplexed(raw: &[u8]) -> bool {
    raw.len() >= LOG_FRAME_HEADER_LEN && raw[0] <= 2 && raw[1..4] == [0, 0, 0]
}

/// Split a drained log body into frames.
///
/// Output of TTY containers is not multiplexed and comes back as a single
/// stdout frame.
pub fn demux_logs(raw: Bytes) -> io::Result<Vec<LogFrame>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    if !looks_multiplexed(&raw) {
        return Ok(vec![LogFrame {
            stream: StdStream::Stdout,
            message: raw,
        }]);
    }

    let mut codec = LogFrameCodec::with_framing(LogFraming::Multiplexed);
    let mut buffer = BytesMut::from(&raw[..]);
    let mut frames = Vec::new();
    while let Some(frame) = codec.decode_eof(&mut buffer)? {
        frames.push(frame);
    }
    Ok(frames)
}

/// Lazily decoded log frames of a live stream
pub struct LogFrames {
    frames: FramedRead<ChunkReader, LogFrameCodec>,
}

impl Stream for LogFrames {
    type Item = Result<LogFrame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match ready!(Pin::new(&mut self.frames).poll_next(cx)) {
            Some(Ok(frame)) => Poll::Ready(Some(Ok(frame))),
            Some(Err(e)) => Poll::Ready(Some(Err(from_io(e)))),
            None => Poll::Ready(None),
        }
    }
}
