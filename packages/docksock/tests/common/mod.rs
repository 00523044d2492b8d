//! Mock daemon shared by the integration tests.
//!
//! Serves a handful of fixed endpoints over a Unix socket in a temporary
//! directory and records every request it fully received.

#![allow(dead_code)]

use bytes::Bytes;
use docksock::{DockerConfig, DockerSocket};
use futures_util::{stream, StreamExt};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

pub const API_VERSION: &str = "1.43";

pub type MockBody = UnsyncBoxBody<Bytes, io::Error>;

/// A request as the daemon saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Recorded {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.query.as_deref().unwrap_or("").as_bytes())
            .into_owned()
            .collect()
    }

    pub fn query_value(&self, key: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }
}

pub struct MockDaemon {
    dir: TempDir,
    socket: PathBuf,
    requests: Arc<Mutex<Vec<Recorded>>>,
    connections: Arc<AtomicUsize>,
    server: Option<JoinHandle<()>>,
}

/// Counts a connection as open until its serving task ends
struct OpenConnection(Arc<AtomicUsize>);

impl OpenConnection {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for OpenConnection {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockDaemon {
    pub async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let recorded = Arc::clone(&requests);
        let open = Arc::clone(&connections);
        let server = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = Arc::clone(&recorded);
                let guard = OpenConnection::new(&open);
                tokio::spawn(async move {
                    let _guard = guard;
                    let service =
                        service_fn(move |request| handle(request, Arc::clone(&recorded)));
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self {
            dir,
            socket,
            requests,
            connections,
            server: Some(server),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> DockerConfig {
        DockerConfig::with_socket(&self.socket)
    }

    /// Client that already went through `init`
    pub async fn client(&self) -> DockerSocket {
        DockerSocket::connect(&self.config()).await.unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Connections the daemon is still serving
    pub fn open_connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Wait until the daemon serves exactly `count` connections
    pub async fn wait_for_connections(&self, count: usize) -> bool {
        let settled = async {
            while self.open_connections() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), settled).await.is_ok()
    }

    /// Most recent request to a path
    pub fn last(&self, path: &str) -> Option<Recorded> {
        self.requests().into_iter().rev().find(|r| r.path == path)
    }

    /// Stop accepting connections and close the listener
    pub async fn shutdown(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
            let _ = server.await;
        }
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

/// Multiplexed log frame as the daemon writes it
pub fn log_frame(stream: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![stream, 0, 0, 0];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

async fn handle(
    request: Request<Incoming>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
) -> Result<Response<MockBody>, hyper::Error> {
    let (parts, body) = request.into_parts();
    let body = body.collect().await?.to_bytes();

    let request = Recorded {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_owned),
        headers: parts.headers,
        body,
    };
    recorded.lock().unwrap().push(request.clone());

    Ok(route(&request))
}

fn route(request: &Recorded) -> Response<MockBody> {
    if request.path == "/version" {
        return json_response(
            StatusCode::OK,
            json!({
                "Version": "24.0.7",
                "ApiVersion": API_VERSION,
                "MinAPIVersion": "1.12",
                "Os": "linux",
                "Arch": "amd64"
            }),
        );
    }

    let prefix = format!("/v{API_VERSION}");
    let Some(path) = request.path.strip_prefix(prefix.as_str()) else {
        return not_found();
    };
    let flag = |key: &str| request.query_value(key).as_deref() == Some("true");

    match (request.method.as_str(), path) {
        ("GET", "/info") => json_response(
            StatusCode::OK,
            json!({"Name": "mock-daemon", "Containers": 3}),
        ),
        (_, "/echo") => json_response(StatusCode::OK, echo(request)),
        ("GET", "/text") => full(
            StatusCode::OK,
            "text/plain",
            "plain text body\nsecond line\n",
        ),
        ("GET", "/containers/json") => json_response(
            StatusCode::OK,
            json!([{
                "Id": "4fa6e0f0c678",
                "Names": ["/web"],
                "Image": "nginx:latest",
                "ImageID": "sha256:605c77e6",
                "Command": "nginx -g 'daemon off;'",
                "Created": 1700000000,
                "Ports": [{"PrivatePort": 80, "PublicPort": 8080, "Type": "tcp", "IP": "0.0.0.0"}],
                "Labels": {"tier": "frontend"},
                "State": "running",
                "Status": "Up 5 minutes"
            }]),
        ),
        ("GET", "/containers/missing/json") => json_response(
            StatusCode::NOT_FOUND,
            json!({"message": "no such container"}),
        ),
        ("GET", "/containers/web/logs") if flag("follow") => chunked(
            StatusCode::OK,
            "application/vnd.docker.multiplexed-stream",
            vec![
                Bytes::from(log_frame(1, b"first\n")),
                Bytes::from(log_frame(2, b"second\n")),
            ],
        ),
        ("GET", "/containers/tty/logs") if flag("follow") => chunked(
            StatusCode::OK,
            "application/vnd.docker.raw-stream",
            vec![
                Bytes::from_static(b"booting\n"),
                Bytes::from_static(b"ready on :8080\n"),
            ],
        ),
        ("GET", "/containers/web/logs") => {
            let mut raw = log_frame(1, b"hello\n");
            raw.extend(log_frame(2, b"oops\n"));
            full(StatusCode::OK, "application/vnd.docker.raw-stream", raw)
        }
        ("GET", "/containers/web/stats") if flag("stream") => chunked(
            StatusCode::OK,
            "application/json",
            vec![
                Bytes::from_static(b"{\"read\":\"t1\","),
                Bytes::from_static(b"\"cpu\":1}\n\n{\"read\""),
                Bytes::from_static(b":\"t2\",\"cpu\":2}\n"),
            ],
        ),
        ("GET", "/containers/web/stats") => json_response(
            StatusCode::OK,
            json!({"read": "t0", "cpu": 0, "one_shot": flag("one-shot")}),
        ),
        ("GET", "/containers/broken/stats") => json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"message": "stats unavailable"}),
        ),
        ("POST", "/containers/create") => json_response(
            StatusCode::CREATED,
            json!({"Id": "abc123", "Warnings": null}),
        ),
        ("POST", "/containers/web/start") => full(StatusCode::NO_CONTENT, "text/plain", ""),
        ("POST", "/images/create") if request.query_value("fromImage").as_deref() == Some("broken") => {
            full(
                StatusCode::OK,
                "application/json",
                "{\"status\":\"Pulling from library/broken\"}\n\
                 {\"status\":\"Pulling fs layer\",\"id\":\"a1\"}\n\
                 {\"error\":\"x\"}\n\
                 {\"status\":\"never reached\"}\n",
            )
        }
        ("POST", "/images/create") => full(
            StatusCode::OK,
            "application/json",
            "{\"status\":\"Pulling from library/alpine\"}\n{\"status\":\"Download complete\"}\n",
        ),
        ("POST", "/images/app/push") => full(
            StatusCode::OK,
            "application/json",
            "{\"status\":\"The push refers to repository [docker.io/library/app]\"}\n{\"status\":\"latest: digest: sha256:abc\"}\n",
        ),
        ("GET", "/images/app/get") => chunked(
            StatusCode::OK,
            "application/x-tar",
            image_archive().chunks(512).map(Bytes::copy_from_slice).collect(),
        ),
        ("GET", "/images/missing/get") => json_response(
            StatusCode::NOT_FOUND,
            json!({"message": "reference does not exist"}),
        ),
        ("GET", "/events") => events(),
        ("POST", "/build") => build(request),
        ("POST", "/auth") => auth(request),
        _ => not_found(),
    }
}

fn echo(request: &Recorded) -> Value {
    json!({
        "method": request.method.as_str(),
        "path": request.path,
        "query": request.query,
        "content_length": request.header(CONTENT_LENGTH.as_str()),
        "transfer_encoding": request.header(TRANSFER_ENCODING.as_str()),
        "content_type": request.header(CONTENT_TYPE.as_str()),
        "body": String::from_utf8_lossy(&request.body),
    })
}

/// Bytes served as the tarball of the `app` image
pub fn image_archive() -> Vec<u8> {
    let mut archive = b"manifest.json".to_vec();
    archive.resize(512, 0);
    archive.extend((0..1300u32).map(|i| (i % 251) as u8));
    archive.extend([0u8; 1024]);
    archive
}

/// Event feed that never ends; a record every 20ms
fn events() -> Response<MockBody> {
    let ticks = stream::unfold(0u64, |tick| async move {
        if tick > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let record = format!("{}\n", json!({"Type": "container", "Action": "tick", "time": tick}));
        Some((Ok::<_, io::Error>(Frame::data(Bytes::from(record))), tick + 1))
    });
    with_head(
        Response::new(StreamBody::new(ticks).boxed_unsync()),
        StatusCode::OK,
        "application/json",
    )
}

fn build(request: &Recorded) -> Response<MockBody> {
    let failing = request.body.windows(4).any(|w| w == b"FAIL");
    let last = if failing {
        Bytes::from_static(
            b"{\"errorDetail\":{\"message\":\"COPY failed\"},\"error\":\"COPY failed\"}\n",
        )
    } else {
        Bytes::from_static(b"{\"aux\":{\"ID\":\"sha256:feed\"}}\n")
    };

    chunked(
        StatusCode::OK,
        "application/json",
        vec![Bytes::from_static(b"{\"stream\":\"Step 1/2 : FROM scratch\\n\"}\n"), last],
    )
}

fn auth(request: &Recorded) -> Response<MockBody> {
    let payload: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
    match (payload["username"].as_str(), payload["password"].as_str()) {
        (Some("locked"), _) => json_response(
            StatusCode::UNAUTHORIZED,
            json!({"message": "login attempt failed"}),
        ),
        (Some(_), Some("hunter2")) => json_response(
            StatusCode::OK,
            json!({"Status": "Login Succeeded", "IdentityToken": ""}),
        ),
        _ => json_response(StatusCode::OK, json!({"Status": "Login failed"})),
    }
}

fn not_found() -> Response<MockBody> {
    json_response(StatusCode::NOT_FOUND, json!({"message": "page not found"}))
}

fn json_response(status: StatusCode, value: Value) -> Response<MockBody> {
    full(status, "application/json", value.to_string())
}

fn full(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<MockBody> {
    let body = Full::new(body.into())
        .map_err::<_, io::Error>(|never| match never {})
        .boxed_unsync();
    with_head(Response::new(body), status, content_type)
}

/// Body written chunk by chunk with a pause in between
fn chunked(status: StatusCode, content_type: &'static str, chunks: Vec<Bytes>) -> Response<MockBody> {
    let frames = stream::iter(chunks).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, io::Error>(Frame::data(chunk))
    });
    with_head(
        Response::new(StreamBody::new(frames).boxed_unsync()),
        status,
        content_type,
    )
}

fn with_head(
    mut response: Response<MockBody>,
    status: StatusCode,
    content_type: &'static str,
) -> Response<MockBody> {
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
