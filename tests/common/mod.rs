#![allow(dead_code)]
//! Stand-in for a Papra server built on axum. It parses each upload with
//! the multipart extractor, records what arrived, and answers with
//! whatever the test decides.

use axum::body::Body;
use axum::extract::{Multipart, Path as UrlPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use futures_util::StreamExt;
use papra_share::share::ShareSource;
use std::convert::Infallible;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One multipart field as the server decoded it.
#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedPart {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// One POST to the documents endpoint.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub organization_id: String,
    pub headers: HeaderMap,
    pub parts: Vec<UploadedPart>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The single `file` part every upload must carry.
    pub fn file(&self) -> &UploadedPart {
        let files: Vec<&UploadedPart> = self.parts.iter().filter(|p| p.name == "file").collect();
        assert_eq!(files.len(), 1, "expected exactly one `file` part in {:?}", self.parts);
        files[0]
    }
}

/// How the fake answers one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Status and body sent at once.
    Now(u16, String),
    /// Status right away, then the body a piece at a time with `gap`
    /// between pieces.
    Trickle {
        status: u16,
        pieces: Vec<String>,
        gap: Duration,
    },
    /// Say nothing for `Duration`, then answer 201.
    Silent(Duration),
}

type Responder = Arc<dyn Fn(usize) -> Reply + Send + Sync>;

#[derive(Clone)]
struct FakeState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    respond: Responder,
}

pub struct FakePapra {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakePapra {
    /// `respond` gets the zero-based request number and decides the reply.
    pub fn start<F>(respond: F) -> Self
    where
        F: Fn(usize) -> Reply + Send + Sync + 'static,
    {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind fake server");
        std_listener
            .set_nonblocking(true)
            .expect("non-blocking listener");
        let addr = std_listener.local_addr().unwrap();

        let state = FakeState {
            requests: Arc::new(Mutex::new(Vec::new())),
            respond: Arc::new(respond),
        };
        let requests = Arc::clone(&state.requests);
        let app = Router::new()
            .route("/api/organizations/:organization_id/documents", post(upload))
            .with_state(state);

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("fake server runtime");
            runtime.block_on(async move {
                let listener =
                    tokio::net::TcpListener::from_std(std_listener).expect("tokio listener");
                axum::serve(listener, app).await.expect("fake server");
            });
        });

        FakePapra { addr, requests }
    }

    /// Accept everything with a Papra-shaped reply.
    pub fn accepting() -> Self {
        Self::start(|i| {
            Reply::Now(
                201,
                format!(r#"{{"document":{{"id":"doc_{}","name":"uploaded"}}}}"#, i),
            )
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn upload(
    State(state): State<FakeState>,
    UrlPath(organization_id): UrlPath<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut parts = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        parts.push(UploadedPart {
            name,
            file_name,
            content_type,
            bytes,
        });
    }

    let index = {
        let mut all = state.requests.lock().unwrap();
        all.push(RecordedRequest {
            organization_id,
            headers,
            parts,
        });
        all.len() - 1
    };

    match (state.respond)(index) {
        Reply::Now(status, body) => json(status, Body::from(body)),
        Reply::Trickle { status, pieces, gap } => {
            let stream = futures_util::stream::iter(pieces).then(move |piece| async move {
                tokio::time::sleep(gap).await;
                Ok::<_, Infallible>(piece)
            });
            json(status, Body::from_stream(stream))
        }
        Reply::Silent(quiet) => {
            tokio::time::sleep(quiet).await;
            json(201, Body::from(r#"{"document":{"id":"late"}}"#))
        }
    }
}

fn json(status: u16, body: Body) -> Response {
    let status = StatusCode::from_u16(status).expect("valid status");
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// A named blob of bytes to share, for tests that do not need a real file.
pub struct BytesShare {
    name: String,
    bytes: Vec<u8>,
}

impl BytesShare {
    pub fn boxed(name: &str, bytes: impl Into<Vec<u8>>) -> Box<dyn ShareSource> {
        Box::new(BytesShare {
            name: name.to_string(),
            bytes: bytes.into(),
        })
    }
}

impl ShareSource for BytesShare {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self.bytes.as_slice()))
    }
}

/// Names of staged upload files still present in `dir`.
pub fn leftover_temp_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| n.starts_with(papra_share::cache::TEMP_PREFIX))
                .collect()
        })
        .unwrap_or_default()
}
