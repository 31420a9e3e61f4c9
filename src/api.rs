// API client module: a small HTTP client that talks to a Papra server's
// document endpoint. One instance is built per process and reused for
// every file of a session. Callers stay synchronous; the client owns a
// single-threaded runtime and blocks on it for each upload.

use crate::error::ShareError;
use crate::settings::UploadTarget;
use futures_util::StreamExt;
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{multipart, Body, Client, Response};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::Instant;
use tokio_util::io::ReaderStream;

/// Applied separately to connecting, to each write of the request body and
/// to each read of the response. A slow transfer that keeps moving never
/// times out.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

const OCTET_STREAM: &str = "application/octet-stream";

/// Something that can push one staged file to the server.
pub trait Uploader {
    fn upload(
        &self,
        target: &UploadTarget,
        file: &Path,
        file_name: &str,
    ) -> Result<UploadedDocument, ShareError>;
}

impl<U: Uploader + ?Sized> Uploader for &U {
    fn upload(
        &self,
        target: &UploadTarget,
        file: &Path,
        file_name: &str,
    ) -> Result<UploadedDocument, ShareError> {
        (**self).upload(target, file, file_name)
    }
}

/// What we could learn from the server's reply. Papra answers with
/// `{"document": {...}}`; anything else leaves both fields empty.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    document: Option<UploadedDocument>,
}

impl UploadedDocument {
    fn from_body(body: &str) -> Self {
        serde_json::from_str::<UploadResponse>(body)
            .ok()
            .and_then(|r| r.document)
            .unwrap_or_default()
    }
}

/// Remembers when bytes last moved in either direction.
#[derive(Clone, Debug)]
struct IdleTimer {
    last: Arc<Mutex<Instant>>,
    limit: Duration,
}

impl IdleTimer {
    fn new(limit: Duration) -> Self {
        IdleTimer {
            last: Arc::new(Mutex::new(Instant::now())),
            limit,
        }
    }

    fn touch(&self) {
        if let Ok(mut last) = self.last.lock() {
            *last = Instant::now();
        }
    }

    fn last(&self) -> Instant {
        match self.last.lock() {
            Ok(last) => *last,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Resolves once nothing has moved for `limit`.
    async fn stalled(&self) {
        loop {
            let deadline = self.last() + self.limit;
            if Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep_until(deadline).await;
        }
    }
}

/// Reqwest-backed uploader.
pub struct ApiClient {
    client: Client,
    runtime: Runtime,
    timeout: Duration,
}

impl ApiClient {
    pub fn new() -> Result<Self, ShareError> {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    /// No overall deadline is set: `timeout` bounds connecting and every
    /// individual wait for the socket, not the whole transfer.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ShareError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("papra-share/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ShareError::io("Could not start the HTTP runtime", e))?;
        Ok(ApiClient {
            client,
            runtime,
            timeout,
        })
    }

    /// Build the bearer Authorization header for `api_key`.
    fn auth_headers(api_key: &str) -> Result<HeaderMap, ShareError> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| ShareError::InvalidApiKey)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    async fn post_file(
        &self,
        url: &str,
        headers: HeaderMap,
        file: &Path,
        file_name: &str,
    ) -> Result<(u16, String), ShareError> {
        let handle = tokio::fs::File::open(file)
            .await
            .map_err(|e| ShareError::io("Could not open temporary file", e))?;
        let len = handle
            .metadata()
            .await
            .map_err(|e| ShareError::io("Could not read temporary file", e))?
            .len();

        // Every chunk handed to the socket counts as progress.
        let idle = IdleTimer::new(self.timeout);
        let progress = idle.clone();
        let stream = ReaderStream::new(handle).inspect(move |_| progress.touch());
        let part = multipart::Part::stream_with_length(Body::wrap_stream(stream), len)
            .file_name(file_name.to_string())
            .mime_str(OCTET_STREAM)?;
        let form = multipart::Form::new().part("file", part);

        debug!("POST {} ({} bytes as {:?})", url, len, file_name);
        let request = self.client.post(url).headers(headers).multipart(form).send();
        let res = tokio::select! {
            res = request => res?,
            _ = idle.stalled() => return Err(ShareError::TimedOut(self.timeout)),
        };

        let status = res.status().as_u16();
        let body = self.read_body(res).await?;
        Ok((status, body))
    }

    /// Drain the response, giving each chunk its own deadline.
    async fn read_body(&self, mut res: Response) -> Result<String, ShareError> {
        let mut raw = Vec::new();
        loop {
            match tokio::time::timeout(self.timeout, res.chunk()).await {
                Ok(Ok(Some(chunk))) => raw.extend_from_slice(&chunk),
                Ok(Ok(None)) => break,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(ShareError::TimedOut(self.timeout)),
            }
        }
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

impl Uploader for ApiClient {
    /// POST one file as multipart/form-data. The single part is named
    /// `file` and carries the original file name; any non-2xx status is
    /// an error carrying the status and the response body.
    fn upload(
        &self,
        target: &UploadTarget,
        file: &Path,
        file_name: &str,
    ) -> Result<UploadedDocument, ShareError> {
        let url = target.documents_url();
        let headers = Self::auth_headers(&target.api_key)?;

        let (status, body) = self
            .runtime
            .block_on(self.post_file(&url, headers, file, file_name))?;
        if !(200..300).contains(&status) {
            return Err(ShareError::Http { status, body });
        }

        let document = UploadedDocument::from_body(&body);
        info!(
            "uploaded {} (document id {})",
            file_name,
            document.id.as_deref().unwrap_or("unknown")
        );
        Ok(document)
    }
}
