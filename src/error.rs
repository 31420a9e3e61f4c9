// Error types for the library half of the crate. The binary and the UI
// layer wrap these in `anyhow` the same way they wrap everything else.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Everything that can end an upload session.
#[derive(Debug, Error)]
pub enum ShareError {
    /// One or more of the required settings is empty.
    #[error("Papra is not configured yet (missing: {})", .0.join(", "))]
    NotConfigured(Vec<&'static str>),

    /// The share carried no file we could resolve.
    #[error("No file found to share")]
    NothingToShare,

    /// Reading the shared source or writing the staged copy failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("Upload failed ({status}): {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (DNS, TLS, refused...).
    #[error("Upload failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The connection went quiet: no byte was sent or received for the
    /// whole timeout.
    #[error("Upload failed: no progress for {}s", .0.as_secs())]
    TimedOut(Duration),

    /// `-` was given more than once; standard input can only be read once.
    #[error("Standard input can only be shared once, but `-` was given {count} times")]
    StdinRepeated { count: usize },

    #[error("API key contains characters that are not allowed in an HTTP header")]
    InvalidApiKey,
}

impl ShareError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        ShareError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Failures of the on-disk preference store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("preference store I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("preference file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("master key is unusable: {0}")]
    Key(String),

    #[error("preference encryption failed: {0}")]
    Crypto(String),
}
