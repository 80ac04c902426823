//! Error types for the import pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while importing an archive.
#[derive(Debug, Error)]
pub enum ImportError {
    /// A transport-level HTTP failure (DNS, TLS, timeout, body read).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// The release carries no asset matching the data archive pattern.
    #[error("release {tag} has no asset matching {prefix}*{suffix}")]
    MissingAsset {
        tag: String,
        prefix: String,
        suffix: String,
    },

    /// The downloaded archive could not be unpacked.
    #[error("archive extraction failed: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document could not be parsed.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An error propagated from the record store.
    #[error("store error: {0}")]
    Store(#[from] encore_core::Error),

    /// A previous store operation panicked while holding the store.
    #[error("record store is unavailable")]
    StoreUnavailable,

    /// The progress consumer went away.
    #[error("import cancelled")]
    Cancelled,
}

impl ImportError {
    /// Returns `true` when the error is transient and the operation may
    /// succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Convenience alias for import results.
pub type ImportResult<T> = std::result::Result<T, ImportError>;
