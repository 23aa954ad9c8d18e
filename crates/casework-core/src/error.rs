//! Error types for casework-core

use thiserror::Error;

/// Result type alias using casework-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in casework-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The local store could not read or persist a record
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or malformed engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Binary upload phase failed
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Attach phase failed
    #[error("Attach failed: {0}")]
    AttachFailed(String),

    /// A network call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// No connectivity and no cached data to fall back to
    #[error("Offline and no cached data for {0}")]
    Offline(String),
}

impl Error {
    /// Whether the sync engine should keep the artifact queued and retry later.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::UploadFailed(_) | Self::AttachFailed(_) | Self::Timeout(_)
        )
    }
}
