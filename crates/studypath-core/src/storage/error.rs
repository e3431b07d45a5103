use std::path::PathBuf;
use thiserror::Error;

use crate::roadmap::SchemaError;

/// Errors raised by a key/value store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded writing `{key}` ({needed} bytes, {limit} allowed)")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by the roadmap repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Roadmap not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The store rejected a write even after eviction.
    #[error("Storage is full: {0}")]
    StorageQuotaExceeded(String),

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => RepositoryError::StorageUnavailable(msg),
            quota @ StoreError::QuotaExceeded { .. } => {
                RepositoryError::StorageQuotaExceeded(quota.to_string())
            }
            other => RepositoryError::Store(other),
        }
    }
}

/// Outcome of a failed import.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}
