//! Error types for aggregator-sync.

use std::path::PathBuf;

use thiserror::Error;

use aggregator_core::{ConfigError, ResourceId, StoreError};

use crate::notify::NotifyError;

/// Every failure that aborts a reconciliation cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Listing a partition failed; nothing from the other partitions is used.
    #[error("failed to list collections in partition '{partition}': {source}")]
    SourceQuery {
        partition: String,
        #[source]
        source: StoreError,
    },

    /// A file-tree destination read, write or remove failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A resource destination fetch, create or update failed.
    #[error("destination {id}: {source}")]
    Resource {
        id: ResourceId,
        #[source]
        source: StoreError,
    },

    /// The destination rejected an update carrying an outdated version token.
    #[error("destination {id} changed concurrently; retry on next cycle")]
    StaleVersion { id: ResourceId },

    #[error("notification failed: {0}")]
    Notification(#[from] NotifyError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Canonical content serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
