//! Error types for aggregator-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ResourceId;

/// Failures reported by a source or destination store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a response (connection refused, timeout, …).
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with a non-success status.
    #[error("unexpected status {code}: {message}")]
    Status { code: u16, message: String },

    /// An update carried a stale version token, or a create raced another writer.
    #[error("conflicting write to {id}")]
    Conflict { id: ResourceId },

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// All errors that can arise while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the offending file path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
