//! Core library for configmap-aggregator: domain types, configuration and errors.
//!
//! - [`types`]: collections, identities, aggregate keys
//! - [`config`]: [`AggregatorConfig`] and its YAML loader
//! - [`error`]: [`StoreError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{AggregatorConfig, DestinationConfig, NotifyConfig};
pub use error::{ConfigError, StoreError};
pub use types::{
    AggregateKey, AggregateSet, Collection, ObjectMeta, ResourceId, KEY_DELIMITER,
    OWNER_ANNOTATION, OWNER_VALUE,
};
