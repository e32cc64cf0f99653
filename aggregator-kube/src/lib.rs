//! # aggregator-kube
//!
//! Kubernetes-backed [`SourceStore`](aggregator_sync::SourceStore) and
//! [`ResourceStore`](aggregator_sync::ResourceStore) for ConfigMaps.

pub mod client;
pub mod credentials;

pub use client::{CollectionList, KubeClient, DEFAULT_WAIT_ATTEMPTS, DEFAULT_WAIT_DELAY};
pub use credentials::{CredentialsError, ServiceAccount, SERVICE_ACCOUNT_DIR};
