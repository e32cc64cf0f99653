//! Blocking ConfigMap client for the Kubernetes REST API.
//!
//! Two ways in: plain HTTP to an endpoint such as `kubectl proxy`, or
//! in-cluster with the pod's service account (bearer token over TLS pinned to
//! the cluster CA).

use std::fmt;
use std::thread;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use aggregator_core::{Collection, ResourceId, StoreError};
use aggregator_sync::{Fetched, ResourceStore, SourceStore};

use crate::credentials::{CredentialsError, ServiceAccount};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_WAIT_ATTEMPTS: u32 = 30;
pub const DEFAULT_WAIT_DELAY: Duration = Duration::from_secs(2);

/// Body of a `ConfigMapList` response.
#[derive(Debug, Default, Deserialize)]
pub struct CollectionList {
    #[serde(default)]
    pub items: Vec<Collection>,
}

/// The `Status` object the API server returns alongside error codes.
#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct KubeClient {
    agent: ureq::Agent,
    endpoint: String,
    token: Option<String>,
}

impl fmt::Debug for KubeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeClient")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl KubeClient {
    /// Unauthenticated client for `endpoint`.
    pub fn new(endpoint: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Client for the API server of the cluster this process runs in.
    pub fn in_cluster() -> Result<Self, CredentialsError> {
        Ok(Self::from_service_account(ServiceAccount::from_env()?))
    }

    pub fn from_service_account(account: ServiceAccount) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .tls_config(account.tls)
            .build();
        Self {
            agent,
            endpoint: account.endpoint,
            token: Some(account.token),
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let request = self.agent.request(method, url);
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    /// `""` addresses every namespace.
    fn collections_url(&self, namespace: &str) -> String {
        if namespace.is_empty() {
            format!("{}/api/v1/configmaps", self.endpoint)
        } else {
            format!("{}/api/v1/namespaces/{namespace}/configmaps", self.endpoint)
        }
    }

    fn resource_url(&self, id: &ResourceId) -> String {
        format!("{}/{}", self.collections_url(&id.namespace), id.name)
    }

    /// Poll `/version` until the API answers, up to `attempts` times.
    ///
    /// Returns the last failure when the API never became reachable.
    pub fn wait_for_api(&self, attempts: u32, delay: Duration) -> Result<(), StoreError> {
        let url = format!("{}/version", self.endpoint);
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.request("GET", &url).call() {
                Ok(_) => {
                    tracing::info!("kubernetes API reachable at {}", self.endpoint);
                    return Ok(());
                }
                Err(err) => {
                    let err = classify(err);
                    if attempt >= attempts {
                        return Err(err);
                    }
                    tracing::warn!("waiting for kubernetes API ({attempt}/{attempts}): {err}");
                }
            }
            attempt += 1;
            thread::sleep(delay);
        }
    }
}

impl SourceStore for KubeClient {
    fn list(&self, partition: &str, selector: &str) -> Result<Vec<Collection>, StoreError> {
        let mut request = self.request("GET", &self.collections_url(partition));
        if !selector.is_empty() {
            request = request.query("labelSelector", selector);
        }
        let list: CollectionList = decode(request.call().map_err(classify)?)?;
        tracing::debug!(
            "listed {} configmaps in {:?} (selector {selector:?})",
            list.items.len(),
            partition
        );
        Ok(list.items)
    }
}

impl ResourceStore for KubeClient {
    fn get(&self, id: &ResourceId) -> Result<Fetched, StoreError> {
        match self.request("GET", &self.resource_url(id)).call() {
            Ok(response) => Ok(Fetched::Found(decode(response)?)),
            Err(ureq::Error::Status(404, _)) => Ok(Fetched::NotFound),
            Err(err) => Err(classify(err)),
        }
    }

    fn create(&self, resource: &Collection) -> Result<(), StoreError> {
        let id = resource.id();
        self.request("POST", &self.collections_url(&id.namespace))
            .send_json(resource)
            .map_err(|err| write_error(id, err))?;
        Ok(())
    }

    fn update(&self, resource: &Collection) -> Result<(), StoreError> {
        let id = resource.id();
        self.request("PUT", &self.resource_url(&id))
            .send_json(resource)
            .map_err(|err| write_error(id, err))?;
        Ok(())
    }
}

fn classify(err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::Status(code, response) => StoreError::Status {
            code,
            message: status_message(response),
        },
        ureq::Error::Transport(transport) => StoreError::Transport(transport.to_string()),
    }
}

/// 409 is how the API server rejects both a stale `resourceVersion` and a
/// create of an existing name.
fn write_error(id: ResourceId, err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::Status(409, _) => StoreError::Conflict { id },
        err => classify(err),
    }
}

fn status_message(response: ureq::Response) -> String {
    let body = response.into_string().unwrap_or_default();
    match serde_json::from_str::<ApiStatus>(&body) {
        Ok(status) if !status.message.is_empty() => status.message,
        _ => body.trim().to_string(),
    }
}

fn decode<T: DeserializeOwned>(response: ureq::Response) -> Result<T, StoreError> {
    response
        .into_json()
        .map_err(|e| StoreError::Decode(e.to_string()))
}
