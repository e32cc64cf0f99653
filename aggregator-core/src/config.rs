//! Aggregator configuration.
//!
//! One [`AggregatorConfig`] value is built per process, either from CLI flags
//! or from a YAML file (see [`load_at`]), and handed to the engine's
//! constructor. Nothing in the workspace keeps configuration in globals.
//!
//! ```yaml
//! partitions: [default, kube-system]
//! selector: app=web
//! destination:
//!   kind: resource
//!   namespace: default
//!   name: aggregated
//! notify:
//!   url: http://127.0.0.1:9090/reload
//! interval_secs: 60
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::types::ResourceId;

/// Address of a local `kubectl proxy`.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8001";

pub const DEFAULT_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_NOTIFY_METHOD: &str = "POST";

/// Where aggregated data is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DestinationConfig {
    /// A flat directory with one file per aggregate key.
    Directory {
        path: PathBuf,
        /// Collection skipped during collection, typically one this process
        /// also publishes elsewhere.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exclude: Option<ResourceId>,
    },
    /// A single named resource holding every aggregate key.
    Resource { namespace: String, name: String },
}

/// Outbound change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub url: String,
    #[serde(default = "default_notify_method")]
    pub method: String,
}

impl NotifyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_notify_method(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Partitions to query, in order. Empty means every partition.
    #[serde(default)]
    pub partitions: Vec<String>,
    /// Label selector passed through to the source store verbatim.
    #[serde(default)]
    pub selector: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Reach the API with the pod's service account instead of `endpoint`.
    #[serde(default)]
    pub in_cluster: bool,
    pub destination: DestinationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<NotifyConfig>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_notify_method() -> String {
    DEFAULT_NOTIFY_METHOD.to_string()
}

impl AggregatorConfig {
    /// A config with every optional field at its default.
    pub fn new(destination: DestinationConfig) -> Self {
        Self {
            partitions: Vec::new(),
            selector: String::new(),
            endpoint: default_endpoint(),
            in_cluster: false,
            destination,
            notify: None,
            interval_secs: DEFAULT_INTERVAL_SECS,
            dry_run: false,
        }
    }

    /// Partitions to query; `[""]` (all partitions) when none are configured.
    pub fn effective_partitions(&self) -> Vec<String> {
        if self.partitions.is_empty() {
            vec![String::new()]
        } else {
            self.partitions.clone()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Identity excluded from collection so the target never aggregates itself.
    pub fn excluded(&self) -> Option<ResourceId> {
        match &self.destination {
            DestinationConfig::Directory { exclude, .. } => exclude.clone(),
            DestinationConfig::Resource { namespace, name } => {
                Some(ResourceId::new(namespace, name))
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.destination {
            DestinationConfig::Directory { path, .. } if path.as_os_str().is_empty() => {
                return Err(ConfigError::Invalid(
                    "directory destination requires a path".into(),
                ));
            }
            DestinationConfig::Resource { namespace, name }
                if namespace.is_empty() || name.is_empty() =>
            {
                return Err(ConfigError::Invalid(
                    "resource destination requires a namespace and a name".into(),
                ));
            }
            _ => {}
        }

        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "interval_secs must be greater than zero".into(),
            ));
        }

        if !self.in_cluster {
            parse_http_url("endpoint", &self.endpoint)?;
        }

        if let Some(notify) = &self.notify {
            parse_http_url("notify url", &notify.url)?;
            if notify.method.is_empty() || !notify.method.chars().all(|c| c.is_ascii_alphabetic())
            {
                return Err(ConfigError::Invalid(format!(
                    "invalid notify method '{}'",
                    notify.method
                )));
            }
        }
        Ok(())
    }
}

fn parse_http_url(what: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::Invalid(format!("invalid {what} '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid(format!(
            "invalid {what} '{raw}': unsupported scheme '{other}'"
        ))),
    }
}

/// Load and validate a YAML config file.
///
/// Returns `ConfigError::Parse` (with path) if the YAML is malformed.
pub fn load_at(path: &Path) -> Result<AggregatorConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: AggregatorConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
    config.validate()?;
    Ok(config)
}

/// Render a config as YAML, e.g. for `configmap-aggregator check`.
pub fn to_yaml(config: &AggregatorConfig) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(config)?)
}
