pub mod check;
pub mod diff;
pub mod run;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use aggregator_core::config::load_at;
use aggregator_core::{AggregatorConfig, DestinationConfig, NotifyConfig, ResourceId};
use aggregator_kube::KubeClient;
use aggregator_sync::{OsFileStore, Target};

/// Flags shared by every command. Flags override values from `--config`.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// YAML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Namespace to query. Repeatable; default is all namespaces.
    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespaces: Vec<String>,

    /// Label selector.
    #[arg(short, long)]
    pub selector: Option<String>,

    /// Kubernetes API endpoint.
    #[arg(short, long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Use the pod's service account instead of --endpoint.
    #[arg(long, conflicts_with = "endpoint")]
    pub in_cluster: bool,

    /// Write one file per aggregated key into this directory.
    #[arg(long, value_name = "DIR", conflicts_with = "target")]
    pub output_dir: Option<PathBuf>,

    /// Aggregate into this ConfigMap.
    #[arg(long, value_name = "NS/NAME")]
    pub target: Option<ResourceId>,

    /// ConfigMap to leave out of a directory aggregation.
    #[arg(long, value_name = "NS/NAME", conflicts_with = "target")]
    pub exclude: Option<ResourceId>,

    /// URL to call after every cycle that changed the destination.
    #[arg(long, value_name = "URL")]
    pub webhook: Option<String>,

    /// HTTP method for --webhook.
    #[arg(long, value_name = "METHOD", requires = "webhook")]
    pub webhook_method: Option<String>,

    /// Time between cycles, e.g. `90`, `30s`, `5m`, `1h`.
    #[arg(short = 'i', long, value_name = "DURATION", value_parser = parse_interval)]
    pub sync_interval: Option<u64>,

    /// Report what would change without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl ConfigArgs {
    /// Merge the optional config file with the flags and validate the result.
    pub fn resolve(&self) -> Result<AggregatorConfig> {
        let mut config = match &self.config {
            Some(path) => load_at(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => match self.destination() {
                Some(destination) => AggregatorConfig::new(destination),
                None => bail!("no destination: pass --output-dir, --target or --config"),
            },
        };

        if let Some(destination) = self.destination() {
            config.destination = destination;
        } else if let Some(exclude) = &self.exclude {
            match &mut config.destination {
                DestinationConfig::Directory {
                    exclude: current, ..
                } => *current = Some(exclude.clone()),
                DestinationConfig::Resource { .. } => {
                    bail!("--exclude only applies to a directory destination")
                }
            }
        }

        if !self.namespaces.is_empty() {
            config.partitions = self.namespaces.clone();
        }
        if let Some(selector) = &self.selector {
            config.selector = selector.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
            config.in_cluster = false;
        }
        config.in_cluster |= self.in_cluster;
        if let Some(url) = &self.webhook {
            let mut notify = NotifyConfig::new(url.clone());
            if let Some(method) = &self.webhook_method {
                notify.method = method.to_ascii_uppercase();
            }
            config.notify = Some(notify);
        }
        if let Some(secs) = self.sync_interval {
            config.interval_secs = secs;
        }
        config.dry_run |= self.dry_run;

        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn destination(&self) -> Option<DestinationConfig> {
        if let Some(path) = &self.output_dir {
            return Some(DestinationConfig::Directory {
                path: path.clone(),
                exclude: self.exclude.clone(),
            });
        }
        self.target.as_ref().map(|id| DestinationConfig::Resource {
            namespace: id.namespace.clone(),
            name: id.name.clone(),
        })
    }
}

/// API client for `config`: in-cluster credentials or the plain endpoint.
pub fn client_for(config: &AggregatorConfig) -> Result<KubeClient> {
    if config.in_cluster {
        return KubeClient::in_cluster().context("failed to load in-cluster credentials");
    }
    Ok(KubeClient::new(&config.endpoint))
}

/// The destination handle for `config`, sharing `client` for resource mode.
pub fn target_for(config: &AggregatorConfig, client: &KubeClient) -> Target {
    match &config.destination {
        DestinationConfig::Directory { path, .. } => Target::directory(path.clone(), OsFileStore),
        DestinationConfig::Resource { namespace, name } => {
            Target::resource(ResourceId::new(namespace, name), client.clone())
        }
    }
}

/// Seconds from `90`, `90s`, `5m` or `1h`.
fn parse_interval(raw: &str) -> Result<u64, String> {
    let raw = raw.trim();
    let (digits, scale) = match raw.char_indices().last() {
        Some((i, 's')) => (&raw[..i], 1),
        Some((i, 'm')) => (&raw[..i], 60),
        Some((i, 'h')) => (&raw[..i], 3600),
        _ => (raw, 1),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{raw}'; expected e.g. 60, 30s, 5m, 1h"))?;
    if value == 0 {
        return Err("interval must be greater than zero".to_string());
    }
    value
        .checked_mul(scale)
        .ok_or_else(|| format!("duration '{raw}' is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_accepts_plain_seconds_and_suffixes() {
        assert_eq!(parse_interval("90"), Ok(90));
        assert_eq!(parse_interval("30s"), Ok(30));
        assert_eq!(parse_interval("5m"), Ok(300));
        assert_eq!(parse_interval("1h"), Ok(3600));
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("soon").is_err());
        assert!(parse_interval("").is_err());
    }

    #[test]
    fn flags_alone_build_a_directory_config() {
        let args = ConfigArgs {
            output_dir: Some(PathBuf::from("/tmp/out")),
            exclude: Some(ResourceId::new("default", "target")),
            namespaces: vec!["default".into(), "kube-system".into()],
            sync_interval: Some(5),
            ..ConfigArgs::default()
        };
        let config = args.resolve().expect("resolve");
        assert_eq!(config.partitions, vec!["default", "kube-system"]);
        assert_eq!(config.interval_secs, 5);
        assert_eq!(config.excluded(), Some(ResourceId::new("default", "target")));
    }

    #[test]
    fn webhook_method_is_normalised() {
        let args = ConfigArgs {
            target: Some(ResourceId::new("default", "target")),
            webhook: Some("http://127.0.0.1:9090/reload".into()),
            webhook_method: Some("put".into()),
            ..ConfigArgs::default()
        };
        let notify = args.resolve().expect("resolve").notify.expect("notify");
        assert_eq!(notify.method, "PUT");
    }

    #[test]
    fn exclude_with_resource_config_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("aggregator.yaml");
        std::fs::write(
            &path,
            "destination:\n  kind: resource\n  namespace: default\n  name: target\n",
        )
        .unwrap();
        let args = ConfigArgs {
            config: Some(path),
            exclude: Some(ResourceId::new("default", "other")),
            ..ConfigArgs::default()
        };
        let err = args.resolve().expect_err("exclude needs a directory");
        assert!(err.to_string().contains("--exclude"), "{err}");
    }

    #[test]
    fn endpoint_flag_overrides_in_cluster_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("aggregator.yaml");
        std::fs::write(
            &path,
            "in_cluster: true\ndestination:\n  kind: directory\n  path: /tmp/out\n",
        )
        .unwrap();
        let from_file = ConfigArgs {
            config: Some(path.clone()),
            ..ConfigArgs::default()
        };
        assert!(from_file.resolve().expect("resolve").in_cluster);

        let overridden = ConfigArgs {
            config: Some(path),
            endpoint: Some("http://127.0.0.1:8001".into()),
            ..ConfigArgs::default()
        };
        assert!(!overridden.resolve().expect("resolve").in_cluster);
    }

    #[test]
    fn missing_destination_is_rejected() {
        let err = ConfigArgs::default().resolve().expect_err("no destination");
        assert!(err.to_string().contains("no destination"));
    }
}
