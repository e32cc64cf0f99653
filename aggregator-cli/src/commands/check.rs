//! `configmap-aggregator check`: validate and print the effective configuration.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use aggregator_core::config::to_yaml;
use aggregator_core::{AggregatorConfig, DestinationConfig};

use super::ConfigArgs;

/// Arguments for `configmap-aggregator check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Print the configuration as YAML, loadable with --config.
    #[arg(long, conflicts_with = "json")]
    pub yaml: bool,

    /// Print the configuration as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "setting")]
    setting: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.resolve()?;

        if self.yaml {
            print!("{}", to_yaml(&config).context("failed to render YAML")?);
            return Ok(());
        }
        if self.json {
            let json =
                serde_json::to_string_pretty(&config).context("failed to render JSON")?;
            println!("{json}");
            return Ok(());
        }

        let mut table = Table::new(rows(&config));
        table.with(Style::rounded());
        println!("{table}");
        println!("{} configuration is valid", "✓".green().bold());
        Ok(())
    }
}

fn rows(config: &AggregatorConfig) -> Vec<SettingRow> {
    let namespaces = if config.partitions.is_empty() {
        "(all)".to_string()
    } else {
        config.partitions.join(", ")
    };
    let destination = match &config.destination {
        DestinationConfig::Directory { path, .. } => format!("directory {}", path.display()),
        DestinationConfig::Resource { namespace, name } => {
            format!("configmap {namespace}/{name}")
        }
    };
    let endpoint = if config.in_cluster {
        "in-cluster service account".to_string()
    } else {
        config.endpoint.clone()
    };
    let excluded = config
        .excluded()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let notify = config
        .notify
        .as_ref()
        .map(|n| format!("{} {}", n.method, n.url))
        .unwrap_or_else(|| "-".to_string());

    vec![
        SettingRow { setting: "namespaces", value: namespaces },
        SettingRow { setting: "selector", value: config.selector.clone() },
        SettingRow { setting: "endpoint", value: endpoint },
        SettingRow { setting: "destination", value: destination },
        SettingRow { setting: "excluded", value: excluded },
        SettingRow { setting: "webhook", value: notify },
        SettingRow { setting: "interval", value: format!("{}s", config.interval_secs) },
        SettingRow { setting: "dry run", value: config.dry_run.to_string() },
    ]
}
