//! `configmap-aggregator run`: reconcile once or continuously.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use aggregator_daemon::{init_tracing, start_blocking, LogFormat, LoopStats, RunMode};
use aggregator_kube::{DEFAULT_WAIT_ATTEMPTS, DEFAULT_WAIT_DELAY};
use aggregator_sync::Aggregator;

use super::{client_for, target_for, ConfigArgs};

/// Arguments for `configmap-aggregator run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Run one cycle and exit.
    #[arg(short = 'o', long)]
    pub onetime: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,

    /// How many times to poll the API before giving up.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_WAIT_ATTEMPTS)]
    pub wait_attempts: u32,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.resolve()?;
        let format = if self.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Text
        };
        init_tracing(format);

        let client = client_for(&config)?;
        client
            .wait_for_api(self.wait_attempts, DEFAULT_WAIT_DELAY)
            .with_context(|| {
                format!("kubernetes API at {} never became reachable", client.endpoint())
            })?;

        let target = target_for(&config, &client);
        let aggregator =
            Aggregator::new(&config, client, target).context("failed to configure aggregator")?;
        let label = aggregator.target_label();

        let stats = start_blocking(aggregator, RunMode::for_config(&config, self.onetime), format)
            .with_context(|| format!("aggregation into '{label}' failed"))?;

        print_summary(&label, &stats, config.dry_run);
        Ok(())
    }
}

fn print_summary(label: &str, stats: &LoopStats, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let mark = if stats.failures == 0 {
        "✓".green().bold()
    } else {
        "!".yellow().bold()
    };
    println!(
        "{prefix}{mark} '{label}': {} cycle(s), {} changed, {} failed",
        stats.cycles, stats.changes, stats.failures
    );
}
