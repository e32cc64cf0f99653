//! `configmap-aggregator diff`: show what the next cycle would change.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use aggregator_sync::Aggregator;

use super::{client_for, target_for, ConfigArgs};

/// Arguments for `configmap-aggregator diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.resolve()?;
        let client = client_for(&config)?;
        let target = target_for(&config, &client);
        let aggregator =
            Aggregator::new(&config, client, target).context("failed to configure aggregator")?;
        let label = aggregator.target_label();

        let diffs = aggregator
            .preview()
            .with_context(|| format!("diff failed for '{label}'"))?;

        if diffs.is_empty() {
            println!("No differences for '{label}'.");
            return Ok(());
        }

        for diff in &diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        println!(
            "{}",
            format!("{} pending change(s) for '{label}'", diffs.len()).yellow()
        );
        Ok(())
    }
}
