//! configmap-aggregator: merge many ConfigMaps into one directory or ConfigMap.
//!
//! # Usage
//!
//! ```text
//! configmap-aggregator run   (--output-dir <dir> | --target <ns/name> | --config <file>) [-n <ns>]... [-s <selector>] [-o]
//! configmap-aggregator diff  (--output-dir <dir> | --target <ns/name> | --config <file>)
//! configmap-aggregator check (--output-dir <dir> | --target <ns/name> | --config <file>) [--yaml | --json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, diff::DiffArgs, run::RunArgs};

#[derive(Parser, Debug)]
#[command(
    name = "configmap-aggregator",
    version,
    about = "Aggregate multiple ConfigMaps into a directory or a single ConfigMap",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile once (--onetime) or every --sync-interval until interrupted.
    Run(RunArgs),

    /// Show unified diffs of what the next cycle would change.
    Diff(DiffArgs),

    /// Validate the effective configuration and print it.
    Check(CheckArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Check(args) => args.run(),
    }
}
