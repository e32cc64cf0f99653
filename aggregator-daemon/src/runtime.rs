use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use aggregator_core::AggregatorConfig;
use aggregator_sync::{Aggregator, CycleReport, SyncError};

use crate::error::{io_err, DaemonError};

/// How many cycles to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One cycle; its error is the process result.
    Once,
    /// Cycle, wait `interval`, repeat until SIGINT/SIGTERM.
    Continuous { interval: Duration },
}

impl RunMode {
    pub fn for_config(config: &AggregatorConfig, onetime: bool) -> Self {
        if onetime {
            RunMode::Once
        } else {
            RunMode::Continuous {
                interval: config.interval(),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Counters accumulated over the lifetime of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    pub cycles: u64,
    pub failures: u64,
    pub changes: u64,
}

impl LoopStats {
    fn record(&mut self, result: &Result<CycleReport, SyncError>) {
        self.cycles += 1;
        match result {
            Ok(report) if report.changed => self.changes += 1,
            Ok(_) => {}
            Err(_) => self.failures += 1,
        }
    }
}

/// Start the runtime and block the current thread until it exits.
pub fn start_blocking(
    aggregator: Aggregator,
    mode: RunMode,
    format: LogFormat,
) -> Result<LoopStats, DaemonError> {
    init_tracing(format);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(aggregator, mode))
}

/// Drive `aggregator` according to `mode`, stopping on SIGINT or SIGTERM.
///
/// In continuous mode a signal task feeds the shutdown channel; cycle
/// failures are logged and counted, never returned.
pub async fn run(aggregator: Aggregator, mode: RunMode) -> Result<LoopStats, DaemonError> {
    run_with_signal(aggregator, mode, wait_for_signal()).await
}

/// [`run`] with the shutdown trigger supplied by the caller.
///
/// If `signal` fails the loop is stopped too and the failure is returned.
pub async fn run_with_signal<F>(
    aggregator: Aggregator,
    mode: RunMode,
    signal: F,
) -> Result<LoopStats, DaemonError>
where
    F: Future<Output = io::Result<&'static str>> + Send + 'static,
{
    let aggregator = Arc::new(aggregator);
    tracing::info!(destination = %aggregator.target_label(), mode = ?mode, "starting configmap-aggregator");

    let interval = match mode {
        RunMode::Once => {
            let mut stats = LoopStats::default();
            let result = cycle(aggregator).await?;
            stats.record(&result);
            result?;
            return Ok(stats);
        }
        RunMode::Continuous { interval } => interval,
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    // Subscribe before the signal task exists so an immediate failure is seen.
    let loop_rx = shutdown_tx.subscribe();
    let mut signal_rx = shutdown_tx.subscribe();
    let shutdown = shutdown_tx.clone();

    let signal_handle = tokio::spawn(async move {
        tokio::select! {
            _ = signal_rx.recv() => Ok(()),
            signal = signal => {
                let result = match signal {
                    Ok(name) => {
                        tracing::info!(signal = name, "shutdown signal received, exiting");
                        Ok(())
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "cannot listen for signals, stopping");
                        Err(DaemonError::Signal(err))
                    }
                };
                let _ = shutdown.send(());
                result
            }
        }
    });

    let stats = run_loop(aggregator, interval, loop_rx).await;
    let _ = shutdown_tx.send(());
    handle_join("signal_handler", signal_handle.await)?;
    stats
}

/// Run cycles until `shutdown_rx` fires.
///
/// A shutdown received while a cycle is in flight is observed once that
/// cycle finishes, so the destination is never left mid-write.
pub async fn run_loop(
    aggregator: Arc<Aggregator>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<LoopStats, DaemonError> {
    let mut stats = LoopStats::default();
    loop {
        let result = cycle(Arc::clone(&aggregator)).await?;
        stats.record(&result);

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    tracing::info!(
        cycles = stats.cycles,
        failures = stats.failures,
        changes = stats.changes,
        "aggregation loop stopped"
    );
    Ok(stats)
}

/// One cycle on the blocking pool. Only a panicked cycle is an outer error.
async fn cycle(aggregator: Arc<Aggregator>) -> Result<Result<CycleReport, SyncError>, DaemonError> {
    let result = tokio::task::spawn_blocking(move || aggregator.run_cycle())
        .await
        .map_err(|err| DaemonError::Join {
            task: "cycle",
            message: err.to_string(),
        })?;

    match &result {
        Ok(report) => tracing::info!(
            destination = %report.target,
            collections = report.collections,
            keys = report.keys,
            changed = report.changed,
            notified = report.notified,
            dry_run = report.dry_run,
            duration_ms = report.duration_ms as u64,
            "aggregation cycle complete"
        ),
        Err(err) => tracing::error!(error = %err, "failed to process config maps"),
    }
    Ok(result)
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join {
            task,
            message: err.to_string(),
        }),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = match format {
        LogFormat::Text => fmt().with_env_filter(filter).with_target(false).try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_core::{DestinationConfig, ResourceId};

    #[test]
    fn onetime_flag_selects_single_cycle() {
        let mut config = AggregatorConfig::new(DestinationConfig::Resource {
            namespace: "default".into(),
            name: "target".into(),
        });
        config.interval_secs = 5;
        assert_eq!(RunMode::for_config(&config, true), RunMode::Once);
        assert_eq!(
            RunMode::for_config(&config, false),
            RunMode::Continuous {
                interval: Duration::from_secs(5)
            }
        );
    }

    #[test]
    fn stats_count_changes_and_failures_separately() {
        let mut stats = LoopStats::default();
        stats.record(&Err(SyncError::StaleVersion {
            id: ResourceId::new("default", "target"),
        }));
        assert_eq!(
            stats,
            LoopStats {
                cycles: 1,
                failures: 1,
                changes: 0
            }
        );
    }
}
