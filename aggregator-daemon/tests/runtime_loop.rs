use std::sync::Arc;
use std::time::Duration;

use aggregator_core::{AggregatorConfig, Collection, DestinationConfig, ResourceId};
use aggregator_daemon::{run, run_loop, run_with_signal, DaemonError, LoopStats, RunMode};
use aggregator_sync::memory::{MemoryFileStore, MemorySourceStore, RecordingNotifier};
use aggregator_sync::{Aggregator, OsFileStore, SyncError, Target};
use tempfile::TempDir;
use tokio::sync::broadcast;

const ROOT: &str = "/srv/aggregated";

fn source() -> Arc<MemorySourceStore> {
    Arc::new(MemorySourceStore::new(vec![Collection::new(&ResourceId::new(
        "default", "item1",
    ))
    .with_entry("foo.txt", "1234567890")]))
}

fn aggregator(
    source: Arc<MemorySourceStore>,
) -> (Aggregator, Arc<MemoryFileStore>, Arc<RecordingNotifier>) {
    let files = Arc::new(MemoryFileStore::with_dir(ROOT));
    let notifier = Arc::new(RecordingNotifier::new());
    let config = AggregatorConfig::new(DestinationConfig::Directory {
        path: ROOT.into(),
        exclude: None,
    });
    let aggregator = Aggregator::new(&config, source, Target::directory(ROOT, Arc::clone(&files)))
        .expect("aggregator")
        .with_notifier(Arc::clone(&notifier));
    (aggregator, files, notifier)
}

#[tokio::test(flavor = "multi_thread")]
async fn pending_shutdown_stops_after_the_current_cycle() {
    let (aggregator, files, notifier) = aggregator(source());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    shutdown_tx.send(()).expect("queue shutdown");

    let stats = run_loop(Arc::new(aggregator), Duration::from_secs(3600), shutdown_rx)
        .await
        .expect("loop");

    assert_eq!(
        stats,
        LoopStats {
            cycles: 1,
            failures: 0,
            changes: 1
        }
    );
    assert_eq!(files.files_in(ROOT).len(), 1);
    assert_eq!(notifier.calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_cycles_notify_only_on_change() {
    let (aggregator, files, notifier) = aggregator(source());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = tokio::spawn(run_loop(
        Arc::new(aggregator),
        Duration::from_millis(10),
        shutdown_rx,
    ));
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.send(()).expect("shutdown");

    let stats = handle.await.expect("join").expect("loop");
    assert!(stats.cycles >= 2, "expected several cycles, got {stats:?}");
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.changes, 1);
    assert_eq!(files.writes(), 1);
    assert_eq!(notifier.calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn continuous_loop_survives_failing_cycles() {
    let failing = source();
    failing.fail_partition("");
    let (aggregator, files, notifier) = aggregator(failing);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = tokio::spawn(run_loop(
        Arc::new(aggregator),
        Duration::from_millis(10),
        shutdown_rx,
    ));
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.send(()).expect("shutdown");

    let stats = handle.await.expect("join").expect("loop");
    assert!(stats.cycles >= 2, "expected several cycles, got {stats:?}");
    assert_eq!(stats.failures, stats.cycles);
    assert_eq!(files.writes(), 0);
    assert_eq!(notifier.calls(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn once_mode_propagates_cycle_error() {
    let failing = source();
    failing.fail_partition("");
    let (aggregator, _, _) = aggregator(failing);

    let err = run(aggregator, RunMode::Once).await.expect_err("must fail");
    assert!(
        matches!(err, DaemonError::Sync(SyncError::SourceQuery { .. })),
        "{err:?}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn once_mode_writes_a_real_directory() {
    let dir = TempDir::new().expect("tempdir");
    let config = AggregatorConfig::new(DestinationConfig::Directory {
        path: dir.path().to_path_buf(),
        exclude: None,
    });
    let aggregator = Aggregator::new(&config, source(), Target::directory(dir.path(), OsFileStore))
        .expect("aggregator");

    let stats = run(aggregator, RunMode::Once).await.expect("run");
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.changes, 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("default_item1_foo.txt")).expect("read"),
        "1234567890"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn signal_listener_failure_stops_the_loop() {
    let (aggregator, files, _) = aggregator(source());
    let broken = async {
        Err::<&'static str, _>(std::io::Error::other("signal handlers unavailable"))
    };

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        run_with_signal(
            aggregator,
            RunMode::Continuous {
                interval: Duration::from_secs(3600),
            },
            broken,
        ),
    )
    .await
    .expect("loop must stop instead of running forever");

    let err = result.expect_err("listener failure is reported");
    assert!(matches!(err, DaemonError::Signal(_)), "{err:?}");
    assert_eq!(files.files_in(ROOT).len(), 1);
}
