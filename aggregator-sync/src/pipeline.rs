//! One reconciliation cycle: collect → merge → sync/upsert → notify.
//!
//! [`Aggregator`] is the canonical entrypoint for both the one-shot CLI and
//! the continuous runtime. It holds no state between cycles besides its
//! configuration and store handles.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use aggregator_core::{AggregateSet, AggregatorConfig, ResourceId};

use crate::collect::collect;
use crate::diff::{preview_resource, preview_tree, FileDiff};
use crate::error::SyncError;
use crate::merge::merge;
use crate::notify::{Notifier, WebhookNotifier};
use crate::store::{FileStore, ResourceStore, SourceStore};
use crate::tree::{sync_tree, TreeReport};
use crate::upsert::{upsert, UpsertOutcome};

/// Destination handle paired with its identity.
pub enum Target {
    Directory {
        root: PathBuf,
        store: Box<dyn FileStore>,
    },
    Resource {
        id: ResourceId,
        store: Box<dyn ResourceStore>,
    },
}

impl Target {
    pub fn directory(root: impl Into<PathBuf>, store: impl FileStore + 'static) -> Self {
        Target::Directory {
            root: root.into(),
            store: Box::new(store),
        }
    }

    pub fn resource(id: ResourceId, store: impl ResourceStore + 'static) -> Self {
        Target::Resource {
            id,
            store: Box::new(store),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Target::Directory { root, .. } => root.display().to_string(),
            Target::Resource { id, .. } => id.to_string(),
        }
    }
}

/// Destination-specific result of a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TargetOutcome {
    Directory(TreeReport),
    Resource { outcome: UpsertOutcome },
}

impl TargetOutcome {
    pub fn changed(&self) -> bool {
        match self {
            TargetOutcome::Directory(report) => report.changed(),
            TargetOutcome::Resource { outcome } => outcome.changed(),
        }
    }
}

/// Summary of one cycle, for logging and CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
    pub collections: usize,
    pub keys: usize,
    pub outcome: TargetOutcome,
    pub changed: bool,
    pub notified: bool,
    pub dry_run: bool,
}

/// The reconciliation engine.
pub struct Aggregator {
    partitions: Vec<String>,
    selector: String,
    exclude: Option<ResourceId>,
    dry_run: bool,
    source: Box<dyn SourceStore>,
    target: Target,
    notifier: Option<Box<dyn Notifier>>,
}

impl Aggregator {
    /// Validate `config` and wire the engine.
    ///
    /// A webhook notifier is created from `config.notify` when present; use
    /// [`Aggregator::with_notifier`] to substitute another one.
    pub fn new(
        config: &AggregatorConfig,
        source: impl SourceStore + 'static,
        target: Target,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let exclude = match &target {
            Target::Resource { id, .. } => Some(id.clone()),
            Target::Directory { .. } => config.excluded(),
        };
        let notifier = config
            .notify
            .as_ref()
            .map(|n| Box::new(WebhookNotifier::from_config(n)) as Box<dyn Notifier>);
        Ok(Self {
            partitions: config.effective_partitions(),
            selector: config.selector.clone(),
            exclude,
            dry_run: config.dry_run,
            source: Box::new(source),
            target,
            notifier,
        })
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn target_label(&self) -> String {
        self.target.label()
    }

    /// Collect and merge the current source snapshot.
    pub fn desired(&self) -> Result<(usize, AggregateSet), SyncError> {
        let collections = collect(
            self.source.as_ref(),
            &self.partitions,
            &self.selector,
            self.exclude.as_ref(),
        )?;
        Ok((collections.len(), merge(&collections)))
    }

    /// Run one full cycle.
    pub fn run_cycle(&self) -> Result<CycleReport, SyncError> {
        let started_at = Utc::now();
        let started = Instant::now();

        let (collections, desired) = self.desired()?;

        let outcome = match &self.target {
            Target::Directory { root, store } => TargetOutcome::Directory(sync_tree(
                store.as_ref(),
                root,
                &desired,
                self.dry_run,
            )?),
            Target::Resource { id, store } => TargetOutcome::Resource {
                outcome: upsert(store.as_ref(), id, &desired, self.dry_run)?,
            },
        };

        let changed = outcome.changed();
        let notified = match (&self.notifier, changed) {
            (Some(notifier), true) => {
                notifier.notify()?;
                true
            }
            _ => false,
        };

        Ok(CycleReport {
            target: self.target.label(),
            started_at,
            duration_ms: started.elapsed().as_millis(),
            collections,
            keys: desired.len(),
            outcome,
            changed,
            notified,
            dry_run: self.dry_run,
        })
    }

    /// Unified diffs of what the next cycle would change. Writes nothing.
    pub fn preview(&self) -> Result<Vec<FileDiff>, SyncError> {
        let (_, desired) = self.desired()?;
        match &self.target {
            Target::Directory { root, store } => preview_tree(store.as_ref(), root, &desired),
            Target::Resource { id, store } => preview_resource(store.as_ref(), id, &desired),
        }
    }
}
