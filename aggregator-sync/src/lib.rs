//! # aggregator-sync
//!
//! The reconciliation engine: collect source collections, merge them into one
//! [`AggregateSet`](aggregator_core::AggregateSet), bring the destination in
//! line with it and fire a change notification.
//!
//! Build an [`Aggregator`] and call [`Aggregator::run_cycle`] once per tick.

pub mod collect;
pub mod diff;
pub mod error;
pub mod fs_store;
pub mod memory;
pub mod merge;
pub mod notify;
pub mod pipeline;
pub mod store;
pub mod tree;
pub mod upsert;

pub use diff::FileDiff;
pub use error::SyncError;
pub use fs_store::OsFileStore;
pub use notify::{Notifier, NotifyError, WebhookNotifier};
pub use pipeline::{Aggregator, CycleReport, Target, TargetOutcome};
pub use store::{DirEntry, Fetched, FileStore, ResourceStore, SourceStore};
pub use tree::{FileAction, FileChange, TreeReport};
pub use upsert::UpsertOutcome;
