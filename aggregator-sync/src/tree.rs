//! File-tree destination: one file per aggregate key, directly under a root.
//!
//! ## Cycle protocol
//!
//! 1. [`snapshot`]: list the root's regular files (sub-directories are
//!    ignored) and read the ones the desired set still wants.
//! 2. [`plan`]: pure diff of snapshot against desired set.
//! 3. [`apply`]: perform writes, then deletes. The first I/O failure aborts;
//!    files already handled stay as they are and the next cycle converges.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::{OsStr, OsString};
use std::path::Path;

use serde::Serialize;

use aggregator_core::AggregateSet;

use crate::error::{io_err, SyncError};
use crate::store::FileStore;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The destination tree as observed at the start of a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    /// Names of every regular file directly under the root, as listed.
    pub files: BTreeSet<OsString>,
    /// Contents of the files that the desired set also produces.
    pub contents: BTreeMap<String, Vec<u8>>,
}

/// Observe `root`, loading only contents that the diff will compare.
pub fn snapshot(
    store: &dyn FileStore,
    root: &Path,
    desired: &AggregateSet,
) -> Result<TreeSnapshot, SyncError> {
    let entries = store.list_children(root).map_err(|e| io_err(root, e))?;

    let mut snap = TreeSnapshot::default();
    for entry in entries {
        if entry.is_dir {
            continue;
        }
        if let Some(name) = entry.name.to_str().filter(|n| desired.contains(n)) {
            let path = root.join(&entry.name);
            let contents = store.read(&path).map_err(|e| io_err(&path, e))?;
            snap.contents.insert(name.to_string(), contents);
        }
        snap.files.insert(entry.name);
    }
    Ok(snap)
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// One planned change to the tree.
///
/// Deletes carry the name exactly as listed: a stray file whose name is not
/// UTF-8 must still be removable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChange {
    Create { name: String, contents: Vec<u8> },
    Update { name: String, contents: Vec<u8> },
    Unchanged { name: String },
    Delete { name: OsString },
}

impl TreeChange {
    /// Display form of the file name.
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            TreeChange::Create { name, .. }
            | TreeChange::Update { name, .. }
            | TreeChange::Unchanged { name } => Cow::Borrowed(name),
            TreeChange::Delete { name } => name.to_string_lossy(),
        }
    }

    /// The on-disk file name to join onto the root.
    pub fn file_name(&self) -> &OsStr {
        match self {
            TreeChange::Create { name, .. }
            | TreeChange::Update { name, .. }
            | TreeChange::Unchanged { name } => OsStr::new(name),
            TreeChange::Delete { name } => name,
        }
    }

    pub fn action(&self) -> FileAction {
        match self {
            TreeChange::Create { .. } => FileAction::Created,
            TreeChange::Update { .. } => FileAction::Updated,
            TreeChange::Unchanged { .. } => FileAction::Unchanged,
            TreeChange::Delete { .. } => FileAction::Deleted,
        }
    }
}

/// Ordered list of changes: writes in key order, then deletes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreePlan {
    pub changes: Vec<TreeChange>,
}

impl TreePlan {
    pub fn has_mutations(&self) -> bool {
        self.changes
            .iter()
            .any(|c| !matches!(c, TreeChange::Unchanged { .. }))
    }
}

/// Diff `snapshot` against `desired`. Performs no I/O.
pub fn plan(snapshot: &TreeSnapshot, desired: &AggregateSet) -> TreePlan {
    let mut tracking = snapshot.files.clone();
    let mut changes = Vec::with_capacity(desired.len() + tracking.len());

    for (key, value) in desired {
        let name = key.as_str().to_string();
        if tracking.remove(OsStr::new(&name)) {
            match snapshot.contents.get(&name) {
                Some(existing) if existing.as_slice() == value.as_bytes() => {
                    changes.push(TreeChange::Unchanged { name });
                }
                _ => changes.push(TreeChange::Update {
                    name,
                    contents: value.as_bytes().to_vec(),
                }),
            }
        } else {
            changes.push(TreeChange::Create {
                name,
                contents: value.as_bytes().to_vec(),
            });
        }
    }

    // Whatever is still tracked is no longer produced by any source.
    changes.extend(tracking.into_iter().map(|name| TreeChange::Delete { name }));
    TreePlan { changes }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// What happened (or, in a dry run, would happen) to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Created,
    Updated,
    Unchanged,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub name: String,
    pub action: FileAction,
}

/// Outcome of synchronizing a file tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeReport {
    pub changes: Vec<FileChange>,
    pub dry_run: bool,
}

impl TreeReport {
    pub fn count(&self, action: FileAction) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }

    /// True iff at least one mutation was actually applied.
    pub fn changed(&self) -> bool {
        !self.dry_run && self.changes.iter().any(|c| c.action != FileAction::Unchanged)
    }
}

/// Execute `plan` against `root`.
pub fn apply(store: &dyn FileStore, root: &Path, plan: &TreePlan) -> Result<(), SyncError> {
    for change in &plan.changes {
        let path = root.join(change.file_name());
        match change {
            TreeChange::Create { contents, .. } | TreeChange::Update { contents, .. } => {
                store.write(&path, contents).map_err(|e| io_err(&path, e))?;
                tracing::info!("wrote: {}", path.display());
            }
            TreeChange::Delete { .. } => {
                store.remove(&path).map_err(|e| io_err(&path, e))?;
                tracing::info!("removed: {}", path.display());
            }
            TreeChange::Unchanged { .. } => {
                tracing::debug!("unchanged: {}", path.display());
            }
        }
    }
    Ok(())
}

/// Snapshot, plan and (unless `dry_run`) apply in one call.
pub fn sync_tree(
    store: &dyn FileStore,
    root: &Path,
    desired: &AggregateSet,
    dry_run: bool,
) -> Result<TreeReport, SyncError> {
    let snap = snapshot(store, root, desired)?;
    let plan = plan(&snap, desired);

    if dry_run {
        for change in plan.changes.iter().filter(|c| c.action() != FileAction::Unchanged) {
            tracing::info!("[dry-run] would {:?}: {}", change.action(), change.name());
        }
    } else {
        apply(store, root, &plan)?;
    }

    Ok(TreeReport {
        changes: plan
            .changes
            .iter()
            .map(|c| FileChange {
                name: c.name().to_string(),
                action: c.action(),
            })
            .collect(),
        dry_run,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
