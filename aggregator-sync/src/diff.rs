//! Dry-run unified diff support for `configmap-aggregator diff`.

use std::collections::BTreeMap;
use std::path::Path;

use similar::TextDiff;

use aggregator_core::{AggregateSet, ResourceId};

use crate::error::{io_err, SyncError};
use crate::store::{Fetched, FileStore, ResourceStore};
use crate::tree::{plan, snapshot, TreeChange};
use crate::upsert::{build_candidate, same_content};

/// A single pending change rendered as a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub name: String,
    pub unified_diff: String,
}

/// Diff every planned create, update and delete under `root`.
///
/// No files are written.
pub fn preview_tree(
    store: &dyn FileStore,
    root: &Path,
    desired: &AggregateSet,
) -> Result<Vec<FileDiff>, SyncError> {
    let snap = snapshot(store, root, desired)?;
    let mut diffs = Vec::new();
    for change in plan(&snap, desired).changes {
        let (name, old, new) = match change {
            TreeChange::Unchanged { .. } => continue,
            TreeChange::Create { name, contents } => (name, String::new(), lossy(&contents)),
            TreeChange::Update { name, contents } => {
                let old = snap.contents.get(&name).map(|c| lossy(c)).unwrap_or_default();
                (name, old, lossy(&contents))
            }
            TreeChange::Delete { name } => {
                let path = root.join(&name);
                let old = store.read(&path).map_err(|e| io_err(&path, e))?;
                (name.to_string_lossy().into_owned(), lossy(&old), String::new())
            }
        };
        diffs.push(FileDiff {
            unified_diff: unified(&name, &old, &new),
            name,
        });
    }
    Ok(diffs)
}

/// Diff the data of the destination resource against the desired set.
///
/// Whether anything is pending is decided exactly as `upsert` decides it.
/// Entries are rendered one `key:` block per key, in key order.
pub fn preview_resource(
    store: &dyn ResourceStore,
    target: &ResourceId,
    desired: &AggregateSet,
) -> Result<Vec<FileDiff>, SyncError> {
    let candidate = build_candidate(target, desired);
    let existing = match store.get(target).map_err(|source| SyncError::Resource {
        id: target.clone(),
        source,
    })? {
        Fetched::Found(existing) if same_content(&candidate, &existing)? => {
            return Ok(Vec::new())
        }
        Fetched::Found(existing) => render_data(&existing.data.into_iter().collect()),
        Fetched::NotFound => String::new(),
    };
    let wanted = render_data(&candidate.data.into_iter().collect());
    let name = target.to_string();
    Ok(vec![FileDiff {
        unified_diff: unified(&name, &existing, &wanted),
        name,
    }])
}

/// Line terminators are kept, so `\r\n` and trailing newlines show up.
fn render_data(data: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in data {
        out.push_str(key);
        out.push_str(":\n");
        for line in value.split_inclusive('\n') {
            out.push_str("  ");
            out.push_str(line);
        }
        if !value.is_empty() && !value.ends_with('\n') {
            out.push_str("\n  \\ no newline at end of value\n");
        }
    }
    out
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn unified(name: &str, old: &str, new: &str) -> String {
    let old_header = format!("a/{name}");
    let new_header = format!("b/{name}");
    TextDiff::from_lines(old, new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string()
}
