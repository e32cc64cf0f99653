//! Single-resource destination: create or update one named collection.
//!
//! Labels, annotations and the version token already on the destination are
//! authoritative: they are copied onto the candidate before comparing, so
//! whatever an operator set by hand survives every cycle.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use sha2::{Digest, Sha256};

use aggregator_core::{
    AggregateSet, Collection, ResourceId, StoreError, OWNER_ANNOTATION, OWNER_VALUE,
};

use crate::error::SyncError;
use crate::store::{Fetched, ResourceStore};

/// What happened (or would happen) to the destination resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
    WouldCreate,
    WouldUpdate,
}

impl UpsertOutcome {
    /// True iff the destination was actually mutated.
    pub fn changed(self) -> bool {
        matches!(self, UpsertOutcome::Created | UpsertOutcome::Updated)
    }
}

/// The resource the aggregate set should be stored as, before merging
/// anything from the existing destination.
pub fn build_candidate(target: &ResourceId, desired: &AggregateSet) -> Collection {
    let mut candidate = Collection::new(target);
    candidate.data = desired.to_data();
    candidate
        .metadata
        .annotations
        .insert(OWNER_ANNOTATION.to_string(), OWNER_VALUE.to_string());
    candidate
}

/// Copy labels, annotations and the version token from `existing`.
///
/// Existing values win on key clashes; candidate-only keys are kept.
pub fn adopt_existing(candidate: &mut Collection, existing: &Collection) {
    for (k, v) in &existing.metadata.annotations {
        candidate.metadata.annotations.insert(k.clone(), v.clone());
    }
    for (k, v) in &existing.metadata.labels {
        candidate.metadata.labels.insert(k.clone(), v.clone());
    }
    candidate.metadata.resource_version = existing.metadata.resource_version.clone();
}

/// SHA-256 over the data map serialized as JSON with sorted keys.
pub fn content_digest(data: &HashMap<String, String>) -> Result<String, SyncError> {
    let sorted: BTreeMap<&str, &str> = data.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let canonical = serde_json::to_vec(&sorted)?;
    let mut h = Sha256::new();
    h.update(&canonical);
    Ok(hex::encode(h.finalize()))
}

/// True when both collections carry the same data mapping.
pub fn same_content(a: &Collection, b: &Collection) -> Result<bool, SyncError> {
    Ok(content_digest(&a.data)? == content_digest(&b.data)?)
}

/// Bring the resource `target` in line with `desired`.
pub fn upsert(
    store: &dyn ResourceStore,
    target: &ResourceId,
    desired: &AggregateSet,
    dry_run: bool,
) -> Result<UpsertOutcome, SyncError> {
    let mut candidate = build_candidate(target, desired);
    let resource_err = |source: StoreError| SyncError::Resource {
        id: target.clone(),
        source,
    };

    let existing = match store.get(target).map_err(resource_err)? {
        Fetched::NotFound => {
            if dry_run {
                tracing::info!("[dry-run] would create: {target}");
                return Ok(UpsertOutcome::WouldCreate);
            }
            store.create(&candidate).map_err(resource_err)?;
            tracing::info!("created: {target}");
            return Ok(UpsertOutcome::Created);
        }
        Fetched::Found(existing) => existing,
    };

    adopt_existing(&mut candidate, &existing);

    if same_content(&candidate, &existing)? {
        tracing::debug!("unchanged: {target}");
        return Ok(UpsertOutcome::Unchanged);
    }

    if dry_run {
        tracing::info!("[dry-run] would update: {target}");
        return Ok(UpsertOutcome::WouldUpdate);
    }

    store.update(&candidate).map_err(|source| match source {
        StoreError::Conflict { .. } => SyncError::StaleVersion { id: target.clone() },
        source => resource_err(source),
    })?;
    tracing::info!("updated: {target}");
    Ok(UpsertOutcome::Updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_core::AggregateKey;

    fn target() -> ResourceId {
        ResourceId::new("default", "target")
    }

    fn desired() -> AggregateSet {
        let mut set = AggregateSet::new();
        set.insert(AggregateKey::new("default", "item1", "foo.txt"), "1234567890".into());
        set
    }

    #[test]
    fn candidate_carries_identity_data_and_owner_marker() {
        let candidate = build_candidate(&target(), &desired());
        assert_eq!(candidate.id(), target());
        assert_eq!(
            candidate.data.get("default_item1_foo.txt").map(String::as_str),
            Some("1234567890")
        );
        assert_eq!(
            candidate.metadata.annotations.get(OWNER_ANNOTATION).map(String::as_str),
            Some(OWNER_VALUE)
        );
        assert!(candidate.metadata.resource_version.is_none());
    }

    #[test]
    fn existing_metadata_wins_on_conflict() {
        let mut candidate = build_candidate(&target(), &desired());
        candidate.metadata.labels.insert("only-candidate".into(), "c".into());

        let mut existing = Collection::new(&target());
        existing.metadata.labels.insert("team".into(), "platform".into());
        existing
            .metadata
            .annotations
            .insert(OWNER_ANNOTATION.into(), "hand-edited".into());
        existing.metadata.resource_version = Some("17".into());

        adopt_existing(&mut candidate, &existing);
        assert_eq!(candidate.metadata.labels.get("team").map(String::as_str), Some("platform"));
        assert_eq!(candidate.metadata.labels.get("only-candidate").map(String::as_str), Some("c"));
        assert_eq!(
            candidate.metadata.annotations.get(OWNER_ANNOTATION).map(String::as_str),
            Some("hand-edited")
        );
        assert_eq!(candidate.metadata.resource_version.as_deref(), Some("17"));
    }

    #[test]
    fn digest_ignores_insertion_order() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for i in 0..64 {
            a.insert(format!("key{i}"), format!("value{i}"));
        }
        for i in (0..64).rev() {
            b.insert(format!("key{i}"), format!("value{i}"));
        }
        assert_eq!(content_digest(&a).unwrap(), content_digest(&b).unwrap());
    }

    #[test]
    fn digest_distinguishes_key_value_boundaries() {
        let mut a = HashMap::new();
        a.insert("ab".to_string(), "c".to_string());
        let mut b = HashMap::new();
        b.insert("a".to_string(), "bc".to_string());
        assert_ne!(content_digest(&a).unwrap(), content_digest(&b).unwrap());
    }

    #[test]
    fn only_created_and_updated_count_as_changed() {
        assert!(UpsertOutcome::Created.changed());
        assert!(UpsertOutcome::Updated.changed());
        assert!(!UpsertOutcome::Unchanged.changed());
        assert!(!UpsertOutcome::WouldCreate.changed());
        assert!(!UpsertOutcome::WouldUpdate.changed());
    }
}
