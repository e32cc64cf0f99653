//! Source collection: query each partition, drop the target itself.

use aggregator_core::{Collection, ResourceId};

use crate::error::SyncError;
use crate::store::SourceStore;

/// Query `partitions` in order and return every matching collection except
/// `exclude`.
///
/// An empty `partitions` slice queries every partition. The first failing
/// partition aborts the whole collection.
pub fn collect(
    source: &dyn SourceStore,
    partitions: &[String],
    selector: &str,
    exclude: Option<&ResourceId>,
) -> Result<Vec<Collection>, SyncError> {
    let all = [String::new()];
    let partitions = if partitions.is_empty() {
        &all[..]
    } else {
        partitions
    };

    let mut collected = Vec::new();
    for partition in partitions {
        let listed = source
            .list(partition, selector)
            .map_err(|source| SyncError::SourceQuery {
                partition: partition.clone(),
                source,
            })?;
        tracing::debug!(
            "partition '{}' selector '{}': {} collections",
            partition,
            selector,
            listed.len()
        );
        collected.extend(
            listed
                .into_iter()
                .filter(|c| exclude.map_or(true, |id| !c.is(id))),
        );
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySourceStore;

    fn cm(namespace: &str, name: &str) -> Collection {
        Collection::new(&ResourceId::new(namespace, name)).with_entry("k", "v")
    }

    #[test]
    fn empty_partition_list_queries_everything() {
        let source = MemorySourceStore::new(vec![cm("a", "x"), cm("b", "y")]);
        let collected = collect(&source, &[], "", None).unwrap();
        assert_eq!(collected.len(), 2);
        assert_eq!(source.queries(), vec![""]);
    }

    #[test]
    fn target_is_excluded() {
        let source = MemorySourceStore::new(vec![cm("default", "item1"), cm("default", "target")]);
        let target = ResourceId::new("default", "target");
        let collected = collect(&source, &[], "", Some(&target)).unwrap();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].metadata.name, "item1");
    }

    #[test]
    fn same_name_in_other_partition_is_kept() {
        let source = MemorySourceStore::new(vec![cm("default", "target"), cm("other", "target")]);
        let target = ResourceId::new("default", "target");
        let collected = collect(&source, &[], "", Some(&target)).unwrap();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].metadata.namespace, "other");
    }

    #[test]
    fn partitions_are_queried_in_order() {
        let source = MemorySourceStore::new(vec![cm("a", "x"), cm("b", "y")]);
        let partitions = vec!["b".to_string(), "a".to_string()];
        let collected = collect(&source, &partitions, "", None).unwrap();
        let names: Vec<_> = collected.iter().map(|c| c.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["y", "x"]);
    }

    #[test]
    fn failing_partition_aborts_with_partition_name() {
        let source = MemorySourceStore::new(vec![cm("a", "x"), cm("b", "y")]);
        source.fail_partition("a");
        let partitions = vec!["a".to_string(), "b".to_string()];
        let err = collect(&source, &partitions, "", None).unwrap_err();
        match err {
            SyncError::SourceQuery { partition, .. } => assert_eq!(partition, "a"),
            other => panic!("expected source query error, got {other:?}"),
        }
        assert_eq!(source.queries(), vec!["a"], "later partitions must not be queried");
    }
}
