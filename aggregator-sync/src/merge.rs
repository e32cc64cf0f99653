//! Fold collections into one [`AggregateSet`].

use aggregator_core::{AggregateKey, AggregateSet, Collection};

/// Build the desired destination content from `collections`.
///
/// Colliding composite keys resolve last-write-wins in collection order.
pub fn merge(collections: &[Collection]) -> AggregateSet {
    let mut set = AggregateSet::new();
    for collection in collections {
        let meta = &collection.metadata;
        for (key, value) in &collection.data {
            let aggregate = AggregateKey::new(&meta.namespace, &meta.name, key);
            if set.insert(aggregate.clone(), value.clone()).is_some() {
                tracing::debug!(
                    "aggregate key {aggregate} overwritten by {}/{}",
                    meta.namespace,
                    meta.name
                );
            }
        }
    }
    set
}
