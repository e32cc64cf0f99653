//! Domain types shared by the collector, the merger and the destination
//! writers.
//!
//! Source collections are modelled on the Kubernetes `ConfigMap` JSON shape so
//! the same struct serves as wire format for the API client and as the
//! in-memory value handed to the reconciliation engine.

use std::borrow::Borrow;
use std::collections::{btree_map, BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Separator between partition, collection name and key in an [`AggregateKey`].
pub const KEY_DELIMITER: char = '_';

/// Annotation key stamped on every resource-mode destination.
pub const OWNER_ANNOTATION: &str = "configmap-aggregator";

/// Value of [`OWNER_ANNOTATION`].
pub const OWNER_VALUE: &str = "target";

// ---------------------------------------------------------------------------
// ResourceId
// ---------------------------------------------------------------------------

/// Identity of a collection: its partition (namespace) and name.
///
/// Displayed and parsed as `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ResourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(format!("invalid resource '{s}'; expected <namespace>/<name>")),
        }
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Metadata carried by every collection.
///
/// Only the fields the aggregator reads or preserves are modelled; anything
/// else the API returns is ignored on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Opaque optimistic-concurrency token. Never interpreted, only copied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// A named, partition-scoped bundle of key/value data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    /// Key order carries no meaning.
    #[serde(default)]
    pub data: HashMap<String, String>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_kind() -> String {
    "ConfigMap".to_string()
}

impl Collection {
    /// An empty collection with the given identity.
    pub fn new(id: &ResourceId) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta {
                name: id.name.clone(),
                namespace: id.namespace.clone(),
                ..ObjectMeta::default()
            },
            data: HashMap::new(),
        }
    }

    /// Builder-style helper that adds a single data entry.
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::new(&self.metadata.namespace, &self.metadata.name)
    }

    /// True when this collection has exactly the given identity.
    pub fn is(&self, id: &ResourceId) -> bool {
        self.metadata.namespace == id.namespace && self.metadata.name == id.name
    }
}

// ---------------------------------------------------------------------------
// AggregateKey / AggregateSet
// ---------------------------------------------------------------------------

/// Composite `{partition}_{collection}_{key}` identifier.
///
/// The delimiter is not escaped: identifiers that contain `_` can collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateKey(String);

impl AggregateKey {
    pub fn new(partition: &str, collection: &str, key: &str) -> Self {
        Self(format!(
            "{partition}{KEY_DELIMITER}{collection}{KEY_DELIMITER}{key}"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Borrow<str> for AggregateKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AggregateKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The desired destination content for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AggregateSet(BTreeMap<AggregateKey, String>);

impl AggregateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the value it replaced, if any.
    pub fn insert(&mut self, key: AggregateKey, value: String) -> Option<String> {
        self.0.insert(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, AggregateKey, String> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &AggregateKey> {
        self.0.keys()
    }

    /// Flatten into the plain string map stored in a destination resource.
    pub fn to_data(&self) -> HashMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.clone()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a AggregateSet {
    type Item = (&'a AggregateKey, &'a String);
    type IntoIter = btree_map::Iter<'a, AggregateKey, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
