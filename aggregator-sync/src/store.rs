//! Capabilities the engine consumes.
//!
//! Real implementations live in [`crate::fs_store`] and the `aggregator-kube`
//! crate; [`crate::memory`] provides in-memory ones for tests and previews.
//! Every capability is also implemented for `Arc<T>`, so a caller can keep a
//! handle on a store it hands to the engine.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::sync::Arc;

use aggregator_core::{Collection, ResourceId, StoreError};

/// Lists source collections.
pub trait SourceStore: Send + Sync {
    /// Collections in `partition` (`""` = every partition) matching `selector`.
    fn list(&self, partition: &str, selector: &str) -> Result<Vec<Collection>, StoreError>;
}

/// Result of looking up the destination resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Found(Collection),
    NotFound,
}

/// A store holding named resources, used as a single-resource destination.
pub trait ResourceStore: Send + Sync {
    fn get(&self, id: &ResourceId) -> Result<Fetched, StoreError>;
    fn create(&self, resource: &Collection) -> Result<(), StoreError>;
    /// Must fail with [`StoreError::Conflict`] when the version token is stale.
    fn update(&self, resource: &Collection) -> Result<(), StoreError>;
}

/// One immediate child of a directory.
///
/// The name is kept as the platform's raw file name so that entries which are
/// not valid UTF-8 can still be addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub is_dir: bool,
}

impl DirEntry {
    pub fn file(name: impl Into<OsString>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<OsString>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// Flat file-tree access used by the directory destination.
pub trait FileStore: Send + Sync {
    /// Immediate children of `root`; never recursive.
    fn list_children(&self, root: &Path) -> io::Result<Vec<DirEntry>>;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
    fn remove(&self, path: &Path) -> io::Result<()>;
}

impl<T: SourceStore + ?Sized> SourceStore for Arc<T> {
    fn list(&self, partition: &str, selector: &str) -> Result<Vec<Collection>, StoreError> {
        (**self).list(partition, selector)
    }
}

impl<T: ResourceStore + ?Sized> ResourceStore for Arc<T> {
    fn get(&self, id: &ResourceId) -> Result<Fetched, StoreError> {
        (**self).get(id)
    }

    fn create(&self, resource: &Collection) -> Result<(), StoreError> {
        (**self).create(resource)
    }

    fn update(&self, resource: &Collection) -> Result<(), StoreError> {
        (**self).update(resource)
    }
}

impl<T: FileStore + ?Sized> FileStore for Arc<T> {
    fn list_children(&self, root: &Path) -> io::Result<Vec<DirEntry>> {
        (**self).list_children(root)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        (**self).write(path, contents)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        (**self).remove(path)
    }
}
