//! In-memory store implementations.
//!
//! Used by the engine's own tests and by downstream crates that need a
//! deterministic source or destination without a cluster or a disk. Each
//! store counts the mutations it receives so tests can assert on exact call
//! counts.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use aggregator_core::{Collection, ResourceId, StoreError};

use crate::notify::{Notifier, NotifyError};
use crate::store::{DirEntry, Fetched, FileStore, ResourceStore, SourceStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(what: &str) -> StoreError {
    StoreError::Status {
        code: 500,
        message: format!("injected {what} failure"),
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// A fixed set of collections, filtered by partition and label selector.
#[derive(Debug, Default)]
pub struct MemorySourceStore {
    collections: Mutex<Vec<Collection>>,
    failing: Mutex<BTreeSet<String>>,
    queries: Mutex<Vec<String>>,
}

impl MemorySourceStore {
    pub fn new(collections: Vec<Collection>) -> Self {
        Self {
            collections: Mutex::new(collections),
            ..Self::default()
        }
    }

    /// Replace the source snapshot returned by later calls.
    pub fn set(&self, collections: Vec<Collection>) {
        *lock(&self.collections) = collections;
    }

    /// Make every later query of `partition` fail.
    pub fn fail_partition(&self, partition: &str) {
        lock(&self.failing).insert(partition.to_string());
    }

    /// Partitions queried so far, in call order.
    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

impl SourceStore for MemorySourceStore {
    fn list(&self, partition: &str, selector: &str) -> Result<Vec<Collection>, StoreError> {
        lock(&self.queries).push(partition.to_string());
        if lock(&self.failing).contains(partition) {
            return Err(injected("list"));
        }
        Ok(lock(&self.collections)
            .iter()
            .filter(|c| partition.is_empty() || c.metadata.namespace == partition)
            .filter(|c| matches_selector(&c.metadata.labels, selector))
            .cloned()
            .collect())
    }
}

/// Equality-based label selector: `k=v`, `k==v`, `k!=v`, `k`, `!k`, comma-joined.
pub fn matches_selector(labels: &BTreeMap<String, String>, selector: &str) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|req| !req.is_empty())
        .all(|req| {
            if let Some((key, value)) = req.split_once("!=") {
                labels.get(key.trim()).map(String::as_str) != Some(value.trim())
            } else if let Some((key, value)) = req
                .split_once("==")
                .or_else(|| req.split_once('='))
            {
                labels.get(key.trim()).map(String::as_str) == Some(value.trim())
            } else if let Some(key) = req.strip_prefix('!') {
                !labels.contains_key(key.trim())
            } else {
                labels.contains_key(req)
            }
        })
}

// ---------------------------------------------------------------------------
// File tree
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryTree {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
    fail_writes: BTreeSet<PathBuf>,
    writes: usize,
    removes: usize,
}

/// A file tree held in memory.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    tree: Mutex<MemoryTree>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store containing the (empty) directory `root`.
    pub fn with_dir(root: impl AsRef<Path>) -> Self {
        let store = Self::new();
        store.mkdir(root);
        store
    }

    /// Create `path` and all of its ancestors.
    pub fn mkdir(&self, path: impl AsRef<Path>) {
        let mut tree = lock(&self.tree);
        for ancestor in path.as_ref().ancestors() {
            if !ancestor.as_os_str().is_empty() {
                tree.dirs.insert(ancestor.to_path_buf());
            }
        }
    }

    /// Seed a file without counting it as a write.
    pub fn put(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        lock(&self.tree)
            .files
            .insert(path.as_ref().to_path_buf(), contents.into());
    }

    /// Make every later write to `path` fail with `PermissionDenied`.
    pub fn fail_writes_to(&self, path: impl AsRef<Path>) {
        lock(&self.tree)
            .fail_writes
            .insert(path.as_ref().to_path_buf());
    }

    pub fn clear_write_failures(&self) {
        lock(&self.tree).fail_writes.clear();
    }

    /// Regular files directly under `root`, keyed by file name.
    pub fn files_in(&self, root: impl AsRef<Path>) -> BTreeMap<String, Vec<u8>> {
        let root = root.as_ref();
        lock(&self.tree)
            .files
            .iter()
            .filter(|(path, _)| path.parent() == Some(root))
            .filter_map(|(path, contents)| {
                path.file_name()
                    .map(|n| (n.to_string_lossy().into_owned(), contents.clone()))
            })
            .collect()
    }

    pub fn writes(&self) -> usize {
        lock(&self.tree).writes
    }

    pub fn removes(&self) -> usize {
        lock(&self.tree).removes
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

impl FileStore for MemoryFileStore {
    fn list_children(&self, root: &Path) -> io::Result<Vec<DirEntry>> {
        let tree = lock(&self.tree);
        if !tree.dirs.contains(root) {
            return Err(not_found(root));
        }
        let name_of = |path: &Path| path.file_name().map(|n| n.to_os_string());
        let dirs = tree
            .dirs
            .iter()
            .filter(|p| p.parent() == Some(root))
            .filter_map(|p| name_of(p).map(DirEntry::dir));
        let files = tree
            .files
            .keys()
            .filter(|p| p.parent() == Some(root))
            .filter_map(|p| name_of(p).map(DirEntry::file));
        let mut entries: Vec<DirEntry> = dirs.chain(files).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        lock(&self.tree)
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut tree = lock(&self.tree);
        if tree.fail_writes.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("write to {} denied", path.display()),
            ));
        }
        if tree.dirs.contains(path) {
            return Err(io::Error::other(format!(
                "{} is a directory",
                path.display()
            )));
        }
        match path.parent() {
            Some(parent) if tree.dirs.contains(parent) => {}
            Some(parent) => return Err(not_found(parent)),
            None => return Err(not_found(path)),
        }
        tree.files.insert(path.to_path_buf(), contents.to_vec());
        tree.writes += 1;
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let mut tree = lock(&self.tree);
        if tree.files.remove(path).is_none() {
            return Err(not_found(path));
        }
        tree.removes += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ResourceState {
    resources: BTreeMap<ResourceId, Collection>,
    version: u64,
    creates: Vec<Collection>,
    updates: Vec<Collection>,
    fail_get: bool,
}

impl ResourceState {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

/// A resource store with optimistic concurrency on the version token.
#[derive(Debug, Default)]
pub struct MemoryResourceStore {
    state: Mutex<ResourceState>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource, assigning a fresh version token. Not recorded as a create.
    pub fn insert(&self, mut resource: Collection) {
        let mut state = lock(&self.state);
        resource.metadata.resource_version = Some(state.next_version());
        state.resources.insert(resource.id(), resource);
    }

    /// Current stored value of `id`.
    pub fn stored(&self, id: &ResourceId) -> Option<Collection> {
        lock(&self.state).resources.get(id).cloned()
    }

    /// Simulate an external writer: bump the stored version token.
    pub fn touch(&self, id: &ResourceId) {
        let mut state = lock(&self.state);
        let version = state.next_version();
        if let Some(resource) = state.resources.get_mut(id) {
            resource.metadata.resource_version = Some(version);
        }
    }

    pub fn fail_get(&self, fail: bool) {
        lock(&self.state).fail_get = fail;
    }

    /// Every resource passed to `create`, in call order.
    pub fn creates(&self) -> Vec<Collection> {
        lock(&self.state).creates.clone()
    }

    /// Every resource passed to `update`, in call order.
    pub fn updates(&self) -> Vec<Collection> {
        lock(&self.state).updates.clone()
    }
}

impl ResourceStore for MemoryResourceStore {
    fn get(&self, id: &ResourceId) -> Result<Fetched, StoreError> {
        let state = lock(&self.state);
        if state.fail_get {
            return Err(injected("get"));
        }
        Ok(match state.resources.get(id) {
            Some(resource) => Fetched::Found(resource.clone()),
            None => Fetched::NotFound,
        })
    }

    fn create(&self, resource: &Collection) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.creates.push(resource.clone());
        let id = resource.id();
        if state.resources.contains_key(&id) {
            return Err(StoreError::Conflict { id });
        }
        let mut stored = resource.clone();
        stored.metadata.resource_version = Some(state.next_version());
        state.resources.insert(id, stored);
        Ok(())
    }

    fn update(&self, resource: &Collection) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.updates.push(resource.clone());
        let id = resource.id();
        let current = match state.resources.get(&id) {
            Some(existing) => existing.metadata.resource_version.clone(),
            None => {
                return Err(StoreError::Status {
                    code: 404,
                    message: format!("{id} not found"),
                })
            }
        };
        if current != resource.metadata.resource_version {
            return Err(StoreError::Conflict { id });
        }
        let mut stored = resource.clone();
        stored.metadata.resource_version = Some(state.next_version());
        state.resources.insert(id, stored);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Counts notifications instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make later notifications fail after being counted.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Status {
                url: "memory://notifier".to_string(),
                status: 503,
            });
        }
        Ok(())
    }
}
