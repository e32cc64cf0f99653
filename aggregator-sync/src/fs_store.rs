//! [`FileStore`] backed by the local filesystem.
//!
//! Writes go to a fresh temporary file beside the destination and are renamed
//! into place, so a reader never observes a half-written file. The temporary
//! name contains `~`, which no ConfigMap key may contain, and is created
//! exclusively, so it can never clobber a managed file. One left behind by a
//! crash is an unmanaged regular file and is removed by the next cycle.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::store::{DirEntry, FileStore};

/// Prefix of the temporary files created by [`OsFileStore::write`].
pub const TMP_PREFIX: &str = ".~aggregator-";

#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileStore;

impl OsFileStore {
    pub fn new() -> Self {
        Self
    }
}

impl FileStore for OsFileStore {
    fn list_children(&self, root: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let is_dir = entry.file_type()?.is_dir();
            entries.push(DirEntry {
                name: entry.file_name(),
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .tempfile_in(dir)?;
        tmp.write_all(contents)?;
        // On failure the returned handle is dropped, which deletes the tmp file.
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}
