//! Crash-safe whole-file writes.
//!
//! [`AtomicFile::write_all`] writes to a uniquely-named temp file in the
//! target's directory (via the `tempfile` crate), then renames it over the
//! target path.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use bytes::Bytes;

use crate::{StorageError, StorageResult};

/// A file that is only ever replaced as a whole.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtomicFile {
    path: PathBuf,
}

impl AtomicFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Replace the file content with `data`.
    ///
    /// Missing parent directories are created.
    pub fn write_all(&self, data: &[u8]) -> StorageResult<()> {
        // Temp file must live on the same filesystem for rename to be atomic.
        let parent = self
            .path
            .parent()
            .ok_or_else(|| StorageError::Failed("atomic write: no parent dir".to_string()))?;
        fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| StorageError::Failed(format!("atomic write tmpfile: {e}")))?;

        tmp.write_all(data)
            .map_err(|e| StorageError::Failed(format!("atomic write: {e}")))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StorageError::Failed(format!("atomic sync: {e}")))?;

        // `persist()` renames over the target and disarms the auto-delete on drop.
        tmp.persist(&self.path)
            .map_err(|e| StorageError::Failed(format!("atomic rename: {e}")))?;

        tracing::trace!(path = %self.path.display(), bytes = data.len(), "atomic write committed");
        Ok(())
    }

    /// Read the whole file. A missing file reads as `None`.
    pub fn read(&self) -> StorageResult<Option<Bytes>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the file. Returns whether something was removed.
    pub fn remove(&self) -> StorageResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
