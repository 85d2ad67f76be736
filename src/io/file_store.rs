//! Cursor storage in a local JSON file.
//!
//! The whole map is rewritten on every `set`: the new contents go to a temporary
//! file in the same directory, which then replaces the old file with a rename.
//! A crash mid-write leaves the previous cursors intact.

use crate::error::StateStoreError;
use crate::incremental::StateStore;
use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// A [`StateStore`] persisted as a JSON object of `run id -> cursor`.
///
/// A missing file is an empty store. Concurrent use from one process is
/// serialized by an internal lock; separate processes must not share a file.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> anyhow::Result<BTreeMap<String, String>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parse state file {}", self.path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e).with_context(|| format!("read state file {}", self.path.display())),
        }
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).with_context(|| format!("mkdir -p {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, entries).context("serialize cursors")?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all().context("sync state file")?;
        tmp.persist(&self.path)
            .with_context(|| format!("replace state file {}", self.path.display()))?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Result<String, StateStoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load()
            .map_err(StateStoreError::backend)?
            .remove(key)
            .ok_or_else(|| StateStoreError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StateStoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load().map_err(StateStoreError::backend)?;
        entries.insert(key.to_string(), value.to_string());
        self.store(&entries).map_err(StateStoreError::backend)
    }
}
