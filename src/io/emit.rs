//! Emitters that deliver an encoded blob to a local destination.
//!
//! - [`StdoutEmitter`] -- writes the raw bytes to standard output
//! - [`WriterEmitter`] -- writes to any `Write` behind a mutex
//! - [`FileEmitter`] -- replaces a file with each blob
//! - [`DirectoryEmitter`] -- writes each blob to a new numbered file in a directory,
//!   never replacing a part that already exists

use crate::incremental::Emitter;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Writes every blob to standard output and flushes.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutEmitter;

impl Emitter for StdoutEmitter {
    fn emit(&self, data: &[u8]) -> Result<()> {
        let mut out = std::io::stdout().lock();
        out.write_all(data).context("write to stdout")?;
        out.flush().context("flush stdout")
    }
}

/// Appends every blob to a shared writer.
#[derive(Debug)]
pub struct WriterEmitter<W> {
    inner: Mutex<W>,
}

impl<W: Write + Send> WriterEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    /// Take the writer back.
    pub fn into_inner(self) -> W {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> Emitter for WriterEmitter<W> {
    fn emit(&self, data: &[u8]) -> Result<()> {
        let mut w = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        w.write_all(data).context("write emitted blob")?;
        w.flush().context("flush emitted blob")
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    Ok(())
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    create_parent(path)?;
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_to(f, path, data)
}

fn write_to(f: File, path: &Path, data: &[u8]) -> Result<()> {
    let mut w = BufWriter::new(f);
    w.write_all(data)
        .with_context(|| format!("write {} bytes to {}", data.len(), path.display()))?;
    w.flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

/// Overwrites one file with each blob. Parent directories are created as needed.
#[derive(Clone, Debug)]
pub struct FileEmitter {
    path: PathBuf,
}

impl FileEmitter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Emitter for FileEmitter {
    fn emit(&self, data: &[u8]) -> Result<()> {
        write_file(&self.path, data)?;
        tracing::debug!(path = %self.path.display(), bytes = data.len(), "blob written");
        Ok(())
    }
}

/// Writes each blob to `<dir>/<prefix>-<n>.<extension>`, with `n` counting up
/// from zero (zero-padded to 5 digits).
///
/// Parts are created exclusively. A number whose file already exists, say from
/// an earlier process writing to the same directory, is skipped, so a resumed
/// run adds new parts after the delivered ones instead of replacing them.
#[derive(Debug)]
pub struct DirectoryEmitter {
    dir: PathBuf,
    prefix: String,
    extension: String,
    next: AtomicU64,
}

impl DirectoryEmitter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.into(),
            next: AtomicU64::new(0),
        }
    }

    /// Start numbering at `n` instead of zero.
    #[must_use]
    pub fn starting_at(self, n: u64) -> Self {
        self.next.store(n, Ordering::Relaxed);
        self
    }

    fn part_path(&self, n: u64) -> PathBuf {
        self.dir
            .join(format!("{}-{n:05}.{}", self.prefix, self.extension))
    }
}

impl Emitter for DirectoryEmitter {
    fn emit(&self, data: &[u8]) -> Result<()> {
        loop {
            let n = self.next.fetch_add(1, Ordering::Relaxed);
            let path = self.part_path(n);
            create_parent(&path)?;
            let f = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(path = %path.display(), "part exists, skipping");
                    continue;
                }
                Err(e) => return Err(e).with_context(|| format!("create {}", path.display())),
            };
            write_to(f, &path, data)?;
            tracing::debug!(path = %path.display(), bytes = data.len(), "part written");
            return Ok(());
        }
    }
}
