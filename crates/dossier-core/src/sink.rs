//! Where rendered documents go.
//!
//! Writers never touch the filesystem directly; they hand finished documents
//! to a [`DocumentSink`]. [`FsSink`] is the production implementation,
//! [`MemorySink`] keeps everything in memory for tests and dry runs.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::NamedTempFile;

/// Destination for finished documents, keyed by path relative to the run root.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Persist `contents` at `relative`, replacing anything already there.
    async fn write(&self, relative: &Path, contents: String) -> io::Result<()>;
}

/// Filesystem sink rooted at a run directory.
///
/// Each document is written to a temp file in its target directory and then
/// renamed into place, so a reader never observes a half-written file.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DocumentSink for FsSink {
    async fn write(&self, relative: &Path, contents: String) -> io::Result<()> {
        let path = self.root.join(relative);
        tokio::task::spawn_blocking(move || {
            let dir = path.parent().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("document path {path:?} has no parent directory"),
                )
            })?;
            let mut tmp = NamedTempFile::new_in(dir)?;
            tmp.write_all(contents.as_bytes())?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: Mutex<BTreeMap<PathBuf, String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, relative: impl AsRef<Path>) -> Option<String> {
        self.lock().get(relative.as_ref()).cloned()
    }

    /// All written paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, String>> {
        // A poisoned map is still a consistent map: inserts are single calls.
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn write(&self, relative: &Path, contents: String) -> io::Result<()> {
        self.lock().insert(relative.to_path_buf(), contents);
        Ok(())
    }
}
