//! Durable YAML document storage
//!
//! A `DocumentStore` owns one structured document backed by one file. Reads
//! come from a lock-free in-memory snapshot; mutations run the full
//! read-modify-write-persist sequence under a per-store lock, writing
//! through a temp file and an atomic rename so a crash mid-write can never
//! truncate the target. A mutation only becomes visible to readers after
//! the file write has committed.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Error from a persisting operation.
///
/// Load-time problems are deliberately not represented here: a missing,
/// blank, or malformed file falls back to the document's default value so a
/// corrupt file can never prevent startup.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_yaml::Error),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single structured document persisted to a file.
///
/// The in-memory state is an immutable snapshot replaced wholesale on each
/// mutation. `current` never blocks; `mutate`/`update` serialize against
/// each other per store instance, so concurrent callers cannot lose each
/// other's changes.
pub struct DocumentStore<T> {
    path: PathBuf,
    snapshot: ArcSwap<T>,
    write_lock: Mutex<()>,
}

impl<T> DocumentStore<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static,
{
    /// Open the store, loading the file at `path` if it exists.
    ///
    /// A missing or blank file yields `T::default()`. A file that fails to
    /// decode is logged and likewise replaced by the default in memory; the
    /// file itself is left untouched until the next successful mutation.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = load_or_default(&path);
        Self {
            path,
            snapshot: ArcSwap::from_pointee(initial),
            write_lock: Mutex::new(()),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot of the document.
    pub fn current(&self) -> Arc<T> {
        self.snapshot.load_full()
    }

    /// Apply `transform` to the current state, persist the result, then
    /// publish it to readers.
    ///
    /// On persistence failure both the in-memory snapshot and the on-disk
    /// file keep their last good state and the error is returned.
    pub fn mutate<F>(&self, transform: F) -> Result<(), StoreError>
    where
        F: FnOnce(&T) -> T,
    {
        self.update(|state| Some(transform(state))).map(|_| ())
    }

    /// Conditional variant of [`mutate`](Self::mutate): `transform` may
    /// return `None` to signal "no change", in which case nothing is
    /// written and `Ok(false)` is returned. The decision runs under the
    /// same lock as the write, so check-then-write stays atomic.
    pub fn update<F>(&self, transform: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&T) -> Option<T>,
    {
        let _guard = self.write_lock.lock();

        let current = self.snapshot.load_full();
        let Some(next) = transform(current.as_ref()) else {
            return Ok(false);
        };

        self.persist(&next)?;
        self.snapshot.store(Arc::new(next));
        Ok(true)
    }

    /// Write `value` to the backing file via temp file + atomic rename.
    fn persist(&self, value: &T) -> Result<(), StoreError> {
        let text = serde_yaml::to_string(value)?;

        // The temp file must live in the target's directory so the rename
        // stays on one filesystem.
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let result: std::io::Result<()> = (|| {
            let mut tmp = NamedTempFile::new_in(dir)?;
            tmp.write_all(text.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&self.path).map_err(|e| e.error)?;
            Ok(())
        })();

        result.map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), "Document persisted");
        Ok(())
    }
}

fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read document, using defaults");
            return T::default();
        }
    };

    if text.trim().is_empty() {
        return T::default();
    }

    match serde_yaml::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to parse document, using defaults");
            T::default()
        }
    }
}
