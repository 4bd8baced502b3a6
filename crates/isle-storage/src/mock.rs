//! Mock storage implementation for testing.
//!
//! Provides [`MockStorage`] for unit testing without filesystem access.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, mpsc};

use crate::event::{StorageEvent, StorageEventKind, StorageEventReceiver, WatchHandle};
use crate::storage::{Storage, StorageError};

const BACKEND: &str = "Mock";

/// Mock storage for testing.
///
/// Stores file contents in memory keyed by absolute path. Use the builder
/// methods to configure the mock with test data, and the `set_*`/`remove_*`
/// methods together with `emit_*` to simulate edits after a scan.
///
/// # Example
///
/// ```ignore
/// use std::path::Path;
/// use isle_storage::{MockStorage, Storage};
///
/// let storage = MockStorage::new()
///     .with_file("/site/src/pages/about.md", "# About")
///     .with_mtime("/site/src/pages/about.md", 1_700_000_000.0);
///
/// let files = storage.scan().unwrap();
/// let content = storage.read(Path::new("/site/src/pages/about.md")).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct MockStorage {
    contents: RwLock<BTreeMap<PathBuf, String>>,
    mtimes: RwLock<BTreeMap<PathBuf, f64>>,
    event_sender: RwLock<Option<mpsc::Sender<StorageEvent>>>,
}

impl MockStorage {
    /// Create a new empty mock storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page file.
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.set_file(path, content);
        self
    }

    /// Set the mtime (seconds since the Unix epoch) reported for `path`.
    #[must_use]
    pub fn with_mtime(self, path: impl Into<PathBuf>, mtime: f64) -> Self {
        self.mtimes.write().unwrap().insert(path.into(), mtime);
        self
    }

    /// Create or overwrite a file in place.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.contents
            .write()
            .unwrap()
            .insert(path.into(), content.into());
    }

    /// Remove a file and its recorded mtime.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn remove_file(&self, path: &Path) {
        self.contents.write().unwrap().remove(path);
        self.mtimes.write().unwrap().remove(path);
    }

    /// Deliver `event` to the receiver of the last [`watch`](Storage::watch)
    /// call. Dropped when nothing is watching.
    pub fn emit(&self, event: StorageEvent) {
        if let Some(sender) = self.event_sender.read().unwrap().as_ref() {
            let _ = sender.send(event);
        }
    }

    pub fn emit_add(&self, path: impl Into<PathBuf>) {
        self.emit(StorageEvent::new(path, StorageEventKind::Add));
    }

    pub fn emit_change(&self, path: impl Into<PathBuf>) {
        self.emit(StorageEvent::new(path, StorageEventKind::Change));
    }

    pub fn emit_unlink(&self, path: impl Into<PathBuf>) {
        self.emit(StorageEvent::new(path, StorageEventKind::Unlink));
    }
}

impl Storage for MockStorage {
    fn scan(&self) -> Result<Vec<PathBuf>, StorageError> {
        Ok(self.contents.read().unwrap().keys().cloned().collect())
    }

    fn read(&self, path: &Path) -> Result<String, StorageError> {
        self.contents
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::not_found(path).with_backend(BACKEND))
    }

    fn exists(&self, path: &Path) -> bool {
        self.contents.read().unwrap().contains_key(path)
    }

    fn mtime(&self, path: &Path) -> Result<f64, StorageError> {
        if let Some(mtime) = self.mtimes.read().unwrap().get(path) {
            return Ok(*mtime);
        }
        // Files without an explicit mtime report the epoch
        if self.exists(path) {
            return Ok(0.0);
        }
        Err(StorageError::not_found(path).with_backend(BACKEND))
    }

    fn watch(&self) -> Result<(StorageEventReceiver, WatchHandle), StorageError> {
        let (tx, rx) = mpsc::channel();

        *self.event_sender.write().unwrap() = Some(tx);

        Ok((StorageEventReceiver::new(rx), WatchHandle::no_op()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::storage::StorageErrorKind;

    static_assertions::assert_impl_all!(MockStorage: Send, Sync);

    #[test]
    fn test_new_empty() {
        let storage = MockStorage::new();

        assert!(storage.scan().unwrap().is_empty());
    }

    #[test]
    fn test_scan_is_sorted() {
        let storage = MockStorage::new()
            .with_file("/pages/z.md", "")
            .with_file("/pages/a.md", "")
            .with_file("/pages/blog/index.tsx", "");

        assert_eq!(
            storage.scan().unwrap(),
            vec![
                PathBuf::from("/pages/a.md"),
                PathBuf::from("/pages/blog/index.tsx"),
                PathBuf::from("/pages/z.md"),
            ]
        );
    }

    #[test]
    fn test_read_and_exists() {
        let storage = MockStorage::new().with_file("/pages/about.md", "# About");

        assert!(storage.exists(Path::new("/pages/about.md")));
        assert_eq!(storage.read(Path::new("/pages/about.md")).unwrap(), "# About");
    }

    #[test]
    fn test_read_missing() {
        let storage = MockStorage::new();

        let err = storage.read(Path::new("/pages/missing.md")).unwrap_err();

        assert_eq!(err.kind, StorageErrorKind::NotFound);
        assert_eq!(err.backend, Some("Mock"));
    }

    #[test]
    fn test_set_and_remove_file() {
        let storage = MockStorage::new();

        storage.set_file("/pages/new.md", "v1");
        storage.set_file("/pages/new.md", "v2");
        assert_eq!(storage.read(Path::new("/pages/new.md")).unwrap(), "v2");

        storage.remove_file(Path::new("/pages/new.md"));
        assert!(!storage.exists(Path::new("/pages/new.md")));
    }

    #[test]
    fn test_mtime() {
        let storage = MockStorage::new()
            .with_file("/pages/a.md", "")
            .with_file("/pages/b.md", "")
            .with_mtime("/pages/a.md", 1_700_000_000.5);

        assert_eq!(storage.mtime(Path::new("/pages/a.md")).unwrap(), 1_700_000_000.5);
        assert_eq!(storage.mtime(Path::new("/pages/b.md")).unwrap(), 0.0);
        assert!(storage.mtime(Path::new("/pages/c.md")).is_err());
    }

    #[test]
    fn test_emit_without_watch_is_noop() {
        let storage = MockStorage::new();

        storage.emit_add("/pages/a.md");
    }

    #[test]
    fn test_watch_receives_emitted_events() {
        let storage = MockStorage::new();
        let (rx, _handle) = storage.watch().unwrap();

        storage.emit_add("/pages/a.md");
        storage.emit_change("/pages/a.md");
        storage.emit_unlink("/pages/a.md");

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                StorageEventKind::Add,
                StorageEventKind::Change,
                StorageEventKind::Unlink,
            ]
        );
    }
}
