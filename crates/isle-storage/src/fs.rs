//! Filesystem storage implementation.
//!
//! Provides [`FsStorage`] for discovering page files below a pages directory
//! on the local filesystem and watching it for changes.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::{Duration, UNIX_EPOCH};

use glob::Pattern;
use notify::{RecursiveMode, Watcher};

use crate::debouncer::EventDebouncer;
use crate::event::{StorageEventKind, StorageEventReceiver, WatchHandle};
use crate::storage::{Storage, StorageError, StorageErrorKind};

/// Backend identifier for error messages.
const BACKEND: &str = "Fs";

/// Debounce window for watcher events.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Poll interval of the debouncer drain thread.
const DRAIN_INTERVAL: Duration = Duration::from_millis(50);

/// Filesystem storage implementation.
///
/// Scans a pages directory recursively for files with one of the configured
/// extensions. Hidden entries and `node_modules` are skipped.
///
/// # Example
///
/// ```ignore
/// use std::path::PathBuf;
/// use isle_storage::{FsStorage, Storage};
///
/// let storage = FsStorage::new(PathBuf::from("/site/src/pages"), vec!["md".to_owned()]);
/// let files = storage.scan()?;
/// ```
pub struct FsStorage {
    /// Root directory of page files.
    pages_dir: PathBuf,
    /// Recognized extensions, without leading dot.
    extensions: Vec<String>,
    /// Patterns for file watching (e.g., "**/*.md").
    watch_patterns: Vec<Pattern>,
}

impl FsStorage {
    /// Create a new filesystem storage.
    ///
    /// # Arguments
    ///
    /// * `pages_dir` - Root directory containing page files
    /// * `extensions` - Page file extensions without leading dot (e.g., `["md", "vue"]`)
    #[must_use]
    pub fn new(pages_dir: PathBuf, extensions: Vec<String>) -> Self {
        let watch_patterns = extensions
            .iter()
            .filter_map(|ext| Pattern::new(&format!("**/*.{}", Pattern::escape(ext))).ok())
            .collect();

        Self {
            pages_dir,
            extensions,
            watch_patterns,
        }
    }

    /// Root directory of page files.
    #[must_use]
    pub fn pages_dir(&self) -> &Path {
        &self.pages_dir
    }

    /// Validate that a path doesn't contain parent directory components.
    fn validate_path(path: &Path) -> Result<(), StorageError> {
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(StorageError::invalid_path(path).with_backend(BACKEND));
        }
        Ok(())
    }

    fn has_page_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    /// Scan directory recursively and collect page files.
    fn scan_directory(&self, dir_path: &Path, files: &mut Vec<PathBuf>) {
        let Ok(entries) = fs::read_dir(dir_path) else {
            return;
        };

        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }

            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            let path = entry.path();

            if is_dir {
                if name == "node_modules" {
                    continue;
                }
                self.scan_directory(&path, files);
            } else if self.has_page_extension(&path) {
                files.push(path);
            }
        }
    }

    /// Check whether a watcher path should produce an event.
    fn matches_patterns(path: &Path, pages_dir: &Path, patterns: &[Pattern]) -> bool {
        let Ok(relative) = path.strip_prefix(pages_dir) else {
            return false;
        };
        patterns.is_empty() || patterns.iter().any(|p| p.matches_path(relative))
    }
}

/// Map a notify event to per-path page events.
///
/// Renames become an unlink of the old path and an add of the new one.
fn page_events(event: notify::Event) -> Vec<(PathBuf, StorageEventKind)> {
    use notify::EventKind;
    use notify::event::{ModifyKind, RenameMode};

    let kind = match event.kind {
        EventKind::Create(_) => StorageEventKind::Add,
        EventKind::Remove(_) => StorageEventKind::Unlink,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => StorageEventKind::Unlink,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => StorageEventKind::Add,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            return paths
                .next()
                .map(|from| (from, StorageEventKind::Unlink))
                .into_iter()
                .chain(paths.next().map(|to| (to, StorageEventKind::Add)))
                .collect();
        }
        EventKind::Modify(_) => StorageEventKind::Change,
        _ => return Vec::new(),
    };
    event.paths.into_iter().map(|path| (path, kind)).collect()
}

impl Storage for FsStorage {
    fn scan(&self) -> Result<Vec<PathBuf>, StorageError> {
        if !self.pages_dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        self.scan_directory(&self.pages_dir, &mut files);
        files.sort();
        Ok(files)
    }

    fn read(&self, path: &Path) -> Result<String, StorageError> {
        Self::validate_path(path)?;
        fs::read_to_string(path)
            .map_err(|e| StorageError::io(e, path).with_backend(BACKEND))
    }

    fn exists(&self, path: &Path) -> bool {
        Self::validate_path(path).is_ok() && path.is_file()
    }

    fn mtime(&self, path: &Path) -> Result<f64, StorageError> {
        Self::validate_path(path)?;
        let metadata = fs::metadata(path)
            .map_err(|e| StorageError::io(e, path).with_backend(BACKEND))?;
        let modified = metadata
            .modified()
            .map_err(|e| StorageError::io(e, path).with_backend(BACKEND))?;
        Ok(modified
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64()))
    }

    fn watch(&self) -> Result<(StorageEventReceiver, WatchHandle), StorageError> {
        let (event_tx, event_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let debouncer = Arc::new(EventDebouncer::new(DEBOUNCE));

        let pages_dir = self.pages_dir.clone();
        let patterns = self.watch_patterns.clone();
        let debouncer_for_watcher = Arc::clone(&debouncer);

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "File watcher error");
                        return;
                    }
                };

                for (path, kind) in page_events(event) {
                    if !Self::matches_patterns(&path, &pages_dir, &patterns) {
                        continue;
                    }
                    tracing::debug!(path = %path.display(), %kind, "Recorded page event");
                    debouncer_for_watcher.record(path, kind);
                }
            })
            .map_err(|e| {
                StorageError::new(StorageErrorKind::Watch)
                    .with_backend(BACKEND)
                    .with_source(e)
            })?;

        watcher
            .watch(&self.pages_dir, RecursiveMode::Recursive)
            .map_err(|e| {
                StorageError::new(StorageErrorKind::Watch)
                    .with_backend(BACKEND)
                    .with_path(self.pages_dir.clone())
                    .with_source(e)
            })?;

        std::thread::spawn(move || {
            // Watching stops when the watcher is dropped with this thread
            let _watcher = watcher;

            loop {
                match shutdown_rx.recv_timeout(DRAIN_INTERVAL) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                }

                for event in debouncer.drain_ready() {
                    if event_tx.send(event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((StorageEventReceiver::new(event_rx), WatchHandle::new(shutdown_tx)))
    }
}
