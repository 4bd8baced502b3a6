//! Coalescing of raw watcher events.
//!
//! Editors emit several notifications per save (truncate, write, chmod,
//! or write-to-temp then rename). Events are held per path for a quiet
//! window and merged, so each save reaches the page registry once.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::event::{StorageEvent, StorageEventKind};

/// Merge a pending event with a newer one for the same path.
///
/// `None` means the file appeared and vanished within the window, so nothing
/// is reported.
fn merge(pending: StorageEventKind, next: StorageEventKind) -> Option<StorageEventKind> {
    use StorageEventKind::{Add, Change, Unlink};

    match (pending, next) {
        (Add, Unlink) => None,
        // New file is still new, whatever else happens to it
        (Add, Add | Change) | (Change, Add) => Some(Add),
        (Change, Change) => Some(Change),
        // Replaced on disk
        (Unlink, Add) => Some(Change),
        (_, Unlink) | (Unlink, Change) => Some(Unlink),
    }
}

struct Pending {
    kind: StorageEventKind,
    ready_at: Instant,
}

/// Per-path event buffer shared between the watcher callback and the drain
/// thread.
pub(crate) struct EventDebouncer {
    window: Duration,
    pending: Mutex<BTreeMap<PathBuf, Pending>>,
}

impl EventDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    /// Buffer an event, restarting the quiet window of its path.
    pub fn record(&self, path: PathBuf, kind: StorageEventKind) {
        let ready_at = Instant::now() + self.window;
        let mut pending = self.pending.lock().unwrap();

        let merged = match pending.get(&path) {
            Some(existing) => merge(existing.kind, kind),
            None => Some(kind),
        };
        match merged {
            Some(kind) => {
                pending.insert(path, Pending { kind, ready_at });
            }
            None => {
                pending.remove(&path);
            }
        }
    }

    /// Take the events whose window has passed, ordered by path.
    pub fn drain_ready(&self) -> Vec<StorageEvent> {
        let now = Instant::now();
        let mut pending = self.pending.lock().unwrap();

        let ready: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, p)| p.ready_at <= now)
            .map(|(path, _)| path.clone())
            .collect();

        ready
            .into_iter()
            .filter_map(|path| {
                let Pending { kind, .. } = pending.remove(&path)?;
                Some(StorageEvent::new(path, kind))
            })
            .collect()
    }
}
