//! Page change events delivered by [`Storage::watch`](crate::Storage::watch).

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc;

/// What happened to a page file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageEventKind {
    Add,
    Change,
    Unlink,
}

impl StorageEventKind {
    /// Event name as used by dev server logs (`add`, `change`, `unlink`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Unlink => "unlink",
        }
    }
}

impl fmt::Display for StorageEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change to one page file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    /// Absolute path of the file.
    pub path: PathBuf,
    pub kind: StorageEventKind,
}

impl StorageEvent {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, kind: StorageEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Blocking stream of [`StorageEvent`]s.
///
/// Ends once the watcher behind it is gone.
pub struct StorageEventReceiver {
    rx: mpsc::Receiver<StorageEvent>,
}

impl StorageEventReceiver {
    pub(crate) fn new(rx: mpsc::Receiver<StorageEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event. `None` once the watcher is gone.
    #[must_use]
    pub fn recv(&self) -> Option<StorageEvent> {
        self.rx.recv().ok()
    }

    /// Next event if one is queued.
    #[must_use]
    pub fn try_recv(&self) -> Option<StorageEvent> {
        self.rx.try_recv().ok()
    }

    /// Blocking iterator over events.
    pub fn iter(&self) -> impl Iterator<Item = StorageEvent> + '_ {
        self.rx.iter()
    }

    /// Receiver whose stream is already closed.
    pub(crate) fn no_op() -> Self {
        let (_tx, rx) = mpsc::channel();
        Self { rx }
    }
}

/// Keeps a watcher running; dropping it (or calling [`stop`](Self::stop))
/// shuts the watcher down.
pub struct WatchHandle {
    _shutdown: Option<mpsc::Sender<()>>,
}

impl WatchHandle {
    pub(crate) fn new(shutdown: mpsc::Sender<()>) -> Self {
        Self {
            _shutdown: Some(shutdown),
        }
    }

    /// Stop watching now.
    pub fn stop(mut self) {
        self._shutdown.take();
    }

    /// Handle for a backend without a watcher.
    pub(crate) fn no_op() -> Self {
        Self { _shutdown: None }
    }
}
