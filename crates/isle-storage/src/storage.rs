//! Storage trait and error types.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::event::{StorageEventReceiver, WatchHandle};

/// What went wrong while accessing page sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageErrorKind {
    /// Page file does not exist.
    NotFound,
    /// Page file or directory is not readable.
    PermissionDenied,
    /// Path escapes the pages directory.
    InvalidPath,
    /// Page content is not valid UTF-8.
    InvalidEncoding,
    /// Change notification could not be set up.
    Watch,
    /// Anything else.
    Other,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "Not found",
            Self::PermissionDenied => "Permission denied",
            Self::InvalidPath => "Invalid path",
            Self::InvalidEncoding => "Invalid UTF-8",
            Self::Watch => "Watch failed",
            Self::Other => "Storage error",
        })
    }
}

/// Whether retrying the same operation may succeed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ErrorStatus {
    #[default]
    Permanent,
    /// Interrupted read or a file caught mid-save.
    Temporary,
}

/// Error returned by [`Storage`] backends.
///
/// Built with [`new`](Self::new) or one of the shortcuts and refined with the
/// `with_*` methods.
#[derive(Debug)]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub status: ErrorStatus,
    /// Page file the operation was about.
    pub path: Option<PathBuf>,
    /// Backend name ("Fs", "Mock").
    pub backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    #[must_use]
    pub fn new(kind: StorageErrorKind) -> Self {
        Self {
            kind,
            status: ErrorStatus::default(),
            path: None,
            backend: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Page file `path` does not exist.
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::new(StorageErrorKind::NotFound).with_path(path)
    }

    /// `path` points outside the pages directory.
    #[must_use]
    pub fn invalid_path(path: impl Into<PathBuf>) -> Self {
        Self::new(StorageErrorKind::InvalidPath).with_path(path)
    }

    /// Classify an I/O error raised while accessing `path`.
    #[must_use]
    pub fn io(err: io::Error, path: &Path) -> Self {
        let (kind, status) = match err.kind() {
            io::ErrorKind::NotFound => (StorageErrorKind::NotFound, ErrorStatus::Permanent),
            io::ErrorKind::PermissionDenied => {
                (StorageErrorKind::PermissionDenied, ErrorStatus::Permanent)
            }
            // read_to_string reports bad UTF-8 as InvalidData
            io::ErrorKind::InvalidData => {
                (StorageErrorKind::InvalidEncoding, ErrorStatus::Temporary)
            }
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => {
                (StorageErrorKind::Other, ErrorStatus::Temporary)
            }
            _ => (StorageErrorKind::Other, ErrorStatus::Permanent),
        };
        Self::new(kind)
            .with_status(status)
            .with_path(path)
            .with_source(err)
    }

    /// Whether retrying may succeed.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.status == ErrorStatus::Temporary
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // "Not found /site/pages/a.md: No such file (Fs backend)"
        write!(f, "{}", self.kind)?;
        if let Some(path) = &self.path {
            write!(f, " {}", path.display())?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        if let Some(backend) = self.backend {
            write!(f, " ({backend} backend)")?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

/// Source of page files.
///
/// Every path going in or out is absolute. [`scan`](Storage::scan) returns
/// candidates only; the page registry decides what is a page.
pub trait Storage: Send + Sync {
    /// All page candidates below the pages directory, sorted.
    fn scan(&self) -> Result<Vec<PathBuf>, StorageError>;

    /// Content of a page file.
    fn read(&self, path: &Path) -> Result<String, StorageError>;

    /// Whether a page file exists. Errors count as missing.
    fn exists(&self, path: &Path) -> bool;

    /// Modification time in seconds since the Unix epoch.
    fn mtime(&self, path: &Path) -> Result<f64, StorageError>;

    /// Subscribe to add/change/unlink events.
    ///
    /// Backends without change notification keep the default, which never
    /// yields an event.
    fn watch(&self) -> Result<(StorageEventReceiver, WatchHandle), StorageError> {
        Ok((StorageEventReceiver::no_op(), WatchHandle::no_op()))
    }
}
