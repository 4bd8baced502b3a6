//! Page source storage for isle.
//!
//! This crate provides a [`Storage`] trait for abstracting page discovery,
//! content retrieval and change notification from the underlying backend.
//! This enables:
//!
//! - **Unit testing** of the page pipeline without touching the real filesystem
//! - **Clean separation** between routing logic and I/O operations
//!
//! # Architecture
//!
//! The crate provides:
//! - [`Storage`] trait with `scan()`, `read()`, `exists()`, `mtime()` and `watch()`
//! - [`FsStorage`] implementation for a pages directory on the local filesystem
//! - [`MockStorage`] for testing (behind `mock` feature flag)
//!
//! All paths crossing this API are absolute.
//!
//! # Example
//!
//! ```ignore
//! use std::path::PathBuf;
//! use isle_storage::{FsStorage, Storage};
//!
//! let storage = FsStorage::new(PathBuf::from("/site/src/pages"), vec!["md".to_owned()]);
//! for path in storage.scan()? {
//!     println!("{}", path.display());
//! }
//! ```

mod debouncer;
mod event;
mod fs;
#[cfg(feature = "mock")]
mod mock;
mod storage;

pub use event::{StorageEvent, StorageEventKind, StorageEventReceiver, WatchHandle};
pub use fs::FsStorage;
#[cfg(feature = "mock")]
pub use mock::MockStorage;
pub use storage::{ErrorStatus, Storage, StorageError, StorageErrorKind};
