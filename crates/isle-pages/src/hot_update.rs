//! Hot updates for the development server.
//!
//! [`UpdateController`] turns storage events into registry updates and tells
//! the [`DevServer`] which modules to invalidate or whether the client must
//! reload.
//!
//! | Event    | Registry                 | Server                             |
//! |----------|--------------------------|------------------------------------|
//! | `add`    | `add_page`               | full reload                        |
//! | `unlink` | `remove_page`            | full reload                        |
//! | `change` | `update_page`            | invalidate page, reload if needed  |
//!
//! A `change` for a file that no longer exists is handled as `unlink`.

use std::sync::Arc;
use std::time::Instant;

use isle_storage::{StorageEvent, StorageEventKind, StorageEventReceiver};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::PagesError;
use crate::paths::to_slash_path;
use crate::registry::PageRegistry;
use crate::virtual_modules::{ROUTES_ID, VirtualModules};

/// Capacity of the queue between the storage watcher and the controller.
const EVENT_QUEUE_CAPACITY: usize = 100;

/// Development server notified about page updates.
pub trait DevServer: Send + Sync {
    /// Ask connected clients to reload the page.
    fn full_reload(&self);

    /// Drop the compiled module with `id`.
    fn invalidate_module(&self, id: &str);

    /// Show an error overlay.
    fn report_error(&self, message: &str);
}

/// Message sent to dev clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrMessage {
    FullReload,
    Update { id: String },
    Error { message: String },
}

/// [`DevServer`] broadcasting [`HmrMessage`] JSON to subscribers.
pub struct BroadcastDevServer {
    sender: broadcast::Sender<String>,
}

impl BroadcastDevServer {
    /// Create a server buffering up to `capacity` messages per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Get a receiver for serialized messages.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    fn send(&self, message: &HmrMessage) {
        match serde_json::to_string(message) {
            // No subscribers is not an error
            Ok(json) => {
                let _ = self.sender.send(json);
            }
            Err(err) => tracing::error!(error = %err, "Failed to serialize HMR message"),
        }
    }
}

impl DevServer for BroadcastDevServer {
    fn full_reload(&self) {
        self.send(&HmrMessage::FullReload);
    }

    fn invalidate_module(&self, id: &str) {
        self.send(&HmrMessage::Update { id: id.to_owned() });
    }

    fn report_error(&self, message: &str) {
        self.send(&HmrMessage::Error {
            message: message.to_owned(),
        });
    }
}

/// What handling an event did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Not a page.
    Ignored,
    /// Page rebuilt without observable changes.
    Unchanged,
    /// Page module invalidated; the route table is unaffected.
    ModuleUpdated,
    /// Virtual modules cleared and a full reload sent.
    FullReload,
}

/// Applies storage events to the registry and notifies the dev server.
pub struct UpdateController {
    registry: Arc<PageRegistry>,
    modules: Arc<VirtualModules>,
    server: Arc<dyn DevServer>,
}

impl UpdateController {
    /// Create a controller for the registry behind `modules`.
    #[must_use]
    pub fn new(modules: Arc<VirtualModules>, server: Arc<dyn DevServer>) -> Self {
        Self {
            registry: Arc::clone(modules.registry()),
            modules,
            server,
        }
    }

    /// Apply one storage event.
    ///
    /// Add and unlink events always end in a full reload, even when adding
    /// the page fails. A change to a file that is gone counts as an unlink.
    ///
    /// # Errors
    ///
    /// Returns the registry error for the affected page.
    pub async fn handle_event(&self, event: &StorageEvent) -> Result<UpdateOutcome, PagesError> {
        let path = event.path.as_path();
        if !self.registry.is_page(path) {
            tracing::trace!(path = %path.display(), "Ignoring non-page event");
            return Ok(UpdateOutcome::Ignored);
        }

        let kind = match event.kind {
            StorageEventKind::Change if !self.registry.storage().exists(path) => {
                tracing::debug!(path = %path.display(), "Changed page is gone");
                StorageEventKind::Unlink
            }
            kind => kind,
        };

        match kind {
            StorageEventKind::Add => {
                let added = self.registry.add_page(path).await;
                self.full_reload();
                added.map(|_| UpdateOutcome::FullReload)
            }
            StorageEventKind::Unlink => {
                self.registry.remove_page(path);
                self.registry.expander().invalidate(path);
                self.full_reload();
                Ok(UpdateOutcome::FullReload)
            }
            StorageEventKind::Change => {
                self.registry.expander().invalidate(path);
                let update = self.registry.update_page(path).await?;
                if !update.changed {
                    return Ok(UpdateOutcome::Unchanged);
                }

                self.server.invalidate_module(&to_slash_path(path));
                if update.needs_reload {
                    self.server.invalidate_module(ROUTES_ID);
                    self.full_reload();
                    return Ok(UpdateOutcome::FullReload);
                }
                Ok(UpdateOutcome::ModuleUpdated)
            }
        }
    }

    /// Apply one storage event, reporting failures instead of returning them.
    ///
    /// Frontmatter errors that dev mode fell back from are reported too.
    pub async fn dispatch(&self, event: &StorageEvent) -> Option<UpdateOutcome> {
        let start = Instant::now();
        match self.handle_event(event).await {
            Ok(outcome) => {
                if outcome != UpdateOutcome::Ignored {
                    tracing::info!(
                        path = %event.path.display(),
                        kind = %event.kind,
                        ?outcome,
                        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Page update processed"
                    );
                    if let Some(message) = self.registry.frontmatter_error(&event.path) {
                        self.server.report_error(&message);
                    }
                }
                Some(outcome)
            }
            Err(err) => {
                tracing::error!(path = %event.path.display(), error = %err, "Page update failed");
                self.server.report_error(&err.to_string());
                None
            }
        }
    }

    /// Process events from `events` one at a time on a tokio task.
    ///
    /// The task ends when the storage watcher drops its sender.
    pub fn start(self: Arc<Self>, events: StorageEventReceiver) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::channel::<StorageEvent>(EVENT_QUEUE_CAPACITY);

        std::thread::spawn(move || {
            for event in events.iter() {
                // Use blocking_send since the storage receiver is sync
                if tx.blocking_send(event).is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.dispatch(&event).await;
            }
            tracing::debug!("Update controller stopped");
        })
    }

    fn full_reload(&self) {
        self.modules.clear();
        self.server.full_reload();
    }
}
