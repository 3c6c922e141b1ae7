//! Sync controller: the entry point that opens document sessions.

use crate::config::SyncConfig;
use crate::session::DocumentSession;
use crate::store::RemoteStore;
use std::sync::Arc;
use textroom_core::{Clock, DocumentId, SystemClock};

/// Opens [`DocumentSession`]s against an injected store.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use textroom_sdk::{MemoryStore, SyncConfig, SyncController};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = Arc::new(MemoryStore::new());
/// let controller = SyncController::new(store, SyncConfig::default());
///
/// let session = controller.open("meeting-notes").await;
/// session.update_text("# Agenda");
/// session.flush().await.unwrap();
///
/// assert_eq!(session.text().as_deref(), Some("# Agenda"));
/// # }
/// ```
pub struct SyncController<S: RemoteStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl<S: RemoteStore> SyncController<S> {
    /// Create a controller stamping writes with the system clock.
    pub fn new(store: Arc<S>, config: SyncConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    /// Create a controller with a custom clock.
    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>, config: SyncConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Open a session on `id`, creating the document if it does not exist.
    ///
    /// Resolves once the initial read has finished, so the returned session
    /// is never `loading`; use [`open_deferred`](Self::open_deferred) to
    /// observe the loading phase. Never fails outright: a store failure leaves the session with
    /// `loading == false` and the error recorded in its snapshot.
    pub async fn open(&self, id: impl Into<DocumentId>) -> DocumentSession<S> {
        DocumentSession::open(
            id.into(),
            self.store.clone(),
            self.clock.clone(),
            self.config.clone(),
        )
        .await
    }

    /// Start opening a session on `id` and return it before the read lands.
    ///
    /// The returned session reports `loading == true` and withholds text
    /// until [`SessionEvent::Loaded`](crate::session::SessionEvent::Loaded).
    /// Edits made while loading are ignored.
    pub fn open_deferred(&self, id: impl Into<DocumentId>) -> DocumentSession<S> {
        DocumentSession::open_deferred(
            id.into(),
            self.store.clone(),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    /// Open a session on a freshly generated id.
    pub async fn open_new(&self) -> DocumentSession<S> {
        self.open(DocumentId::generate()).await
    }
}

impl<S: RemoteStore> Clone for SyncController<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
        }
    }
}
