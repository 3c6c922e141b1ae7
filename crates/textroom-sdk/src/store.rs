//! Remote document store abstraction.
//!
//! The sync controller talks to the backing store only through
//! [`RemoteStore`]. [`MemoryStore`] is the in-process implementation used by
//! tests, the demo binary, and anyone embedding several sessions in one
//! process.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use textroom_core::{Document, DocumentId, DocumentPatch};
use thiserror::Error;
use tokio::sync::mpsc;

/// Store error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Change feed for one document.
///
/// Yields the full record after every write, including writes made by the
/// subscriber itself. Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<StoreResult<Document>>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<StoreResult<Document>>) -> Self {
        Self { rx }
    }

    /// Next change or error; `None` once the store drops the feed.
    pub async fn next(&mut self) -> Option<StoreResult<Document>> {
        self.rx.recv().await
    }
}

/// Key-addressed, subscribable document store.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Return the existing record for `id`, or atomically insert `default`.
    ///
    /// Two concurrent callers must observe the same record.
    async fn create_if_absent(&self, id: &DocumentId, default: Document) -> StoreResult<Document>;

    /// Point read.
    async fn get(&self, id: &DocumentId) -> StoreResult<Option<Document>>;

    /// Last-writer-wins partial write. Fields absent from `patch` are kept.
    /// Writing to a missing id creates it.
    async fn set(&self, id: &DocumentId, patch: DocumentPatch) -> StoreResult<()>;

    /// Subscribe to changes of `id`. Only changes after the call are pushed.
    fn subscribe(&self, id: &DocumentId) -> StoreResult<Subscription>;
}

type Subscribers = HashMap<DocumentId, Vec<mpsc::UnboundedSender<StoreResult<Document>>>>;

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<DocumentId, Document>>,
    subscribers: RwLock<Subscribers>,
    writes: RwLock<Vec<(DocumentId, DocumentPatch)>>,
    creates: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Push an error into every subscription of `id`.
    pub fn fail_subscriptions(&self, id: &DocumentId, message: impl Into<String>) {
        let message = message.into();
        self.notify(id, Err(StoreError::Unavailable(message)));
    }

    /// Current record, bypassing availability checks.
    pub fn document(&self, id: &DocumentId) -> Option<Document> {
        self.documents.read().get(id).cloned()
    }

    /// Every patch applied so far, in application order.
    pub fn writes(&self) -> Vec<(DocumentId, DocumentPatch)> {
        self.writes.read().clone()
    }

    /// Number of patches applied to `id`.
    pub fn write_count(&self, id: &DocumentId) -> usize {
        self.writes.read().iter().filter(|(w, _)| w == id).count()
    }

    /// Number of records created by `create_if_absent`.
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions on `id`.
    pub fn subscriber_count(&self, id: &DocumentId) -> usize {
        self.subscribers
            .read()
            .get(id)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Dump a record in its persisted JSON shape.
    pub fn export_json(&self, id: &DocumentId) -> StoreResult<Option<String>> {
        self.documents
            .read()
            .get(id)
            .map(serde_json::to_string_pretty)
            .transpose()
            .map_err(StoreError::from)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn notify(&self, id: &DocumentId, event: StoreResult<Document>) {
        let mut subscribers = self.subscribers.write();
        if let Some(subs) = subscribers.get_mut(id) {
            subs.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn create_if_absent(&self, id: &DocumentId, default: Document) -> StoreResult<Document> {
        self.check_available()?;
        let mut documents = self.documents.write();
        let doc = documents.entry(id.clone()).or_insert_with(|| {
            self.creates.fetch_add(1, Ordering::SeqCst);
            default
        });
        Ok(doc.clone())
    }

    async fn get(&self, id: &DocumentId) -> StoreResult<Option<Document>> {
        self.check_available()?;
        Ok(self.documents.read().get(id).cloned())
    }

    async fn set(&self, id: &DocumentId, patch: DocumentPatch) -> StoreResult<()> {
        self.check_available()?;
        let updated = {
            let mut documents = self.documents.write();
            let doc = documents
                .entry(id.clone())
                .or_insert_with(|| Document::new(patch.last_updated));
            doc.apply(&patch);
            doc.clone()
        };
        self.writes.write().push((id.clone(), patch));
        self.notify(id, Ok(updated));
        Ok(())
    }

    fn subscribe(&self, id: &DocumentId) -> StoreResult<Subscription> {
        self.check_available()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().entry(id.clone()).or_default().push(tx);
        Ok(Subscription::new(rx))
    }
}
