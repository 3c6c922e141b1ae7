//! A client session on one shared document.
//!
//! The session owns the access gate and edit buffer for its document and is
//! the only place they meet the store. All state sits behind one lock and is
//! changed by short synchronous transitions; the lock is never held across a
//! store call. Remote changes arrive through a pump task that forwards the
//! store subscription into the session state.
//!
//! Every store call is a suspension point. Whatever the session learned
//! while suspended wins over a stale result, and once the session is closed
//! a completing call changes nothing and emits nothing.

use crate::buffer::{EditBuffer, FlushTicket};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::store::{RemoteStore, Subscription};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use textroom_core::{AccessGate, AccessState, Clock, Document, DocumentId, DocumentPatch, WriteClock};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Events emitted by a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The document is being read from the store.
    Loading,
    /// The document was loaded and the subscription is live.
    Loaded,
    /// The visible text changed because of a remote update or authentication.
    TextChanged(String),
    /// The document's lock state changed.
    LockChanged { is_locked: bool },
    /// A password was accepted.
    Authenticated,
    /// A store operation failed.
    Error(String),
    /// The session was torn down.
    Closed,
}

/// Point-in-time view of a session, for rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub document_id: String,
    /// `None` while the document is locked and not unlocked by this session.
    pub text: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
    pub is_locked: bool,
    pub is_authenticated: bool,
    /// A local edit is waiting for its quiet period.
    pub is_typing: bool,
    pub char_count: usize,
}

struct SessionState {
    document: Option<Document>,
    gate: AccessGate,
    buffer: EditBuffer,
    write_clock: WriteClock,
    loading: bool,
    error: Option<String>,
    closed: bool,
}

pub(crate) struct Shared<S: RemoteStore> {
    id: DocumentId,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    runtime: Handle,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<S: RemoteStore> Shared<S> {
    /// Send `event` unless the session is closed.
    fn emit(&self, event: SessionEvent) {
        if self.state.lock().closed {
            return;
        }
        let _ = self.events.send(event);
    }

    fn emit_all(&self, events: Vec<SessionEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Record a store failure on the session.
    fn fail(&self, err: SyncError) {
        let message = err.to_string();
        {
            let mut state = self.state.lock();
            if state.closed {
                debug!(document = %self.id, error = %err, "failure after close ignored");
                return;
            }
            warn!(document = %self.id, error = %err, "store operation failed");
            state.error = Some(message.clone());
            state.loading = false;
        }
        self.emit(SessionEvent::Error(message));
    }

    /// Subscribe, read-or-create, then start forwarding remote changes.
    ///
    /// Subscribing first means every change after the initial read is
    /// delivered; changes between the two calls are replayed and converge on
    /// the read snapshot.
    async fn load(self: &Arc<Self>) {
        self.emit(SessionEvent::Loading);
        let subscription = match self.store.subscribe(&self.id) {
            Ok(subscription) => subscription,
            Err(err) => return self.fail(err.into()),
        };
        let default = Document::new(self.clock.now_millis());
        let doc = match self.store.create_if_absent(&self.id, default).await {
            Ok(doc) => doc,
            Err(err) => return self.fail(err.into()),
        };

        let locked = doc.is_locked;
        {
            let mut state = self.state.lock();
            if state.closed {
                debug!(document = %self.id, "closed while loading");
                return;
            }
            state.write_clock.observe(doc.last_updated);
            state.gate = AccessGate::for_document(&doc)
                .with_min_credential_len(self.config.min_credential_len);
            state.buffer.reset(doc.text.clone());
            state.document = Some(doc);
            state.loading = false;
        }
        info!(document = %self.id, locked, "document opened");
        self.emit(SessionEvent::Loaded);
        self.start_pump(subscription);
    }

    fn start_pump(self: &Arc<Self>, mut subscription: Subscription) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = self.runtime.spawn(async move {
            while let Some(change) = subscription.next().await {
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                match change {
                    Ok(doc) => shared.apply_remote(doc),
                    Err(err) => shared.fail(err.into()),
                }
            }
        });
        *self.pump.lock() = Some(handle);
    }

    /// Apply one remote change notification.
    ///
    /// The record is always kept so that a later authentication can reveal
    /// it, but text only reaches the buffer while the gate allows reading.
    fn apply_remote(&self, doc: Document) {
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.write_clock.observe(doc.last_updated);
            if state.gate.observe(&doc) {
                info!(document = %self.id, "document locked by another client");
                events.push(SessionEvent::LockChanged { is_locked: true });
            }
            if state.gate.can_read() {
                if let Some(text) = state.buffer.on_remote_update(doc.text.clone(), doc.last_updated) {
                    debug!(document = %self.id, "remote text applied");
                    events.push(SessionEvent::TextChanged(text.to_owned()));
                }
            }
            state.document = Some(doc);
        }
        self.emit_all(events);
    }

    fn update_text(self: &Arc<Self>, text: String) {
        let mut state = self.state.lock();
        if state.closed || state.document.is_none() {
            return;
        }
        if !state.gate.can_write() {
            debug!(document = %self.id, "edit ignored: document locked");
            return;
        }
        let weak = Arc::downgrade(self);
        let runtime = self.runtime.clone();
        state.buffer.on_local_edit(text, move |ticket, quiet| {
            runtime.spawn(async move {
                tokio::time::sleep(quiet).await;
                if let Some(shared) = weak.upgrade() {
                    shared.on_quiet_period(ticket).await;
                }
            })
        });
    }

    async fn on_quiet_period(&self, ticket: FlushTicket) {
        let value = self.state.lock().buffer.fire(ticket);
        if let Some(text) = value {
            // Failures are already recorded on the session.
            let _ = self.request_flush(text).await;
        }
    }

    /// Persist `text` if the gate allows writing; otherwise a no-op.
    async fn request_flush(&self, text: String) -> Result<()> {
        let (write, patch) = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(SyncError::Closed);
            }
            if !state.gate.can_write() {
                debug!(document = %self.id, "flush dropped: document locked");
                return Ok(());
            }
            let stamp = state.write_clock.stamp(self.clock.now_millis());
            let write = state.buffer.note_write(stamp, text.as_str());
            (write, DocumentPatch::text(text, stamp))
        };
        let stamp = patch.last_updated;
        let result = self.store.set(&self.id, patch).await;

        let mut state = self.state.lock();
        if state.closed {
            debug!(document = %self.id, last_updated = stamp, "flush finished after close");
            return result.map_err(SyncError::from);
        }
        match result {
            Ok(()) => {
                debug!(document = %self.id, last_updated = stamp, "text flushed");
                state.error = None;
                Ok(())
            }
            Err(err) => {
                state.buffer.forget_write(write);
                drop(state);
                let err = SyncError::from(err);
                self.fail(err.clone());
                Err(err)
            }
        }
    }

    async fn set_credential(&self, secret: &str) -> Result<()> {
        let (previous, patch) = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(SyncError::Closed);
            }
            if state.document.is_none() {
                return Err(SyncError::NotLoaded);
            }
            let previous = state.gate.set_credential(secret)?;
            let stamp = state.write_clock.stamp(self.clock.now_millis());
            (previous, DocumentPatch::lock(secret, stamp))
        };

        let result = self.store.set(&self.id, patch).await;
        if self.state.lock().closed {
            return result.map_err(SyncError::from);
        }
        match result {
            Ok(()) => {
                info!(document = %self.id, "document locked");
                if !previous.state().is_locked() {
                    self.emit(SessionEvent::LockChanged { is_locked: true });
                }
                Ok(())
            }
            Err(err) => {
                {
                    let mut state = self.state.lock();
                    state.gate.restore(previous);
                    // A lock from another client may have landed meanwhile.
                    if let Some(doc) = state.document.clone() {
                        state.gate.observe(&doc);
                    }
                }
                let err = SyncError::from(err);
                self.fail(err.clone());
                Err(err)
            }
        }
    }

    async fn submit_credential(&self, candidate: &str) -> bool {
        {
            let state = self.state.lock();
            if state.closed || state.document.is_none() {
                return false;
            }
            if state.gate.can_read() {
                return true;
            }
        }

        // Compare against the freshest record; it doubles as the snapshot
        // revealed on success.
        let fetched = match self.store.get(&self.id).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                warn!(document = %self.id, "document missing during authentication");
                return false;
            }
            Err(err) => {
                self.fail(err.into());
                return false;
            }
        };

        let mut events = Vec::new();
        let granted = {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            // The subscription may have delivered a newer record while the
            // read was in flight.
            let doc = match state.document.take() {
                Some(seen) if seen.last_updated >= fetched.last_updated => seen,
                _ => fetched,
            };
            state.write_clock.observe(doc.last_updated);
            let granted = state.gate.submit_credential(candidate, &doc);
            if granted {
                state.buffer.reset(doc.text.clone());
                events.push(SessionEvent::Authenticated);
                events.push(SessionEvent::TextChanged(doc.text.clone()));
            }
            state.document = Some(doc);
            granted
        };

        if granted {
            info!(document = %self.id, "password accepted");
        } else {
            warn!(document = %self.id, "incorrect password");
        }
        self.emit_all(events);
        granted
    }

    fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        let loaded = state.document.is_some();
        let readable = loaded && state.gate.can_read();
        let text = readable.then(|| state.buffer.value().to_owned());
        SessionSnapshot {
            document_id: self.id.to_string(),
            char_count: text.as_deref().map_or(0, |t| t.chars().count()),
            text,
            loading: state.loading,
            error: state.error.clone(),
            is_locked: loaded && state.gate.state().is_locked(),
            is_authenticated: readable,
            is_typing: state.buffer.is_pending(),
        }
    }

    fn teardown(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.buffer.dispose();
        }
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        info!(document = %self.id, "session closed");
        let _ = self.events.send(SessionEvent::Closed);
    }
}

/// A client's view of one shared document.
///
/// Created by [`SyncController::open`](crate::controller::SyncController::open).
/// Dropping the session closes it: the debounce timer is cancelled and the
/// store subscription released.
pub struct DocumentSession<S: RemoteStore> {
    shared: Arc<Shared<S>>,
}

impl<S: RemoteStore> DocumentSession<S> {
    /// Build a session and load it from the store.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub(crate) async fn open(
        id: DocumentId,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        let session = Self::unloaded(id, store, clock, config);
        session.shared.load().await;
        session
    }

    /// Build a session and load it in the background.
    ///
    /// The session starts with `loading == true`; subscribe to its events to
    /// see [`SessionEvent::Loaded`] or [`SessionEvent::Error`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub(crate) fn open_deferred(
        id: DocumentId,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        let session = Self::unloaded(id, store, clock, config);
        let shared = session.shared.clone();
        session.shared.runtime.spawn(async move { shared.load().await });
        session
    }

    fn unloaded(id: DocumentId, store: Arc<S>, clock: Arc<dyn Clock>, config: SyncConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let state = SessionState {
            document: None,
            gate: AccessGate::new(AccessState::LockedUnauthenticated),
            buffer: EditBuffer::new(String::new(), config.quiet_period),
            write_clock: WriteClock::new(),
            loading: true,
            error: None,
            closed: false,
        };
        let shared = Arc::new(Shared {
            id,
            store,
            clock,
            config,
            runtime: Handle::current(),
            state: Mutex::new(state),
            events,
            pump: Mutex::new(None),
        });
        Self { shared }
    }

    pub fn id(&self) -> &DocumentId {
        &self.shared.id
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot()
    }

    /// Visible text, or `None` while access is denied or the load failed.
    pub fn text(&self) -> Option<String> {
        self.shared.snapshot().text
    }

    pub fn access_state(&self) -> AccessState {
        self.shared.state.lock().gate.state()
    }

    /// Record a local edit. Fire-and-forget: the write happens after the
    /// quiet period, and is silently dropped while the document is locked.
    ///
    /// May be called from any thread.
    pub fn update_text(&self, text: impl Into<String>) {
        self.shared.update_text(text.into());
    }

    /// Write the pending edit now instead of waiting for the quiet period.
    pub async fn flush(&self) -> Result<()> {
        let pending = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(SyncError::Closed);
            }
            state.buffer.flush_pending()
        };
        match pending {
            Some(text) => self.shared.request_flush(text).await,
            None => Ok(()),
        }
    }

    /// Lock the document behind `secret`.
    ///
    /// Requires current access. Short secrets fail with
    /// [`GateError::CredentialTooShort`](textroom_core::GateError) and change
    /// nothing.
    pub async fn set_credential(&self, secret: &str) -> Result<()> {
        self.shared.set_credential(secret).await
    }

    /// Try a password. Returns `true` once access is granted.
    pub async fn submit_credential(&self, candidate: &str) -> bool {
        self.shared.submit_credential(candidate).await
    }

    /// Tear the session down. Equivalent to dropping it.
    pub fn close(self) {}
}

impl<S: RemoteStore> Drop for DocumentSession<S> {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}
