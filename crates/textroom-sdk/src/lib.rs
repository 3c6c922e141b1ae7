//! textroom SDK - keep one shared text document in sync across clients.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use textroom_sdk::{MemoryStore, SyncConfig, SyncController};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(MemoryStore::new());
//! let controller = SyncController::new(store, SyncConfig::default());
//!
//! let alice = controller.open("room-1").await;
//! alice.update_text("hello");
//! alice.flush().await.unwrap();
//!
//! // Lock the room; a fresh session must authenticate to see the text.
//! alice.set_credential("hunter2").await.unwrap();
//! let bob = controller.open("room-1").await;
//! assert!(bob.text().is_none());
//! assert!(bob.submit_credential("hunter2").await);
//! assert_eq!(bob.text().as_deref(), Some("hello"));
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`controller`] - opens sessions against an injected store
//! - [`session`] - per-document session state, events and snapshots
//! - [`buffer`] - debounced local edit buffer
//! - [`store`] - remote store contract and the in-memory store
//! - [`config`] - session configuration
//! - [`error`] - error types
//!
//! Concurrent writers resolve last-writer-wins. A write superseded by
//! another client's write is lost without any signal to either side.

pub mod buffer;
pub mod config;
pub mod controller;
pub mod error;
pub mod session;
pub mod store;

pub use buffer::{EditBuffer, FlushTicket, WriteId};
pub use config::{SyncConfig, SyncConfigBuilder};
pub use controller::SyncController;
pub use error::{Result, SyncError};
pub use session::{DocumentSession, SessionEvent, SessionSnapshot};
pub use store::{MemoryStore, RemoteStore, StoreError, StoreResult, Subscription};

pub use textroom_core::{
    AccessGate, AccessState, Clock, Document, DocumentId, DocumentPatch, GateError, ManualClock,
    SystemClock,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::controller::SyncController;
    pub use crate::error::SyncError;
    pub use crate::session::{DocumentSession, SessionEvent};
    pub use crate::store::{MemoryStore, RemoteStore};
    pub use crate::config::SyncConfig;
}
