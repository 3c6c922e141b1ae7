//! Error types for the textroom SDK.

use crate::store::StoreError;
use textroom_core::GateError;
use thiserror::Error;

/// Error type for session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Credential(#[from] GateError),

    #[error("Document has not been loaded")]
    NotLoaded,

    #[error("Session is closed")]
    Closed,
}

impl SyncError {
    /// Whether the failure came from the backing store rather than from
    /// local validation.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, SyncError::Store(_))
    }
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SyncError>;
