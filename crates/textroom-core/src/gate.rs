//! Access Gate: per-session read/write permission for one document.
//!
//! ```text
//!                 set_credential
//!   Unlocked ─────────────────────────┐
//!      │                              ▼
//!      │ remote lock       LockedAuthenticated ◄── set_credential (rotate)
//!      ▼                              ▲
//!   LockedUnauthenticated ────────────┘
//!                 submit_credential (match)
//! ```
//!
//! The gate holds no secret of its own. Candidates are compared against the
//! secret carried by the document snapshot the caller passes in, so the
//! comparison is always against the freshest record the session has seen.

use crate::document::Document;
use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};

/// Minimum password length accepted by [`AccessGate::set_credential`].
pub const MIN_CREDENTIAL_LEN: usize = 4;

/// Lock/authentication state of a session for one document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessState {
    /// No credential required.
    Unlocked,
    /// Credential required and not yet supplied this session.
    LockedUnauthenticated,
    /// Credential supplied and verified this session.
    LockedAuthenticated,
}

impl AccessState {
    /// Initial state for a freshly loaded document.
    pub fn for_document(doc: &Document) -> Self {
        if doc.is_locked {
            AccessState::LockedUnauthenticated
        } else {
            AccessState::Unlocked
        }
    }

    pub fn is_locked(self) -> bool {
        !matches!(self, AccessState::Unlocked)
    }

    pub fn is_authenticated(self) -> bool {
        !matches!(self, AccessState::LockedUnauthenticated)
    }
}

/// Access gate for a single session × document pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessGate {
    state: AccessState,
    min_credential_len: usize,
}

impl AccessGate {
    pub fn new(state: AccessState) -> Self {
        Self {
            state,
            min_credential_len: MIN_CREDENTIAL_LEN,
        }
    }

    /// Gate with the initial state derived from `doc`.
    pub fn for_document(doc: &Document) -> Self {
        Self::new(AccessState::for_document(doc))
    }

    pub fn with_min_credential_len(mut self, len: usize) -> Self {
        self.min_credential_len = len;
        self
    }

    pub fn state(&self) -> AccessState {
        self.state
    }

    pub fn can_read(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn can_write(&self) -> bool {
        self.state.is_authenticated()
    }

    /// Check a candidate password against `doc`'s stored secret.
    ///
    /// Returns `true` when access is granted. A session that already has
    /// access gets `true` without a comparison. There is no lockout or
    /// backoff on repeated failures.
    pub fn submit_credential(&mut self, candidate: &str, doc: &Document) -> bool {
        if self.state != AccessState::LockedUnauthenticated {
            return true;
        }
        match doc.password_secret.as_deref() {
            Some(secret) if doc.is_locked && secret == candidate => {
                self.state = AccessState::LockedAuthenticated;
                true
            }
            _ => false,
        }
    }

    /// Validate a new secret and move to `LockedAuthenticated`.
    ///
    /// Returns the previous gate so the caller can roll back if persisting
    /// the lock fails. Length is measured in characters.
    pub fn set_credential(&mut self, secret: &str) -> Result<AccessGate> {
        if self.state == AccessState::LockedUnauthenticated {
            return Err(GateError::NotPermitted);
        }
        let actual = secret.chars().count();
        if actual < self.min_credential_len {
            return Err(GateError::CredentialTooShort {
                min: self.min_credential_len,
                actual,
            });
        }
        let previous = self.clone();
        self.state = AccessState::LockedAuthenticated;
        Ok(previous)
    }

    /// Restore a gate returned by [`set_credential`](Self::set_credential).
    pub fn restore(&mut self, previous: AccessGate) {
        *self = previous;
    }

    /// Reconcile with a remote snapshot.
    ///
    /// A lock placed by another client revokes access from an `Unlocked`
    /// session; an authenticated session keeps its access. Nothing unlocks a
    /// document, so an unlocked snapshot seen by a locked gate is stale and
    /// ignored. Returns `true` when the state changed.
    pub fn observe(&mut self, doc: &Document) -> bool {
        if self.state == AccessState::Unlocked && doc.is_locked {
            self.state = AccessState::LockedUnauthenticated;
            return true;
        }
        false
    }
}
