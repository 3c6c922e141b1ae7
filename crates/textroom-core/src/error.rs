//! Error types for the access gate.

use thiserror::Error;

/// Errors returned by credential operations.
///
/// Neither variant mutates gate state. A wrong password is not an error;
/// see [`AccessGate::submit_credential`](crate::gate::AccessGate::submit_credential).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("Password must be at least {min} characters (got {actual})")]
    CredentialTooShort { min: usize, actual: usize },

    #[error("Document is locked: authenticate before changing its password")]
    NotPermitted,
}

pub type Result<T> = std::result::Result<T, GateError>;
