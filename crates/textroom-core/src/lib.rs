//! textroom core - the shared document record and its access rules.
//!
//! This crate holds everything about a shared text room that does not need
//! an async runtime:
//!
//! - [`document`] - the persisted record, its id, and partial writes
//! - [`gate`] - the per-session lock/authentication state machine
//! - [`clock`] - wall-clock source and monotonic write stamps
//! - [`error`] - credential errors
//!
//! The sync machinery that drives these lives in `textroom-sdk`.

pub mod clock;
pub mod document;
pub mod error;
pub mod gate;

pub use clock::{Clock, ManualClock, SystemClock, WriteClock};
pub use document::{Document, DocumentId, DocumentPatch};
pub use error::GateError;
pub use gate::{AccessGate, AccessState, MIN_CREDENTIAL_LEN};
