//! The shared document record and the partial writes applied to it.
//!
//! A document is addressed by an opaque [`DocumentId`] and holds a single
//! UTF-8 text body plus its lock state. Writers never send a whole record;
//! they send a [`DocumentPatch`] naming only the fields they own, so a text
//! write cannot clear lock state set by another writer.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Opaque document identifier, the sole addressing key of a document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for a room that has not been named yet.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The persisted document record.
///
/// `password_secret` is stored and compared verbatim. A deployment that
/// cares about the secret should swap in a salted one-way hash before it
/// reaches the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub text: String,
    pub created: i64,
    pub last_updated: i64,
    pub is_locked: bool,
    #[serde(default)]
    pub password_secret: Option<String>,
}

impl Document {
    /// The record written on first access to an unknown id.
    pub fn new(now: i64) -> Self {
        Self {
            text: String::new(),
            created: now,
            last_updated: now,
            is_locked: false,
            password_secret: None,
        }
    }

    /// Apply a partial write. `created` is never touched.
    pub fn apply(&mut self, patch: &DocumentPatch) {
        if let Some(text) = &patch.text {
            self.text.clone_from(text);
        }
        if let Some(secret) = &patch.password_secret {
            self.is_locked = true;
            self.password_secret = Some(secret.clone());
        }
        self.last_updated = patch.last_updated;
    }

    /// Number of characters (not bytes) in the text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// A partial document write.
///
/// Fields left as `None` are preserved by the store. Setting
/// `password_secret` also sets `is_locked`; there is no patch that unlocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret: Option<String>,
    pub last_updated: i64,
}

impl DocumentPatch {
    /// A write that replaces the text only.
    pub fn text(text: impl Into<String>, last_updated: i64) -> Self {
        Self {
            text: Some(text.into()),
            password_secret: None,
            last_updated,
        }
    }

    /// A write that locks the document behind `secret`.
    pub fn lock(secret: impl Into<String>, last_updated: i64) -> Self {
        Self {
            text: None,
            password_secret: Some(secret.into()),
            last_updated,
        }
    }

    /// Materialize the patch as a full record, for stores that upsert.
    pub fn into_document(self, created: i64) -> Document {
        let mut doc = Document::new(created);
        doc.apply(&self);
        doc
    }
}
