//! Note model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::is_blank;

/// Opaque, store-assigned note identifier, unique within one namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Wrap an identifier produced by a document store
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Generate a random 20 character document identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string().chars().take(20).collect())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The user-editable fields of a note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFields {
    pub title: String,
    pub content: String,
}

impl NoteFields {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Both title and content carry non-whitespace text
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !is_blank(&self.title) && !is_blank(&self.content)
    }
}

/// A note as delivered by the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Store-assigned identifier
    pub id: NoteId,
    pub title: String,
    pub content: String,
    /// Server-assigned creation timestamp (Unix ms), the list sort key
    pub created_at: i64,
    /// Server-assigned timestamp of the last edit (Unix ms)
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl Note {
    /// Copy of the editable fields
    #[must_use]
    pub fn fields(&self) -> NoteFields {
        NoteFields::new(self.title.clone(), self.content.clone())
    }

    #[must_use]
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.created_at)
    }

    #[must_use]
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        self.updated_at.and_then(DateTime::from_timestamp_millis)
    }
}

/// Sort notes by creation timestamp, newest first.
///
/// Ties keep their relative order.
pub fn order_newest_first(notes: &mut [Note]) {
    notes.sort_by(|left, right| right.created_at.cmp(&left.created_at));
}
