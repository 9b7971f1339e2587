//! Document store contract for per-user note collections.
//!
//! Writes are single-document and the store assigns every timestamp. Reads
//! only happen through live ordered subscriptions: each delivery is a
//! complete snapshot of the namespace, newest note first.

mod firestore;
mod listeners;
mod memory;
mod subscription;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::AuthError;
use crate::models::{Namespace, Note, NoteFields, NoteId};

pub use firestore::FirestoreStore;
pub use memory::{MemoryStore, StoreRequest};
pub use subscription::{Subscription, SubscriptionId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Document store unavailable: {0}")]
    Unavailable(String),
    #[error("Note not found: {0}")]
    NotFound(String),
    #[error("Not signed in: {0}")]
    Unauthenticated(String),
    #[error("Invalid document payload: {0}")]
    InvalidPayload(String),
    #[error("Document store error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::Unavailable(error.to_string())
        } else if error.is_decode() {
            Self::InvalidPayload(error.to_string())
        } else {
            Self::Api(error.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidPayload(error.to_string())
    }
}

impl From<AuthError> for StoreError {
    fn from(error: AuthError) -> Self {
        Self::Unauthenticated(error.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One delivery on a subscription: a full snapshot or a delivery error.
pub type SnapshotResult = StoreResult<Vec<Note>>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a note; the store assigns its id and creation timestamp.
    async fn create(&self, namespace: &Namespace, fields: NoteFields) -> StoreResult<NoteId>;

    /// Replace a note's fields; the store assigns a fresh update timestamp.
    async fn update(&self, namespace: &Namespace, id: &NoteId, fields: NoteFields)
        -> StoreResult<()>;

    async fn delete(&self, namespace: &Namespace, id: &NoteId) -> StoreResult<()>;

    /// Open a live query ordered by creation timestamp, newest first.
    ///
    /// The query stays open until the returned [`Subscription`] is dropped.
    fn subscribe_ordered(&self, namespace: &Namespace) -> Subscription;
}
