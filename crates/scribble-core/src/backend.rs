//! The identity provider and document store handed to the views.

use std::sync::Arc;

use crate::auth::{FirebaseAuthClient, IdentityProvider, MemoryIdentityProvider, SessionPersistence};
use crate::config::FirebaseConfig;
use crate::store::{DocumentStore, FirestoreStore, MemoryStore};
use crate::Result;

/// Shared handles to the two external services.
///
/// Views receive a `Backend` instead of reaching for globals, so tests can
/// wire in-memory services and the CLI can pick hosted or offline ones.
#[derive(Clone)]
pub struct Backend {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
}

impl Backend {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self { identity, store }
    }

    /// Firebase Authentication plus Cloud Firestore for one project.
    ///
    /// The store borrows its bearer tokens from the auth client, so both
    /// always act for the same signed-in user.
    pub fn firebase<S: SessionPersistence>(config: &FirebaseConfig, persistence: S) -> Result<Self> {
        let auth = Arc::new(FirebaseAuthClient::new(config, persistence)?);
        let store = FirestoreStore::new(config, auth.clone())?;
        tracing::debug!("Using Firebase project {}", config.project_id);
        Ok(Self {
            identity: auth,
            store: Arc::new(store),
        })
    }

    /// In-process services; nothing survives the process.
    #[must_use]
    pub fn offline() -> Self {
        Self::in_memory(Arc::new(MemoryIdentityProvider::new()), MemoryStore::new())
    }

    /// In-process services with handles kept by the caller for inspection.
    #[must_use]
    pub fn in_memory(identity: Arc<MemoryIdentityProvider>, store: MemoryStore) -> Self {
        Self {
            identity,
            store: Arc::new(store),
        }
    }

    #[must_use]
    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        Arc::clone(&self.identity)
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoPersistence;
    use crate::models::{Namespace, NoteFields, UserId};

    #[tokio::test]
    async fn in_memory_backend_shares_store_handle() {
        let store = MemoryStore::new();
        let backend = Backend::in_memory(Arc::new(MemoryIdentityProvider::new()), store.clone());
        let ns = Namespace::for_user(UserId::from("u1"));
        backend
            .store()
            .create(&ns, NoteFields::new("A", "a"))
            .await
            .unwrap();
        assert_eq!(store.notes(&ns).len(), 1);
    }

    #[tokio::test]
    async fn offline_backend_registers_accounts() {
        let backend = Backend::offline();
        let session = backend
            .identity()
            .register("ada@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(session.user.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn firebase_backend_builds_from_config() {
        let config = FirebaseConfig::new("key", "demo").unwrap();
        assert!(Backend::firebase(&config, NoPersistence).is_ok());
    }
}
