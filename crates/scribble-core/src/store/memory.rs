//! In-process document store for offline use and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::listeners::ListenerRegistry;
use super::{DocumentStore, StoreError, StoreResult, Subscription};
use crate::models::{order_newest_first, Namespace, Note, NoteFields, NoteId};
use crate::util::unix_millis_now;

/// A request as it reached the store, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    Create {
        namespace: Namespace,
        fields: NoteFields,
    },
    Update {
        namespace: Namespace,
        id: NoteId,
        fields: NoteFields,
    },
    Delete {
        namespace: Namespace,
        id: NoteId,
    },
    Subscribe(Namespace),
    Release(Namespace),
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<Namespace, Vec<Note>>,
    last_timestamp: i64,
    requests: Vec<StoreRequest>,
    pending_failure: Option<StoreError>,
}

impl MemoryState {
    /// Server clock: wall time, but strictly increasing per write.
    fn next_timestamp(&mut self) -> i64 {
        self.last_timestamp = unix_millis_now().max(self.last_timestamp + 1);
        self.last_timestamp
    }

    fn snapshot(&self, namespace: &Namespace) -> Vec<Note> {
        self.collections.get(namespace).cloned().unwrap_or_default()
    }

    fn take_failure(&mut self) -> StoreResult<()> {
        self.pending_failure.take().map_or(Ok(()), Err)
    }
}

/// Notes kept in memory, with live subscriptions notified on every write.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    listeners: ListenerRegistry,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<StoreRequest> {
        self.lock().requests.clone()
    }

    /// Number of live subscriptions on `namespace`.
    pub fn active_subscriptions(&self, namespace: &Namespace) -> usize {
        self.listeners.active_count(namespace)
    }

    /// Current contents of `namespace`, newest first.
    pub fn notes(&self, namespace: &Namespace) -> Vec<Note> {
        self.lock().snapshot(namespace)
    }

    /// Make the next create, update, or delete fail with `error`.
    pub fn fail_next_mutation(&self, error: StoreError) {
        self.lock().pending_failure = Some(error);
    }

    /// Deliver `error` to every live subscription on `namespace`.
    pub fn fail_subscriptions(&self, namespace: &Namespace, error: &StoreError) {
        self.listeners.fail(namespace, error);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate<T>(
        &self,
        namespace: &Namespace,
        request: StoreRequest,
        apply: impl FnOnce(&mut MemoryState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut state = self.lock();
        state.requests.push(request);
        state.take_failure()?;
        let value = apply(&mut state)?;
        // Notify under the state lock so every listener sees writes in order
        self.listeners.notify(namespace, &state.snapshot(namespace));
        Ok(value)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, namespace: &Namespace, fields: NoteFields) -> StoreResult<NoteId> {
        let request = StoreRequest::Create {
            namespace: namespace.clone(),
            fields: fields.clone(),
        };
        self.mutate(namespace, request, |state| {
            let id = NoteId::generate();
            let created_at = state.next_timestamp();
            let notes = state.collections.entry(namespace.clone()).or_default();
            notes.push(Note {
                id: id.clone(),
                title: fields.title,
                content: fields.content,
                created_at,
                updated_at: None,
            });
            order_newest_first(notes);
            Ok(id)
        })
    }

    async fn update(
        &self,
        namespace: &Namespace,
        id: &NoteId,
        fields: NoteFields,
    ) -> StoreResult<()> {
        let request = StoreRequest::Update {
            namespace: namespace.clone(),
            id: id.clone(),
            fields: fields.clone(),
        };
        self.mutate(namespace, request, |state| {
            let updated_at = state.next_timestamp();
            let note = state
                .collections
                .get_mut(namespace)
                .and_then(|notes| notes.iter_mut().find(|note| &note.id == id))
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            note.title = fields.title;
            note.content = fields.content;
            note.updated_at = Some(updated_at);
            Ok(())
        })
    }

    async fn delete(&self, namespace: &Namespace, id: &NoteId) -> StoreResult<()> {
        let request = StoreRequest::Delete {
            namespace: namespace.clone(),
            id: id.clone(),
        };
        self.mutate(namespace, request, |state| {
            let notes = state
                .collections
                .get_mut(namespace)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            let before = notes.len();
            notes.retain(|note| &note.id != id);
            if notes.len() == before {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }

    fn subscribe_ordered(&self, namespace: &Namespace) -> Subscription {
        let initial = {
            let mut state = self.lock();
            state
                .requests
                .push(StoreRequest::Subscribe(namespace.clone()));
            state.snapshot(namespace)
        };
        let (id, deliveries) = self.listeners.register(namespace.clone(), Ok(initial));

        let store = self.clone();
        let released = namespace.clone();
        Subscription::new(id, namespace.clone(), deliveries, move || {
            store.listeners.remove(id);
            store.lock().requests.push(StoreRequest::Release(released));
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::UserId;

    fn namespace(user: &str) -> Namespace {
        Namespace::for_user(UserId::from(user))
    }

    fn titles(snapshot: &[Note]) -> Vec<&str> {
        snapshot.iter().map(|note| note.title.as_str()).collect()
    }

    #[tokio::test]
    async fn subscription_receives_initial_and_ordered_snapshots() {
        let store = MemoryStore::new();
        let ns = namespace("u1");
        let mut subscription = store.subscribe_ordered(&ns);
        assert_eq!(subscription.next().await, Some(Ok(Vec::new())));

        store.create(&ns, NoteFields::new("A", "a")).await.unwrap();
        store.create(&ns, NoteFields::new("B", "b")).await.unwrap();

        let first = subscription.next().await.unwrap().unwrap();
        assert_eq!(titles(&first), vec!["A"]);
        let second = subscription.next().await.unwrap().unwrap();
        assert_eq!(titles(&second), vec!["B", "A"]);
        assert!(second[0].created_at > second[1].created_at);
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let store = MemoryStore::new();
        store
            .create(&namespace("u1"), NoteFields::new("mine", "x"))
            .await
            .unwrap();
        assert!(store.notes(&namespace("u2")).is_empty());

        let mut other = store.subscribe_ordered(&namespace("u2"));
        assert_eq!(other.next().await, Some(Ok(Vec::new())));
    }

    #[tokio::test]
    async fn update_sets_fields_and_update_timestamp() {
        let store = MemoryStore::new();
        let ns = namespace("u1");
        let id = store.create(&ns, NoteFields::new("A", "a")).await.unwrap();
        store
            .update(&ns, &id, NoteFields::new("A2", "a2"))
            .await
            .unwrap();

        let notes = store.notes(&ns);
        assert_eq!(notes[0].title, "A2");
        assert_eq!(notes[0].content, "a2");
        assert!(notes[0].updated_at.unwrap() > notes[0].created_at);
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_note_are_not_found() {
        let store = MemoryStore::new();
        let ns = namespace("u1");
        let missing = NoteId::from("missing");
        assert_eq!(
            store.update(&ns, &missing, NoteFields::new("x", "y")).await,
            Err(StoreError::NotFound("missing".to_string()))
        );
        assert_eq!(
            store.delete(&ns, &missing).await,
            Err(StoreError::NotFound("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn injected_mutation_failure_applies_once() {
        let store = MemoryStore::new();
        let ns = namespace("u1");
        store.fail_next_mutation(StoreError::PermissionDenied("rules".to_string()));
        assert!(store.create(&ns, NoteFields::new("A", "a")).await.is_err());
        assert!(store.create(&ns, NoteFields::new("A", "a")).await.is_ok());
        assert_eq!(store.notes(&ns).len(), 1);
    }

    #[tokio::test]
    async fn dropping_subscription_records_release() {
        let store = MemoryStore::new();
        let ns = namespace("u1");
        let subscription = store.subscribe_ordered(&ns);
        assert_eq!(store.active_subscriptions(&ns), 1);
        drop(subscription);
        assert_eq!(store.active_subscriptions(&ns), 0);
        assert_eq!(
            store.requests(),
            vec![
                StoreRequest::Subscribe(ns.clone()),
                StoreRequest::Release(ns)
            ]
        );
    }

    #[tokio::test]
    async fn subscription_errors_are_delivered() {
        let store = MemoryStore::new();
        let ns = namespace("u1");
        let mut subscription = store.subscribe_ordered(&ns);
        subscription.next().await;
        let error = StoreError::Unavailable("offline".to_string());
        store.fail_subscriptions(&ns, &error);
        assert_eq!(subscription.next().await, Some(Err(error)));
    }
}
