//! Fan-out of snapshots to the live subscriptions of a namespace.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use super::{SnapshotResult, StoreError, SubscriptionId};
use crate::models::{Namespace, Note};

struct Listener {
    namespace: Namespace,
    sender: mpsc::UnboundedSender<SnapshotResult>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl ListenerRegistry {
    /// Add a listener and hand it its first snapshot.
    pub(crate) fn register(
        &self,
        namespace: Namespace,
        initial: SnapshotResult,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<SnapshotResult>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        // Receiver is alive in this scope, so the first send cannot fail
        let _ = sender.send(initial);

        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.insert(id, Listener { namespace, sender });
        (SubscriptionId(id), receiver)
    }

    pub(crate) fn remove(&self, id: SubscriptionId) {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        registry.listeners.remove(&id.0);
    }

    /// Deliver a snapshot to every listener of `namespace`.
    pub(crate) fn notify(&self, namespace: &Namespace, snapshot: &[Note]) {
        self.deliver(namespace, || Ok(snapshot.to_vec()));
    }

    /// Deliver an error to every listener of `namespace`.
    pub(crate) fn fail(&self, namespace: &Namespace, error: &StoreError) {
        self.deliver(namespace, || Err(error.clone()));
    }

    pub(crate) fn active_count(&self, namespace: &Namespace) -> usize {
        let registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        registry
            .listeners
            .values()
            .filter(|listener| &listener.namespace == namespace)
            .count()
    }

    fn deliver(&self, namespace: &Namespace, delivery: impl Fn() -> SnapshotResult) {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        registry.listeners.retain(|_, listener| {
            if &listener.namespace != namespace {
                return true;
            }
            listener.sender.send(delivery()).is_ok()
        });
    }
}
