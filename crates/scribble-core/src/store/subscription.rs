//! Scoped handle for a live ordered query.

use std::fmt;

use tokio::sync::mpsc;

use super::SnapshotResult;
use crate::models::Namespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// A live query; dropping it releases the query on the store side.
pub struct Subscription {
    id: SubscriptionId,
    namespace: Namespace,
    deliveries: mpsc::UnboundedReceiver<SnapshotResult>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        namespace: Namespace,
        deliveries: mpsc::UnboundedReceiver<SnapshotResult>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        tracing::debug!("Opened {} on {}", id, namespace);
        Self {
            id,
            namespace,
            deliveries,
            release: Some(Box::new(release)),
        }
    }

    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Wait for the next delivery.
    ///
    /// Returns `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<SnapshotResult> {
        self.deliveries.recv().await
    }

    /// Release the query now instead of at the end of scope.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            tracing::debug!("Released {} on {}", self.id, self.namespace);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::models::UserId;

    #[tokio::test]
    async fn release_runs_exactly_once_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = mpsc::unbounded_channel();
        let counter = Arc::clone(&released);
        let mut subscription = Subscription::new(
            SubscriptionId(7),
            Namespace::for_user(UserId::from("u1")),
            receiver,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        sender.send(Ok(Vec::new())).unwrap();
        assert_eq!(subscription.next().await, Some(Ok(Vec::new())));
        assert_eq!(released.load(Ordering::SeqCst), 0);

        subscription.unsubscribe();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
