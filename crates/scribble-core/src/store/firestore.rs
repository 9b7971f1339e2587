//! Cloud Firestore adapter over the REST API.
//!
//! Writes go through `documents:commit` so the server stamps `createdAt` and
//! `updatedAt` itself. The REST surface has no push channel, so a live query
//! is a polling `runQuery` loop that delivers a snapshot whenever the result
//! differs from the last one delivered, and re-polls right after local
//! writes to the same namespace.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

use super::{DocumentStore, SnapshotResult, StoreError, StoreResult, Subscription, SubscriptionId};
use crate::auth::AccessTokenSource;
use crate::config::FirebaseConfig;
use crate::models::{order_newest_first, Namespace, Note, NoteFields, NoteId};
use crate::util::compact_text;

const CREATED_AT_FIELD: &str = "createdAt";
const UPDATED_AT_FIELD: &str = "updatedAt";
const LOCAL_WRITE_CAPACITY: usize = 64;

struct FirestoreClient {
    client: Client,
    /// `{base}/projects/{p}/databases/(default)/documents`
    documents_url: String,
    /// `projects/{p}/databases/(default)`
    database_name: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl FirestoreClient {
    async fn bearer(&self) -> StoreResult<String> {
        self.tokens
            .access_token()
            .await?
            .ok_or_else(|| StoreError::Unauthenticated("No active session".to_string()))
    }

    fn document_name(&self, namespace: &Namespace, id: &NoteId) -> String {
        format!(
            "{}/documents/{}",
            self.database_name,
            namespace.document_path(id)
        )
    }

    async fn commit(&self, write: serde_json::Value) -> StoreResult<()> {
        let token = self.bearer().await?;
        let response = self
            .client
            .post(format!("{}:commit", self.documents_url))
            .bearer_auth(token)
            .json(&json!({ "writes": [write] }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_store_error(status, &body, true));
        }
        Ok(())
    }

    async fn run_query(&self, namespace: &Namespace) -> SnapshotResult {
        let token = self.bearer().await?;
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": Namespace::COLLECTION }],
                "orderBy": [{
                    "field": { "fieldPath": CREATED_AT_FIELD },
                    "direction": "DESCENDING",
                }],
            }
        });
        let response = self
            .client
            .post(format!(
                "{}/{}:runQuery",
                self.documents_url,
                namespace.parent_path()
            ))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_store_error(status, &body, false));
        }

        let body = response.text().await?;
        parse_run_query(&body)
    }
}

pub struct FirestoreStore {
    inner: Arc<FirestoreClient>,
    poll_interval: Duration,
    local_writes: broadcast::Sender<Namespace>,
    next_subscription: AtomicU64,
}

impl FirestoreStore {
    pub fn new(config: &FirebaseConfig, tokens: Arc<dyn AccessTokenSource>) -> StoreResult<Self> {
        let client = Client::builder().build()?;
        let database_name = config.database_name();
        let (local_writes, _) = broadcast::channel(LOCAL_WRITE_CAPACITY);
        Ok(Self {
            inner: Arc::new(FirestoreClient {
                client,
                documents_url: format!("{}/{}/documents", config.firestore_url(), database_name),
                database_name,
                tokens,
            }),
            poll_interval: config.poll_interval(),
            local_writes,
            next_subscription: AtomicU64::new(1),
        })
    }

    fn announce_write(&self, namespace: &Namespace) {
        // No receivers just means no live query on this store
        self.local_writes.send(namespace.clone()).ok();
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn create(&self, namespace: &Namespace, fields: NoteFields) -> StoreResult<NoteId> {
        let id = NoteId::generate();
        let write = json!({
            "update": {
                "name": self.inner.document_name(namespace, &id),
                "fields": encode_fields(&fields),
            },
            "updateTransforms": [
                { "fieldPath": CREATED_AT_FIELD, "setToServerValue": "REQUEST_TIME" },
            ],
            "currentDocument": { "exists": false },
        });
        self.inner.commit(write).await?;
        tracing::info!("Created note {} in {}", id, namespace);
        self.announce_write(namespace);
        Ok(id)
    }

    async fn update(
        &self,
        namespace: &Namespace,
        id: &NoteId,
        fields: NoteFields,
    ) -> StoreResult<()> {
        let write = json!({
            "update": {
                "name": self.inner.document_name(namespace, id),
                "fields": encode_fields(&fields),
            },
            "updateMask": { "fieldPaths": ["title", "content"] },
            "updateTransforms": [
                { "fieldPath": UPDATED_AT_FIELD, "setToServerValue": "REQUEST_TIME" },
            ],
            "currentDocument": { "exists": true },
        });
        self.inner.commit(write).await?;
        tracing::info!("Updated note {} in {}", id, namespace);
        self.announce_write(namespace);
        Ok(())
    }

    async fn delete(&self, namespace: &Namespace, id: &NoteId) -> StoreResult<()> {
        let write = json!({
            "delete": self.inner.document_name(namespace, id),
            "currentDocument": { "exists": true },
        });
        self.inner.commit(write).await?;
        tracing::info!("Deleted note {} in {}", id, namespace);
        self.announce_write(namespace);
        Ok(())
    }

    /// Must be called from within a tokio runtime.
    fn subscribe_ordered(&self, namespace: &Namespace) -> Subscription {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let (sender, deliveries) = mpsc::unbounded_channel();
        let poller = tokio::spawn(poll_query(
            Arc::clone(&self.inner),
            namespace.clone(),
            self.poll_interval,
            self.local_writes.subscribe(),
            sender,
        ));
        Subscription::new(id, namespace.clone(), deliveries, move || poller.abort())
    }
}

async fn poll_query(
    client: Arc<FirestoreClient>,
    namespace: Namespace,
    interval: Duration,
    mut local_writes: broadcast::Receiver<Namespace>,
    sender: mpsc::UnboundedSender<SnapshotResult>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_delivered: Option<Vec<Note>> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            written = local_writes.recv() => match written {
                Ok(written) if written != namespace => continue,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => ticker.reset(),
                Err(broadcast::error::RecvError::Closed) => return,
            },
            () = sender.closed() => return,
        }

        let delivery = match client.run_query(&namespace).await {
            Ok(snapshot) if last_delivered.as_ref() == Some(&snapshot) => continue,
            Ok(snapshot) => {
                last_delivered = Some(snapshot.clone());
                Ok(snapshot)
            }
            Err(error) => {
                tracing::warn!("Query on {} failed: {}", namespace, error);
                // The next good result must reach the observer even if unchanged
                last_delivered = None;
                Err(error)
            }
        };
        if sender.send(delivery).is_err() {
            return;
        }
    }
}

fn encode_fields(fields: &NoteFields) -> serde_json::Value {
    json!({
        "title": { "stringValue": fields.title },
        "content": { "stringValue": fields.content },
    })
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<FirestoreDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: HashMap<String, FieldValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldValue {
    string_value: Option<String>,
    timestamp_value: Option<String>,
}

impl FirestoreDocument {
    fn string_field(&self, field: &str) -> Option<String> {
        self.fields
            .get(field)
            .and_then(|value| value.string_value.clone())
    }

    fn timestamp_field(&self, field: &str) -> Option<i64> {
        self.fields
            .get(field)
            .and_then(|value| value.timestamp_value.as_deref())
            .and_then(parse_timestamp_millis)
    }

    fn into_note(self) -> Option<Note> {
        let id = self.name.rsplit('/').next()?.to_string();
        let title = self.string_field("title")?;
        let content = self.string_field("content")?;
        let created_at = self.timestamp_field(CREATED_AT_FIELD)?;
        Some(Note {
            id: NoteId::new(id),
            title,
            content,
            created_at,
            updated_at: self.timestamp_field(UPDATED_AT_FIELD),
        })
    }
}

fn parse_timestamp_millis(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|time| time.timestamp_millis())
}

/// Turn a `runQuery` response stream into a snapshot.
///
/// Documents missing a title, content, or `createdAt` are skipped rather than failing the
/// whole snapshot.
fn parse_run_query(body: &str) -> SnapshotResult {
    let items: Vec<RunQueryItem> = serde_json::from_str(body)?;
    let mut notes = Vec::with_capacity(items.len());
    for document in items.into_iter().filter_map(|item| item.document) {
        let name = document.name.clone();
        match document.into_note() {
            Some(note) => notes.push(note),
            None => tracing::warn!("Skipping malformed note document {}", name),
        }
    }
    order_newest_first(&mut notes);
    Ok(notes)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorStatus>,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    message: Option<String>,
    status: Option<String>,
}

/// Map a Google API error body to the store taxonomy.
///
/// `precondition_is_missing` marks write requests guarded by an `exists`
/// precondition, where a failed precondition means the note vanished.
fn parse_store_error(status: StatusCode, body: &str, precondition_is_missing: bool) -> StoreError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok().or_else(|| {
        serde_json::from_str::<Vec<ErrorEnvelope>>(body)
            .ok()
            .and_then(|items| items.into_iter().next())
    });
    let error = envelope.and_then(|envelope| envelope.error);
    let code = error
        .as_ref()
        .and_then(|error| error.status.clone())
        .unwrap_or_default();
    let message = error
        .and_then(|error| error.message)
        .map(|message| compact_text(&message))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            let body = compact_text(body);
            if body.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                body
            }
        });

    match (code.as_str(), status) {
        ("PERMISSION_DENIED", _) | (_, StatusCode::FORBIDDEN) => {
            StoreError::PermissionDenied(message)
        }
        ("UNAUTHENTICATED", _) | (_, StatusCode::UNAUTHORIZED) => {
            StoreError::Unauthenticated(message)
        }
        ("NOT_FOUND", _) | (_, StatusCode::NOT_FOUND) => StoreError::NotFound(message),
        ("FAILED_PRECONDITION", _) if precondition_is_missing => StoreError::NotFound(message),
        ("UNAVAILABLE" | "DEADLINE_EXCEEDED" | "RESOURCE_EXHAUSTED", _)
        | (_, StatusCode::SERVICE_UNAVAILABLE | StatusCode::TOO_MANY_REQUESTS) => {
            StoreError::Unavailable(message)
        }
        _ => StoreError::Api(format!("{} ({})", message, status.as_u16())),
    }
}
