//! Note list reconciliation and edit mode.
//!
//! The list shown to the user is always exactly the last snapshot the store
//! delivered. Mutations never touch the list directly; their effect shows up
//! when the store sends the next snapshot.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::models::{Namespace, Note, NoteFields, NoteId, UserId};
use crate::store::{DocumentStore, SnapshotResult, StoreError, StoreResult, Subscription};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotesError {
    #[error("Sign in to manage notes")]
    NotSignedIn,
    #[error("Title and content are both required")]
    EmptyFields,
    #[error("No note is being edited")]
    NotEditing,
    #[error("Note {0} is not in the list")]
    NoteNotFound(NoteId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Subscribe,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Subscribe => "load notes",
            Self::Create => "add note",
            Self::Update => "update note",
            Self::Delete => "delete note",
        };
        f.write_str(label)
    }
}

/// The last failure, tied to the operation that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub operation: Operation,
    pub message: String,
}

impl ViewError {
    fn new(operation: Operation, error: &StoreError) -> Self {
        Self {
            operation,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not {}: {}", self.operation, self.message)
    }
}

/// Working copy of the note being edited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub note_id: NoteId,
    pub title: String,
    pub content: String,
}

impl EditDraft {
    fn from_note(note: &Note) -> Self {
        Self {
            note_id: note.id.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
        }
    }

    #[must_use]
    pub fn fields(&self) -> NoteFields {
        NoteFields::new(self.title.clone(), self.content.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditMode {
    #[default]
    Viewing,
    Editing(EditDraft),
}

impl EditMode {
    #[must_use]
    pub const fn draft(&self) -> Option<&EditDraft> {
        match self {
            Self::Viewing => None,
            Self::Editing(draft) => Some(draft),
        }
    }
}

/// Everything a front end needs to render the notes panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotesViewState {
    pub user_id: Option<UserId>,
    /// Last delivered snapshot, newest first
    pub notes: Vec<Note>,
    pub mode: EditMode,
    /// The add-note form as typed
    pub form: NoteFields,
    pub error: Option<ViewError>,
}

impl NotesViewState {
    #[must_use]
    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| &note.id == id)
    }

    #[must_use]
    pub const fn is_editing(&self) -> bool {
        matches!(self.mode, EditMode::Editing(_))
    }
}

/// What [`NotesView::next_event`] just applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotesEvent {
    SnapshotApplied { count: usize, draft_discarded: bool },
    SubscriptionFailed(StoreError),
    SubscriptionClosed,
    MutationSucceeded { operation: Operation, note_id: NoteId },
    MutationFailed { operation: Operation, error: StoreError },
}

enum Mutation {
    Create(NoteFields),
    Update(NoteId, NoteFields),
    Delete(NoteId),
}

impl Mutation {
    const fn operation(&self) -> Operation {
        match self {
            Self::Create(_) => Operation::Create,
            Self::Update(..) => Operation::Update,
            Self::Delete(_) => Operation::Delete,
        }
    }

    async fn apply(self, store: &dyn DocumentStore, namespace: &Namespace) -> StoreResult<NoteId> {
        match self {
            Self::Create(fields) => store.create(namespace, fields).await,
            Self::Update(id, fields) => store.update(namespace, &id, fields).await.map(|()| id),
            Self::Delete(id) => store.delete(namespace, &id).await.map(|()| id),
        }
    }
}

struct MutationOutcome {
    namespace: Namespace,
    operation: Operation,
    result: StoreResult<NoteId>,
}

/// The notes panel for one signed-in user.
///
/// Owns at most one live subscription. Mutations run as background tasks and
/// report back through [`NotesView::next_event`]; outcomes for a previous
/// user scope are dropped.
pub struct NotesView {
    store: Arc<dyn DocumentStore>,
    subscription: Option<Subscription>,
    state: NotesViewState,
    observers: watch::Sender<NotesViewState>,
    outcome_sender: mpsc::UnboundedSender<MutationOutcome>,
    outcomes: mpsc::UnboundedReceiver<MutationOutcome>,
}

impl NotesView {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let (observers, _) = watch::channel(NotesViewState::default());
        let (outcome_sender, outcomes) = mpsc::unbounded_channel();
        Self {
            store,
            subscription: None,
            state: NotesViewState::default(),
            observers,
            outcome_sender,
            outcomes,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &NotesViewState {
        &self.state
    }

    /// Observe every state transition.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<NotesViewState> {
        self.observers.subscribe()
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Point the view at `user_id`'s notes, or at nothing.
    ///
    /// The previous subscription is released before a new one is opened.
    /// Switching to a different user also drops the old list, draft, and
    /// error so nothing from the previous scope stays on screen.
    pub fn subscribe(&mut self, user_id: Option<UserId>) {
        if let Some(previous) = self.subscription.take() {
            previous.unsubscribe();
        }
        if self.state.user_id != user_id {
            self.state.notes.clear();
            self.state.mode = EditMode::Viewing;
            self.state.error = None;
            self.state.user_id.clone_from(&user_id);
        }
        if let Some(user_id) = user_id {
            let namespace = Namespace::for_user(user_id);
            tracing::debug!("Subscribing to {}", namespace);
            self.subscription = Some(self.store.subscribe_ordered(&namespace));
        }
        self.publish();
    }

    pub fn set_form_title(&mut self, title: impl Into<String>) {
        self.state.form.title = title.into();
        self.publish();
    }

    pub fn set_form_content(&mut self, content: impl Into<String>) {
        self.state.form.content = content.into();
        self.publish();
    }

    /// Add a note from the add form.
    pub fn submit_form(&mut self) -> Result<(), NotesError> {
        let NoteFields { title, content } = self.state.form.clone();
        self.add_note(title, content)
    }

    /// Ask the store to create a note.
    ///
    /// The add form is cleared as soon as the request is issued; the note
    /// itself only appears with the next snapshot.
    pub fn add_note(
        &mut self,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), NotesError> {
        let namespace = self.namespace()?;
        let fields = NoteFields::new(title, content);
        if !fields.is_complete() {
            return Err(NotesError::EmptyFields);
        }
        self.state.form = NoteFields::default();
        self.spawn_mutation(namespace, Mutation::Create(fields));
        self.publish();
        Ok(())
    }

    /// Start editing `note_id`, initialised from the current snapshot.
    ///
    /// Returns the draft that was abandoned when another note was already
    /// being edited.
    pub fn begin_edit(&mut self, note_id: &NoteId) -> Result<Option<EditDraft>, NotesError> {
        if self
            .state
            .mode
            .draft()
            .is_some_and(|draft| &draft.note_id == note_id)
        {
            return Ok(None);
        }
        let draft = self
            .state
            .note(note_id)
            .map(EditDraft::from_note)
            .ok_or_else(|| NotesError::NoteNotFound(note_id.clone()))?;
        let previous = std::mem::replace(&mut self.state.mode, EditMode::Editing(draft));
        self.publish();
        Ok(match previous {
            EditMode::Viewing => None,
            EditMode::Editing(previous) => Some(previous),
        })
    }

    pub fn edit_draft_title(&mut self, title: impl Into<String>) -> Result<(), NotesError> {
        let EditMode::Editing(draft) = &mut self.state.mode else {
            return Err(NotesError::NotEditing);
        };
        draft.title = title.into();
        self.publish();
        Ok(())
    }

    pub fn edit_draft_content(&mut self, content: impl Into<String>) -> Result<(), NotesError> {
        let EditMode::Editing(draft) = &mut self.state.mode else {
            return Err(NotesError::NotEditing);
        };
        draft.content = content.into();
        self.publish();
        Ok(())
    }

    /// Send the draft to the store and go back to viewing.
    ///
    /// The view leaves edit mode when the update is issued, not when it
    /// completes. Nothing is sent when no note is being edited.
    pub fn save_edit(&mut self) -> Result<(), NotesError> {
        let Some(draft) = self.state.mode.draft() else {
            return Err(NotesError::NotEditing);
        };
        let fields = draft.fields();
        let note_id = draft.note_id.clone();
        let namespace = self.namespace()?;
        if !fields.is_complete() {
            return Err(NotesError::EmptyFields);
        }
        self.state.mode = EditMode::Viewing;
        self.spawn_mutation(namespace, Mutation::Update(note_id, fields));
        self.publish();
        Ok(())
    }

    /// Leave edit mode without touching the store.
    pub fn cancel_edit(&mut self) -> Option<EditDraft> {
        match std::mem::take(&mut self.state.mode) {
            EditMode::Viewing => None,
            EditMode::Editing(draft) => {
                self.publish();
                Some(draft)
            }
        }
    }

    /// Ask the store to delete `note_id`.
    ///
    /// A draft for the same note stays until a snapshot confirms the removal.
    pub fn delete_note(&mut self, note_id: &NoteId) -> Result<(), NotesError> {
        let namespace = self.namespace()?;
        self.spawn_mutation(namespace, Mutation::Delete(note_id.clone()));
        Ok(())
    }

    pub fn dismiss_error(&mut self) {
        if self.state.error.take().is_some() {
            self.publish();
        }
    }

    /// Wait for the next snapshot or mutation outcome and apply it.
    ///
    /// Snapshots take priority over mutation outcomes when both are ready.
    /// Stays pending forever while there is nothing left to wait for.
    pub async fn next_event(&mut self) -> NotesEvent {
        loop {
            tokio::select! {
                biased;
                delivery = next_delivery(self.subscription.as_mut()) => {
                    return match delivery {
                        Some(delivery) => self.apply_delivery(delivery),
                        None => {
                            tracing::warn!("Note subscription closed by the store");
                            self.subscription = None;
                            NotesEvent::SubscriptionClosed
                        }
                    };
                }
                Some(outcome) = self.outcomes.recv() => {
                    if let Some(event) = self.apply_outcome(outcome) {
                        return event;
                    }
                }
            }
        }
    }

    fn namespace(&self) -> Result<Namespace, NotesError> {
        self.state
            .user_id
            .clone()
            .map(Namespace::for_user)
            .ok_or(NotesError::NotSignedIn)
    }

    fn spawn_mutation(&self, namespace: Namespace, mutation: Mutation) {
        let store = Arc::clone(&self.store);
        let outcomes = self.outcome_sender.clone();
        let operation = mutation.operation();
        tokio::spawn(async move {
            let result = mutation.apply(store.as_ref(), &namespace).await;
            // The view may be gone by now
            outcomes
                .send(MutationOutcome {
                    namespace,
                    operation,
                    result,
                })
                .ok();
        });
    }

    fn apply_delivery(&mut self, delivery: SnapshotResult) -> NotesEvent {
        match delivery {
            Ok(notes) => {
                let draft_discarded = self
                    .state
                    .mode
                    .draft()
                    .is_some_and(|draft| !notes.iter().any(|note| note.id == draft.note_id));
                if draft_discarded {
                    tracing::info!("Edited note disappeared; leaving edit mode");
                    self.state.mode = EditMode::Viewing;
                }
                if self
                    .state
                    .error
                    .as_ref()
                    .is_some_and(|error| error.operation == Operation::Subscribe)
                {
                    self.state.error = None;
                }
                let count = notes.len();
                self.state.notes = notes;
                tracing::debug!("Applied snapshot with {} notes", count);
                self.publish();
                NotesEvent::SnapshotApplied {
                    count,
                    draft_discarded,
                }
            }
            Err(error) => {
                tracing::warn!("Note subscription failed: {}", error);
                self.state.error = Some(ViewError::new(Operation::Subscribe, &error));
                self.publish();
                NotesEvent::SubscriptionFailed(error)
            }
        }
    }

    fn apply_outcome(&mut self, outcome: MutationOutcome) -> Option<NotesEvent> {
        if self.namespace().ok().as_ref() != Some(&outcome.namespace) {
            tracing::debug!(
                "Dropping {} outcome for previous scope {}",
                outcome.operation,
                outcome.namespace
            );
            return None;
        }
        match outcome.result {
            Ok(note_id) => Some(NotesEvent::MutationSucceeded {
                operation: outcome.operation,
                note_id,
            }),
            Err(error) => {
                tracing::warn!("Failed to {}: {}", outcome.operation, error);
                self.state.error = Some(ViewError::new(outcome.operation, &error));
                self.publish();
                Some(NotesEvent::MutationFailed {
                    operation: outcome.operation,
                    error,
                })
            }
        }
    }

    fn publish(&self) {
        self.observers.send_replace(self.state.clone());
    }
}

async fn next_delivery(subscription: Option<&mut Subscription>) -> Option<SnapshotResult> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::{MemoryStore, StoreRequest};

    fn namespace(user: &str) -> Namespace {
        Namespace::for_user(UserId::from(user))
    }

    fn view(store: &MemoryStore) -> NotesView {
        NotesView::new(Arc::new(store.clone()))
    }

    fn titles(view: &NotesView) -> Vec<&str> {
        view.state()
            .notes
            .iter()
            .map(|note| note.title.as_str())
            .collect()
    }

    async fn subscribed(store: &MemoryStore, user: &str) -> NotesView {
        let mut view = view(store);
        view.subscribe(Some(UserId::from(user)));
        assert!(matches!(
            view.next_event().await,
            NotesEvent::SnapshotApplied { .. }
        ));
        view
    }

    async fn next_snapshot(view: &mut NotesView) -> NotesEvent {
        loop {
            let event = view.next_event().await;
            if matches!(event, NotesEvent::SnapshotApplied { .. }) {
                return event;
            }
        }
    }

    async fn seed(store: &MemoryStore, user: &str, title: &str, content: &str) -> NoteId {
        store
            .create(&namespace(user), NoteFields::new(title, content))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn each_snapshot_replaces_the_list() {
        let store = MemoryStore::new();
        let mut view = subscribed(&store, "u1").await;
        assert!(view.state().notes.is_empty());

        seed(&store, "u1", "A", "a").await;
        next_snapshot(&mut view).await;
        assert_eq!(view.state().notes, store.notes(&namespace("u1")));

        let b = seed(&store, "u1", "B", "b").await;
        next_snapshot(&mut view).await;
        assert_eq!(titles(&view), vec!["B", "A"]);

        store.delete(&namespace("u1"), &b).await.unwrap();
        next_snapshot(&mut view).await;
        assert_eq!(titles(&view), vec!["A"]);
    }

    #[tokio::test]
    async fn add_note_issues_one_create_and_clears_form() {
        let store = MemoryStore::new();
        let mut view = subscribed(&store, "u1").await;
        view.set_form_title("draft title");

        view.add_note("Groceries", "milk,eggs").unwrap();
        assert_eq!(view.state().form, NoteFields::default());
        assert!(view.state().notes.is_empty());

        assert_eq!(
            next_snapshot(&mut view).await,
            NotesEvent::SnapshotApplied {
                count: 1,
                draft_discarded: false
            }
        );
        let note = &view.state().notes[0];
        assert_eq!(note.title, "Groceries");
        assert_eq!(note.content, "milk,eggs");
        assert!(note.created_at > 0);

        let creates: Vec<_> = store
            .requests()
            .into_iter()
            .filter(|request| matches!(request, StoreRequest::Create { .. }))
            .collect();
        assert_eq!(
            creates,
            vec![StoreRequest::Create {
                namespace: namespace("u1"),
                fields: NoteFields::new("Groceries", "milk,eggs"),
            }]
        );
    }

    #[tokio::test]
    async fn blank_fields_issue_no_create() {
        let store = MemoryStore::new();
        let mut view = subscribed(&store, "u1").await;

        assert_eq!(view.add_note("", "x"), Err(NotesError::EmptyFields));
        assert_eq!(view.add_note("x", ""), Err(NotesError::EmptyFields));
        assert_eq!(view.add_note("   ", "x"), Err(NotesError::EmptyFields));
        assert_eq!(
            store.requests(),
            vec![StoreRequest::Subscribe(namespace("u1"))]
        );
    }

    #[tokio::test]
    async fn rejected_form_keeps_typed_values() {
        let store = MemoryStore::new();
        let mut view = subscribed(&store, "u1").await;
        view.set_form_title("only a title");

        assert_eq!(view.submit_form(), Err(NotesError::EmptyFields));
        assert_eq!(view.state().form.title, "only a title");

        view.set_form_content("and content");
        view.submit_form().unwrap();
        assert_eq!(view.state().form, NoteFields::default());
    }

    #[tokio::test]
    async fn mutations_require_a_user() {
        let store = MemoryStore::new();
        let mut view = view(&store);
        view.subscribe(None);

        assert_eq!(view.add_note("A", "a"), Err(NotesError::NotSignedIn));
        assert_eq!(
            view.delete_note(&NoteId::from("n1")),
            Err(NotesError::NotSignedIn)
        );
        assert!(store.requests().is_empty());
        assert!(!view.is_subscribed());
    }

    #[tokio::test]
    async fn save_while_viewing_is_rejected_without_request() {
        let store = MemoryStore::new();
        let mut view = subscribed(&store, "u1").await;
        assert_eq!(view.save_edit(), Err(NotesError::NotEditing));
        assert_eq!(
            store.requests(),
            vec![StoreRequest::Subscribe(namespace("u1"))]
        );
    }

    #[tokio::test]
    async fn begin_then_cancel_edit_touches_nothing() {
        let store = MemoryStore::new();
        let id = seed(&store, "u1", "A", "a").await;
        let mut view = subscribed(&store, "u1").await;

        assert_eq!(view.begin_edit(&id), Ok(None));
        let draft = view.state().mode.draft().cloned().unwrap();
        assert_eq!((draft.title.as_str(), draft.content.as_str()), ("A", "a"));

        view.edit_draft_title("changed").unwrap();
        let cancelled = view.cancel_edit().unwrap();
        assert_eq!(cancelled.title, "changed");
        assert_eq!(view.state().mode, EditMode::Viewing);
        assert_eq!(view.state().notes[0].title, "A");
        assert_eq!(
            store.requests(),
            vec![
                StoreRequest::Create {
                    namespace: namespace("u1"),
                    fields: NoteFields::new("A", "a"),
                },
                StoreRequest::Subscribe(namespace("u1")),
            ]
        );
    }

    #[tokio::test]
    async fn begin_edit_on_another_note_replaces_draft() {
        let store = MemoryStore::new();
        let first = seed(&store, "u1", "A", "a").await;
        let second = seed(&store, "u1", "B", "b").await;
        let mut view = subscribed(&store, "u1").await;

        view.begin_edit(&first).unwrap();
        view.edit_draft_content("half typed").unwrap();
        let abandoned = view.begin_edit(&second).unwrap().unwrap();
        assert_eq!(abandoned.note_id, first);
        assert_eq!(abandoned.content, "half typed");
        assert_eq!(view.state().mode.draft().unwrap().note_id, second);

        assert_eq!(view.begin_edit(&second), Ok(None));
        assert_eq!(
            view.begin_edit(&NoteId::from("missing")),
            Err(NotesError::NoteNotFound(NoteId::from("missing")))
        );
        assert_eq!(view.state().mode.draft().unwrap().note_id, second);
    }

    #[tokio::test]
    async fn save_edit_leaves_edit_mode_on_issue() {
        let store = MemoryStore::new();
        let id = seed(&store, "u1", "A", "a").await;
        let mut view = subscribed(&store, "u1").await;

        view.begin_edit(&id).unwrap();
        view.edit_draft_title("A2").unwrap();
        view.edit_draft_content("a2").unwrap();
        view.save_edit().unwrap();
        assert_eq!(view.state().mode, EditMode::Viewing);
        assert_eq!(view.state().notes[0].title, "A");

        next_snapshot(&mut view).await;
        let note = &view.state().notes[0];
        assert_eq!((note.title.as_str(), note.content.as_str()), ("A2", "a2"));
        assert!(note.updated_at.is_some());
    }

    #[tokio::test]
    async fn save_edit_with_blank_draft_stays_editing() {
        let store = MemoryStore::new();
        let id = seed(&store, "u1", "A", "a").await;
        let mut view = subscribed(&store, "u1").await;

        view.begin_edit(&id).unwrap();
        view.edit_draft_content("  ").unwrap();
        assert_eq!(view.save_edit(), Err(NotesError::EmptyFields));
        assert!(view.state().is_editing());
        assert!(!store
            .requests()
            .iter()
            .any(|request| matches!(request, StoreRequest::Update { .. })));
    }

    #[tokio::test]
    async fn draft_is_dropped_when_note_leaves_snapshot() {
        let store = MemoryStore::new();
        let edited = seed(&store, "u1", "A", "a").await;
        let mut view = subscribed(&store, "u1").await;
        view.begin_edit(&edited).unwrap();

        // Removed elsewhere
        store.delete(&namespace("u1"), &edited).await.unwrap();
        assert_eq!(
            view.next_event().await,
            NotesEvent::SnapshotApplied {
                count: 0,
                draft_discarded: true
            }
        );
        assert_eq!(view.state().mode, EditMode::Viewing);

        seed(&store, "u1", "B", "b").await;
        assert_eq!(
            view.next_event().await,
            NotesEvent::SnapshotApplied {
                count: 1,
                draft_discarded: false
            }
        );
        assert_eq!(view.state().mode, EditMode::Viewing);
    }

    #[tokio::test]
    async fn deleting_edited_note_waits_for_snapshot() {
        let store = MemoryStore::new();
        let id = seed(&store, "u1", "A", "a").await;
        let mut view = subscribed(&store, "u1").await;
        view.begin_edit(&id).unwrap();

        view.delete_note(&id).unwrap();
        assert!(view.state().is_editing());

        next_snapshot(&mut view).await;
        assert_eq!(view.state().mode, EditMode::Viewing);
        assert!(view.state().notes.is_empty());
    }

    #[tokio::test]
    async fn subscription_error_keeps_last_list() {
        let store = MemoryStore::new();
        seed(&store, "u1", "A", "a").await;
        let mut view = subscribed(&store, "u1").await;

        let error = StoreError::PermissionDenied("rules".to_string());
        store.fail_subscriptions(&namespace("u1"), &error);
        assert_eq!(
            view.next_event().await,
            NotesEvent::SubscriptionFailed(error)
        );
        assert_eq!(titles(&view), vec!["A"]);
        assert_eq!(
            view.state().error.as_ref().map(|error| error.operation),
            Some(Operation::Subscribe)
        );

        seed(&store, "u1", "B", "b").await;
        next_snapshot(&mut view).await;
        assert_eq!(view.state().error, None);
    }

    #[tokio::test]
    async fn failed_create_is_surfaced_without_restoring_form() {
        let store = MemoryStore::new();
        let mut view = subscribed(&store, "u1").await;
        store.fail_next_mutation(StoreError::PermissionDenied("rules".to_string()));

        view.add_note("A", "a").unwrap();
        assert_eq!(
            view.next_event().await,
            NotesEvent::MutationFailed {
                operation: Operation::Create,
                error: StoreError::PermissionDenied("rules".to_string()),
            }
        );
        assert_eq!(view.state().form, NoteFields::default());
        let error = view.state().error.clone().unwrap();
        assert_eq!(error.operation, Operation::Create);
        assert_eq!(
            error.to_string(),
            "Could not add note: Permission denied: rules"
        );

        view.dismiss_error();
        assert_eq!(view.state().error, None);
    }

    #[tokio::test]
    async fn rescoping_releases_old_subscription_first() {
        let store = MemoryStore::new();
        seed(&store, "u1", "mine", "x").await;
        let mut view = subscribed(&store, "u1").await;
        assert_eq!(titles(&view), vec!["mine"]);

        view.subscribe(Some(UserId::from("u2")));
        assert!(view.state().notes.is_empty());
        next_snapshot(&mut view).await;
        assert!(view.state().notes.is_empty());

        let subscriptions: Vec<_> = store
            .requests()
            .into_iter()
            .filter(|request| {
                matches!(
                    request,
                    StoreRequest::Subscribe(_) | StoreRequest::Release(_)
                )
            })
            .collect();
        assert_eq!(
            subscriptions,
            vec![
                StoreRequest::Subscribe(namespace("u1")),
                StoreRequest::Release(namespace("u1")),
                StoreRequest::Subscribe(namespace("u2")),
            ]
        );
        assert_eq!(store.active_subscriptions(&namespace("u1")), 0);
        assert_eq!(store.active_subscriptions(&namespace("u2")), 1);
    }

    #[tokio::test]
    async fn outcomes_from_previous_scope_are_dropped() {
        let store = MemoryStore::new();
        let mut view = subscribed(&store, "u1").await;
        store.fail_next_mutation(StoreError::Unavailable("offline".to_string()));
        view.add_note("A", "a").unwrap();

        view.subscribe(Some(UserId::from("u2")));
        next_snapshot(&mut view).await;
        let pending = tokio::time::timeout(Duration::from_millis(50), view.next_event()).await;
        assert!(pending.is_err());
        assert_eq!(view.state().error, None);
    }

    #[tokio::test]
    async fn dropping_view_releases_subscription() {
        let store = MemoryStore::new();
        let view = subscribed(&store, "u1").await;
        assert_eq!(store.active_subscriptions(&namespace("u1")), 1);
        drop(view);
        assert_eq!(store.active_subscriptions(&namespace("u1")), 0);
    }

    #[tokio::test]
    async fn observers_see_transitions() {
        let store = MemoryStore::new();
        let mut view = subscribed(&store, "u1").await;
        let observer = view.watch();

        view.set_form_title("Groceries");
        assert_eq!(observer.borrow().form.title, "Groceries");
        view.set_form_content("milk");
        view.submit_form().unwrap();
        assert_eq!(observer.borrow().form, NoteFields::default());

        next_snapshot(&mut view).await;
        assert_eq!(observer.borrow().notes.len(), 1);
    }
}
