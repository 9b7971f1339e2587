//! Top-level session shell: picks the auth or notes branch from the
//! provider's session notifications.

use std::sync::Arc;

use crate::auth::{AuthResult, AuthUser, IdentityProvider, SessionChanges, SessionState};
use crate::backend::Backend;

use super::{AuthView, NotesEvent, NotesView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Waiting for the first session notification
    Loading,
    SignedOut,
    SignedIn(AuthUser),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    SessionChanged(Screen),
    Notes(NotesEvent),
    /// The identity provider went away; no further session changes will come
    ProviderClosed,
}

pub struct SessionShell {
    identity: Arc<dyn IdentityProvider>,
    backend: Backend,
    changes: SessionChanges,
    session: SessionState,
    auth: AuthView,
    notes: Option<NotesView>,
}

impl SessionShell {
    pub fn new(backend: Backend) -> Self {
        let identity = backend.identity();
        let changes = identity.session_changes();
        let auth = AuthView::new(Arc::clone(&identity));
        let mut shell = Self {
            identity,
            backend,
            changes,
            session: SessionState::Unknown,
            auth,
            notes: None,
        };
        let current = shell.changes.current();
        shell.apply_session(current);
        shell
    }

    /// Ask the provider for the initial session.
    ///
    /// The outcome arrives as a session change like any other.
    pub async fn start(&self) -> AuthResult<()> {
        self.identity.restore_session().await.map(|_| ())
    }

    #[must_use]
    pub const fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub fn screen(&self) -> Screen {
        match &self.session {
            SessionState::Unknown => Screen::Loading,
            SessionState::Unauthenticated => Screen::SignedOut,
            SessionState::Authenticated(session) => Screen::SignedIn(session.user.clone()),
        }
    }

    #[must_use]
    pub const fn auth(&self) -> &AuthView {
        &self.auth
    }

    pub fn auth_mut(&mut self) -> &mut AuthView {
        &mut self.auth
    }

    /// The notes panel, mounted only while signed in.
    #[must_use]
    pub const fn notes(&self) -> Option<&NotesView> {
        self.notes.as_ref()
    }

    pub fn notes_mut(&mut self) -> Option<&mut NotesView> {
        self.notes.as_mut()
    }

    /// Ask the provider to end the session.
    ///
    /// The screen only changes once the provider reports the sign-out.
    pub async fn sign_out(&self) -> AuthResult<()> {
        self.identity.sign_out().await
    }

    /// Wait for a session change or a notes panel event and apply it.
    ///
    /// Session changes win when both are ready.
    pub async fn next_event(&mut self) -> ShellEvent {
        tokio::select! {
            biased;
            changed = self.changes.changed() => match changed {
                Some(state) => {
                    self.apply_session(state);
                    ShellEvent::SessionChanged(self.screen())
                }
                None => ShellEvent::ProviderClosed,
            },
            event = next_notes_event(self.notes.as_mut()) => ShellEvent::Notes(event),
        }
    }

    fn apply_session(&mut self, state: SessionState) {
        match &state {
            SessionState::Authenticated(session) => {
                let user_id = session.user_id().clone();
                let notes = self
                    .notes
                    .get_or_insert_with(|| NotesView::new(self.backend.store()));
                if notes.state().user_id.as_ref() != Some(&user_id) {
                    tracing::info!("Showing notes for {}", user_id);
                    notes.subscribe(Some(user_id));
                }
                self.auth.reset();
            }
            SessionState::Unauthenticated | SessionState::Unknown => {
                if self.notes.take().is_some() {
                    tracing::info!("Signed out; notes closed");
                }
            }
        }
        self.session = state;
    }
}

async fn next_notes_event(notes: Option<&mut NotesView>) -> NotesEvent {
    match notes {
        Some(notes) => notes.next_event().await,
        None => std::future::pending().await,
    }
}
