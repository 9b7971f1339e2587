//! Sign-in / registration form.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::auth::{is_email_shaped, AuthError, FederatedCredential, IdentityProvider, Session};

const PASSWORD_MASK: char = '*';

#[derive(Debug, Error)]
pub enum AuthViewError {
    #[error("Enter a valid email address")]
    InvalidEmail,
    #[error("Password is required")]
    EmptyPassword,
    #[error(transparent)]
    Provider(#[from] AuthError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    SignIn,
    Register,
}

impl AuthMode {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::SignIn => Self::Register,
            Self::Register => Self::SignIn,
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::SignIn => "Sign In",
            Self::Register => "Create Account",
        }
    }

    /// Hint for switching to the other mode.
    #[must_use]
    pub const fn switch_hint(self) -> &'static str {
        match self {
            Self::SignIn => "Don't have an account? Register",
            Self::Register => "Already have an account? Sign in",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthViewState {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    pub show_password: bool,
    pub submitting: bool,
    /// Error text from the last failed attempt, shown as-is
    pub error: Option<String>,
}

impl AuthViewState {
    /// The password as it should be displayed.
    #[must_use]
    pub fn password_display(&self) -> String {
        if self.show_password {
            self.password.clone()
        } else {
            PASSWORD_MASK.to_string().repeat(self.password.chars().count())
        }
    }
}

pub struct AuthView {
    identity: Arc<dyn IdentityProvider>,
    state: AuthViewState,
    observers: watch::Sender<AuthViewState>,
}

impl AuthView {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        let (observers, _) = watch::channel(AuthViewState::default());
        Self {
            identity,
            state: AuthViewState::default(),
            observers,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &AuthViewState {
        &self.state
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthViewState> {
        self.observers.subscribe()
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.state.email = email.into();
        self.publish();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.state.password = password.into();
        self.publish();
    }

    /// Switch between signing in and registering, keeping what was typed.
    pub fn toggle_mode(&mut self) {
        self.state.mode = self.state.mode.toggled();
        self.state.error = None;
        self.publish();
    }

    pub fn toggle_password_visibility(&mut self) {
        self.state.show_password = !self.state.show_password;
        self.publish();
    }

    /// Back to an empty sign-in form.
    pub fn reset(&mut self) {
        self.state = AuthViewState::default();
        self.publish();
    }

    /// Sign in or register, depending on the mode.
    ///
    /// The session itself arrives through the provider's session changes;
    /// the returned session is informational.
    pub async fn submit(&mut self) -> Result<Session, AuthViewError> {
        let email = self.state.email.trim().to_string();
        if !is_email_shaped(&email) {
            return Err(self.fail(AuthViewError::InvalidEmail));
        }
        if self.state.password.is_empty() {
            return Err(self.fail(AuthViewError::EmptyPassword));
        }

        self.begin_attempt();
        let password = self.state.password.clone();
        let result = match self.state.mode {
            AuthMode::SignIn => self.identity.check_credentials(&email, &password).await,
            AuthMode::Register => self.identity.register(&email, &password).await,
        };
        self.finish_attempt(result)
    }

    /// Sign in with a token from a federated identity provider.
    pub async fn federated_sign_in(
        &mut self,
        credential: &FederatedCredential,
    ) -> Result<Session, AuthViewError> {
        self.begin_attempt();
        let result = self.identity.federated_sign_in(credential).await;
        self.finish_attempt(result)
    }

    fn begin_attempt(&mut self) {
        self.state.error = None;
        self.state.submitting = true;
        self.publish();
    }

    fn finish_attempt(
        &mut self,
        result: Result<Session, AuthError>,
    ) -> Result<Session, AuthViewError> {
        self.state.submitting = false;
        match result {
            Ok(session) => {
                tracing::info!("Signed in as {}", session.user_id());
                self.state.password.clear();
                self.publish();
                Ok(session)
            }
            Err(error) => Err(self.fail(error.into())),
        }
    }

    fn fail(&mut self, error: AuthViewError) -> AuthViewError {
        tracing::debug!("Authentication attempt failed: {}", error);
        self.state.error = Some(error.to_string());
        self.publish();
        error
    }

    fn publish(&self) {
        self.observers.send_replace(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::{MemoryIdentityProvider, SessionState};

    fn view() -> (Arc<MemoryIdentityProvider>, AuthView) {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let view = AuthView::new(identity.clone());
        (identity, view)
    }

    fn fill(view: &mut AuthView, email: &str, password: &str) {
        view.set_email(email);
        view.set_password(password);
    }

    #[tokio::test]
    async fn register_then_sign_in() {
        let (identity, mut view) = view();
        let changes = identity.session_changes();

        view.toggle_mode();
        fill(&mut view, "ada@example.com", "secret1");
        let registered = view.submit().await.unwrap();
        assert_eq!(
            changes.current().session().map(Session::user_id),
            Some(registered.user_id())
        );
        assert_eq!(view.state().password, "");

        identity.sign_out().await.unwrap();
        view.toggle_mode();
        fill(&mut view, "ada@example.com", "secret1");
        let signed_in = view.submit().await.unwrap();
        assert_eq!(signed_in.user_id(), registered.user_id());
    }

    #[tokio::test]
    async fn provider_errors_are_shown_verbatim() {
        let (_identity, mut view) = view();
        fill(&mut view, "ada@example.com", "wrong-password");

        let error = view.submit().await.unwrap_err();
        assert!(matches!(
            error,
            AuthViewError::Provider(AuthError::InvalidCredentials(_))
        ));
        assert_eq!(
            view.state().error.as_deref(),
            Some("Invalid email or password")
        );
        assert!(!view.state().submitting);
        assert_eq!(view.state().password, "wrong-password");
    }

    #[tokio::test]
    async fn form_is_validated_before_calling_provider() {
        let (identity, mut view) = view();
        let changes = identity.session_changes();

        fill(&mut view, "not-an-email", "secret1");
        assert!(matches!(
            view.submit().await,
            Err(AuthViewError::InvalidEmail)
        ));
        fill(&mut view, "ada@example.com", "");
        assert!(matches!(
            view.submit().await,
            Err(AuthViewError::EmptyPassword)
        ));
        assert_eq!(
            view.state().error.as_deref(),
            Some("Password is required")
        );
        assert_eq!(changes.current(), SessionState::Unknown);
    }

    #[tokio::test]
    async fn toggling_mode_keeps_credentials_and_clears_error() {
        let (_identity, mut view) = view();
        fill(&mut view, "ada@example.com", "wrong");
        view.submit().await.unwrap_err();
        assert!(view.state().error.is_some());

        view.toggle_mode();
        assert_eq!(view.state().mode, AuthMode::Register);
        assert_eq!(view.state().email, "ada@example.com");
        assert_eq!(view.state().password, "wrong");
        assert_eq!(view.state().error, None);
    }

    #[tokio::test]
    async fn weak_password_is_reported_on_register() {
        let (_identity, mut view) = view();
        view.toggle_mode();
        fill(&mut view, "ada@example.com", "123");
        let error = view.submit().await.unwrap_err();
        assert!(matches!(
            error,
            AuthViewError::Provider(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn password_is_masked_until_revealed() {
        let (_identity, mut view) = view();
        view.set_password("hunter2");
        assert_eq!(view.state().password_display(), "*******");
        view.toggle_password_visibility();
        assert_eq!(view.state().password_display(), "hunter2");
    }

    #[tokio::test]
    async fn federated_sign_in_publishes_session() {
        let (identity, mut view) = view();
        let changes = identity.session_changes();
        let session = view
            .federated_sign_in(&FederatedCredential::google("subject-1"))
            .await
            .unwrap();
        assert_eq!(changes.current(), SessionState::Authenticated(session));

        let error = view
            .federated_sign_in(&FederatedCredential::google(" "))
            .await
            .unwrap_err();
        assert_eq!(view.state().error, Some(error.to_string()));
    }
}
