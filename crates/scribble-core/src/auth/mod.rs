//! Identity session provider contract and shared session types.
//!
//! The application never mutates a session itself: providers publish every
//! change through a [`SessionHub`], and views observe it through
//! [`SessionChanges`].

mod firebase;
mod memory;

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::models::UserId;
use crate::util::unix_timestamp_now;

pub use firebase::FirebaseAuthClient;
pub use memory::MemoryIdentityProvider;

const EXPIRY_SKEW_SECONDS: i64 = 60;

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user.id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// What the application knows about the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No notification has arrived yet
    Unknown,
    Authenticated(Session),
    Unauthenticated,
}

impl SessionState {
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            Self::Unknown | Self::Unauthenticated => None,
        }
    }

    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl From<Option<Session>> for SessionState {
    fn from(value: Option<Session>) -> Self {
        value.map_or(Self::Unauthenticated, Self::Authenticated)
    }
}

/// A token issued by a federated identity provider (e.g. Google)
#[derive(Clone, PartialEq, Eq)]
pub struct FederatedCredential {
    /// Provider id as understood by the identity service, e.g. `google.com`
    pub provider_id: String,
    pub id_token: String,
}

impl FederatedCredential {
    pub fn google(id_token: impl Into<String>) -> Self {
        Self {
            provider_id: "google.com".to_string(),
            id_token: id_token.into(),
        }
    }
}

impl fmt::Debug for FederatedCredential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FederatedCredential")
            .field("provider_id", &self.provider_id)
            .field("id_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{0}")]
    AccountExists(String),
    #[error("{0}")]
    WeakPassword(String),
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where a provider keeps the session between process runs.
pub trait SessionPersistence: Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<Session>>;
    fn save_session(&self, session: &Session) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Persistence that forgets everything when the process exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersistence;

impl SessionPersistence for NoPersistence {
    fn load_session(&self) -> AuthResult<Option<Session>> {
        Ok(None)
    }

    fn save_session(&self, _session: &Session) -> AuthResult<()> {
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        Ok(())
    }
}

/// The identity service consumed by the application.
///
/// Every successful sign-in, registration, sign-out, restore, or expiry is
/// published to [`IdentityProvider::session_changes`] observers.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn check_credentials(&self, email: &str, password: &str) -> AuthResult<Session>;

    async fn register(&self, email: &str, password: &str) -> AuthResult<Session>;

    async fn federated_sign_in(&self, credential: &FederatedCredential) -> AuthResult<Session>;

    async fn sign_out(&self) -> AuthResult<()>;

    /// Determine the initial session (e.g. from persisted state) and publish it.
    async fn restore_session(&self) -> AuthResult<Option<Session>>;

    /// Observe session changes. Dropping the handle unsubscribes.
    fn session_changes(&self) -> SessionChanges;
}

/// Supplies bearer tokens for document store requests.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// A valid token for the current session, or `None` when signed out.
    async fn access_token(&self) -> AuthResult<Option<String>>;
}

/// Publishing side of the session-changed notifications.
pub struct SessionHub {
    sender: watch::Sender<SessionState>,
}

impl SessionHub {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(SessionState::Unknown);
        Self { sender }
    }

    /// Publish a state; observers are only woken when it differs.
    pub fn publish(&self, state: SessionState) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            tracing::debug!(
                "Session changed: authenticated={}",
                self.sender.borrow().session().is_some()
            );
        }
    }

    #[must_use]
    pub fn current(&self) -> SessionState {
        self.sender.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> SessionChanges {
        SessionChanges {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Observing side of the session-changed notifications.
pub struct SessionChanges {
    receiver: watch::Receiver<SessionState>,
}

impl SessionChanges {
    #[must_use]
    pub fn current(&self) -> SessionState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next published state.
    ///
    /// Returns `None` once the provider is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

#[must_use]
pub fn is_email_shaped(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email.trim())
}

pub fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if !is_email_shaped(email) {
        return Err(AuthError::InvalidInput(
            "Enter a valid email address".to_string(),
        ));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("Password is required".to_string()));
    }
    Ok(())
}
