//! In-process identity provider for offline use and tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    validate_credentials, AuthError, AuthResult, AuthUser, FederatedCredential, IdentityProvider,
    Session, SessionChanges, SessionHub, SessionState,
};
use crate::models::UserId;
use crate::util::unix_timestamp_now;

const MIN_PASSWORD_LEN: usize = 6;
const SESSION_TTL_SECONDS: i64 = 3_600;

struct Account {
    user_id: UserId,
    password: String,
}

/// Accounts kept in memory for the lifetime of the process.
///
/// Follows the same rules and error taxonomy as the hosted service: emails
/// are case-insensitive, passwords need six characters, and user ids are
/// stable for a given email or federated subject.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    hub: SessionHub,
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire the current session as if its token ran out.
    pub fn expire_session(&self) {
        self.hub.publish(SessionState::Unauthenticated);
    }

    fn start_session(&self, user_id: UserId, email: Option<String>) -> Session {
        let session = Session {
            id_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
            expires_at: unix_timestamp_now() + SESSION_TTL_SECONDS,
            user: AuthUser { id: user_id, email },
        };
        self.hub.publish(SessionState::Authenticated(session.clone()));
        session
    }
}

fn account_key(email: &str) -> String {
    email.trim().to_lowercase()
}

fn stable_user_id(name: &str) -> UserId {
    UserId::new(
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
            .simple()
            .to_string(),
    )
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn check_credentials(&self, email: &str, password: &str) -> AuthResult<Session> {
        validate_credentials(email, password)?;
        let key = account_key(email);
        let user_id = {
            let accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            match accounts.get(&key) {
                Some(account) if account.password == password => account.user_id.clone(),
                _ => {
                    return Err(AuthError::InvalidCredentials(
                        "Invalid email or password".to_string(),
                    ))
                }
            }
        };
        Ok(self.start_session(user_id, Some(key)))
    }

    async fn register(&self, email: &str, password: &str) -> AuthResult<Session> {
        validate_credentials(email, password)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let key = account_key(email);
        let user_id = stable_user_id(&format!("password:{key}"));
        {
            let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            if accounts.contains_key(&key) {
                return Err(AuthError::AccountExists(
                    "The email address is already in use by another account".to_string(),
                ));
            }
            accounts.insert(
                key.clone(),
                Account {
                    user_id: user_id.clone(),
                    password: password.to_string(),
                },
            );
        }
        tracing::info!("Registered offline account {}", user_id);
        Ok(self.start_session(user_id, Some(key)))
    }

    async fn federated_sign_in(&self, credential: &FederatedCredential) -> AuthResult<Session> {
        let subject = credential.id_token.trim();
        if subject.is_empty() {
            return Err(AuthError::InvalidInput(
                "Identity provider token must not be empty".to_string(),
            ));
        }
        let user_id = stable_user_id(&format!("{}:{subject}", credential.provider_id.trim()));
        Ok(self.start_session(user_id, None))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.hub.publish(SessionState::Unauthenticated);
        Ok(())
    }

    async fn restore_session(&self) -> AuthResult<Option<Session>> {
        let current = self.hub.current();
        if let SessionState::Authenticated(session) = current {
            return Ok(Some(session));
        }
        self.hub.publish(SessionState::Unauthenticated);
        Ok(None)
    }

    fn session_changes(&self) -> SessionChanges {
        self.hub.subscribe()
    }
}
