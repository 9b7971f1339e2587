//! Firebase Authentication client over the Identity Toolkit REST API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{
    validate_credentials, AccessTokenSource, AuthError, AuthResult, AuthUser, FederatedCredential,
    IdentityProvider, Session, SessionChanges, SessionHub, SessionPersistence, SessionState,
};
use crate::config::FirebaseConfig;
use crate::models::UserId;
use crate::util::{compact_text, unix_timestamp_now};

/// Redirect URI sent with federated sign-in; the REST API requires one.
const IDP_REQUEST_URI: &str = "http://localhost";

pub struct FirebaseAuthClient<S: SessionPersistence> {
    api_key: String,
    identity_url: String,
    secure_token_url: String,
    client: Client,
    store: S,
    hub: SessionHub,
    // Held across every refresh and sign-out so a refresh cannot outlive one
    refresh_lock: Mutex<()>,
}

impl<S: SessionPersistence> FirebaseAuthClient<S> {
    pub fn new(config: &FirebaseConfig, store: S) -> AuthResult<Self> {
        Ok(Self {
            api_key: config.api_key.clone(),
            identity_url: config.identity_url().to_string(),
            secure_token_url: config.secure_token_url().to_string(),
            client: Client::builder().build()?,
            store,
            hub: SessionHub::new(),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Exchange the refresh token for a new session. Callers hold `refresh_lock`.
    async fn refresh_session(&self, current: &Session) -> AuthResult<Session> {
        if current.refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidInput(
                "Refresh token must not be empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/token", self.secure_token_url))
            .query(&[("key", self.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_api_error(status, &body));
        }

        let payload = response.json::<SecureTokenResponse>().await?;
        let session = payload.into_session(current.user.email.clone())?;
        self.store.save_session(&session)?;
        self.hub.publish(SessionState::Authenticated(session.clone()));
        Ok(session)
    }

    async fn sign_in_request(
        &self,
        endpoint: &str,
        payload: serde_json::Value,
    ) -> AuthResult<Session> {
        let response = self
            .client
            .post(format!("{}/accounts:{endpoint}", self.identity_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = parse_api_error(status, &body);
            tracing::warn!("accounts:{} failed: {}", endpoint, error);
            return Err(error);
        }

        let session = response
            .json::<IdentityToolkitResponse>()
            .await?
            .into_session()?;
        self.store.save_session(&session)?;
        self.hub.publish(SessionState::Authenticated(session.clone()));
        tracing::info!("Signed in as {}", session.user.id);
        Ok(session)
    }

    /// Forget the session locally and tell observers.
    fn expire_session(&self) -> AuthResult<()> {
        self.store.clear_session()?;
        self.hub.publish(SessionState::Unauthenticated);
        Ok(())
    }
}

#[async_trait]
impl<S: SessionPersistence> IdentityProvider for FirebaseAuthClient<S> {
    async fn check_credentials(&self, email: &str, password: &str) -> AuthResult<Session> {
        validate_credentials(email, password)?;
        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
            "returnSecureToken": true,
        });
        self.sign_in_request("signInWithPassword", payload).await
    }

    async fn register(&self, email: &str, password: &str) -> AuthResult<Session> {
        validate_credentials(email, password)?;
        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
            "returnSecureToken": true,
        });
        self.sign_in_request("signUp", payload).await
    }

    async fn federated_sign_in(&self, credential: &FederatedCredential) -> AuthResult<Session> {
        if credential.id_token.trim().is_empty() {
            return Err(AuthError::InvalidInput(
                "Identity provider token must not be empty".to_string(),
            ));
        }
        let post_body = format!(
            "id_token={}&providerId={}",
            urlencoding::encode(credential.id_token.trim()),
            urlencoding::encode(credential.provider_id.trim()),
        );
        let payload = serde_json::json!({
            "postBody": post_body,
            "requestUri": IDP_REQUEST_URI,
            "returnIdpCredential": true,
            "returnSecureToken": true,
        });
        self.sign_in_request("signInWithIdp", payload).await
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let _guard = self.refresh_lock.lock().await;
        // ID tokens are stateless; signing out means dropping them.
        self.expire_session()?;
        tracing::info!("Signed out");
        Ok(())
    }

    async fn restore_session(&self) -> AuthResult<Option<Session>> {
        let _guard = self.refresh_lock.lock().await;
        let stored = match self.store.load_session() {
            Ok(stored) => stored,
            Err(error) => {
                self.hub.publish(SessionState::Unauthenticated);
                return Err(error);
            }
        };
        let Some(stored) = stored else {
            self.hub.publish(SessionState::Unauthenticated);
            return Ok(None);
        };

        if !stored.is_expired() {
            self.hub
                .publish(SessionState::Authenticated(stored.clone()));
            return Ok(Some(stored));
        }

        match self.refresh_session(&stored).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.expire_session()?;
                Ok(None)
            }
        }
    }

    fn session_changes(&self) -> SessionChanges {
        self.hub.subscribe()
    }
}

#[async_trait]
impl<S: SessionPersistence> AccessTokenSource for FirebaseAuthClient<S> {
    async fn access_token(&self) -> AuthResult<Option<String>> {
        let _guard = self.refresh_lock.lock().await;
        let Some(session) = self.hub.current().session().cloned() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session.id_token));
        }

        match self.refresh_session(&session).await {
            Ok(refreshed) => Ok(Some(refreshed.id_token)),
            Err(error) => {
                tracing::warn!("Session expired and could not be refreshed: {}", error);
                self.expire_session()?;
                Err(error)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityToolkitResponse {
    local_id: Option<String>,
    email: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
}

impl IdentityToolkitResponse {
    fn into_session(self) -> AuthResult<Session> {
        match (self.local_id, self.id_token, self.refresh_token) {
            (Some(local_id), Some(id_token), Some(refresh_token)) => Ok(Session {
                id_token,
                refresh_token,
                expires_at: expires_at_from(self.expires_in.as_deref())?,
                user: AuthUser {
                    id: UserId::new(local_id),
                    email: self.email.filter(|email| !email.trim().is_empty()),
                },
            }),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SecureTokenResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    user_id: Option<String>,
}

impl SecureTokenResponse {
    fn into_session(self, email: Option<String>) -> AuthResult<Session> {
        match (self.user_id, self.id_token, self.refresh_token) {
            (Some(user_id), Some(id_token), Some(refresh_token)) => Ok(Session {
                id_token,
                refresh_token,
                expires_at: expires_at_from(self.expires_in.as_deref())?,
                user: AuthUser {
                    id: UserId::new(user_id),
                    email,
                },
            }),
            _ => Err(AuthError::Api(
                "Refresh response did not include enough session fields".to_string(),
            )),
        }
    }
}

fn expires_at_from(expires_in: Option<&str>) -> AuthResult<i64> {
    let raw = expires_in.ok_or_else(|| {
        AuthError::Api("Auth response did not include expiresIn".to_string())
    })?;
    let seconds = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| AuthError::Api(format!("Invalid expiresIn value: {raw}")))?;
    Ok(unix_timestamp_now().saturating_add(seconds))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Map an Identity Toolkit error body to the auth taxonomy.
///
/// Messages look like `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be
/// at least 6 characters`. The provider's own text (the detail when there is
/// one, otherwise the code) is what the user sees.
fn parse_api_error(status: StatusCode, body: &str) -> AuthError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.message)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty());

    let Some(message) = message else {
        let trimmed = compact_text(body);
        return if trimmed.is_empty() {
            AuthError::Api(format!("HTTP {}", status.as_u16()))
        } else {
            AuthError::Api(format!("{} ({})", trimmed, status.as_u16()))
        };
    };

    let (code, detail) = match message.split_once(" : ") {
        Some((code, detail)) => (code.trim(), Some(detail.trim())),
        None => (message.as_str(), None),
    };
    let text = detail
        .filter(|detail| !detail.is_empty())
        .unwrap_or(code)
        .to_string();

    match code {
        "EMAIL_EXISTS" => AuthError::AccountExists(text),
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED" => {
            AuthError::InvalidCredentials(text)
        }
        "INVALID_EMAIL" => AuthError::InvalidInput(text),
        "WEAK_PASSWORD" => AuthError::WeakPassword(text),
        _ => AuthError::Api(format!("{} ({})", message, status.as_u16())),
    }
}
