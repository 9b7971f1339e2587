//! Backend configuration for client apps.
//!
//! Provides the `FirebaseConfig` used to reach the managed identity service
//! and document database, including overrides for the local emulator suite.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const MIN_POLL_INTERVAL_MS: u64 = 250;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Firebase is not configured. Set both the API key and the project id.")]
    NotConfigured,
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}

/// Public Firebase project settings.
///
/// The web API key and project id are safe-to-ship identifiers; secrets never
/// belong here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    #[serde(default)]
    pub identity_url: Option<String>,
    #[serde(default)]
    pub secure_token_url: Option<String>,
    #[serde(default)]
    pub firestore_url: Option<String>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

impl FirebaseConfig {
    pub fn new(
        api_key: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            identity_url: None,
            secure_token_url: None,
            firestore_url: None,
            poll_interval_ms: None,
        };
        config.validated()
    }

    /// Route auth traffic to a local Auth emulator (`host:port`).
    #[must_use]
    pub fn with_auth_emulator(mut self, host: &str) -> Self {
        let host = host.trim().trim_end_matches('/');
        self.identity_url = Some(format!("http://{host}/identitytoolkit.googleapis.com/v1"));
        self.secure_token_url = Some(format!("http://{host}/securetoken.googleapis.com/v1"));
        self
    }

    /// Route document traffic to a local Firestore emulator (`host:port`).
    #[must_use]
    pub fn with_firestore_emulator(mut self, host: &str) -> Self {
        let host = host.trim().trim_end_matches('/');
        self.firestore_url = Some(format!("http://{host}/v1"));
        self
    }

    #[must_use]
    pub const fn with_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = Some(interval_ms);
        self
    }

    /// Trim every value and check URLs and the poll interval.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.api_key = normalize_required(self.api_key, "api_key")?;
        self.project_id = normalize_required(self.project_id, "project_id")?;
        if self.project_id.contains('/') {
            return Err(ConfigError::InvalidValue(
                "project_id must not contain '/'".to_string(),
            ));
        }
        self.identity_url = normalize_optional_url(self.identity_url, "identity_url")?;
        self.secure_token_url = normalize_optional_url(self.secure_token_url, "secure_token_url")?;
        self.firestore_url = normalize_optional_url(self.firestore_url, "firestore_url")?;
        if let Some(interval) = self.poll_interval_ms {
            if interval < MIN_POLL_INTERVAL_MS {
                return Err(ConfigError::InvalidValue(format!(
                    "poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}"
                )));
            }
        }
        Ok(self)
    }

    pub fn identity_url(&self) -> &str {
        self.identity_url.as_deref().unwrap_or(DEFAULT_IDENTITY_URL)
    }

    pub fn secure_token_url(&self) -> &str {
        self.secure_token_url
            .as_deref()
            .unwrap_or(DEFAULT_SECURE_TOKEN_URL)
    }

    pub fn firestore_url(&self) -> &str {
        self.firestore_url.as_deref().unwrap_or(DEFAULT_FIRESTORE_URL)
    }

    /// Resource name of the default database, e.g. `projects/p/databases/(default)`
    pub fn database_name(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }
}

/// Build a config only when both required values are present.
///
/// Returns `Ok(None)` when neither is set and `NotConfigured` when only one is.
pub fn resolve_optional_firebase_config(
    api_key: Option<String>,
    project_id: Option<String>,
) -> Result<Option<FirebaseConfig>, ConfigError> {
    let api_key = normalize_text_option(api_key);
    let project_id = normalize_text_option(project_id);

    match (api_key, project_id) {
        (None, None) => Ok(None),
        (Some(api_key), Some(project_id)) => FirebaseConfig::new(api_key, project_id).map(Some),
        _ => Err(ConfigError::NotConfigured),
    }
}

fn normalize_required(raw: String, field: &str) -> Result<String, ConfigError> {
    normalize_text_option(Some(raw))
        .ok_or_else(|| ConfigError::InvalidValue(format!("field '{field}' is required")))
}

fn normalize_optional_url(raw: Option<String>, field: &str) -> Result<Option<String>, ConfigError> {
    let Some(value) = normalize_text_option(raw) else {
        return Ok(None);
    };
    if is_http_url(&value) {
        Ok(Some(value.trim_end_matches('/').to_string()))
    } else {
        Err(ConfigError::InvalidValue(format!(
            "field '{field}' must include http:// or https://"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_required_values() {
        let config = FirebaseConfig::new(" key ", " notesapp-56a38 ").unwrap();
        assert_eq!(config.api_key, "key");
        assert_eq!(config.project_id, "notesapp-56a38");
        assert_eq!(config.identity_url(), DEFAULT_IDENTITY_URL);
        assert_eq!(
            config.database_name(),
            "projects/notesapp-56a38/databases/(default)"
        );
    }

    #[test]
    fn new_rejects_blank_values() {
        assert!(FirebaseConfig::new("", "project").is_err());
        assert!(FirebaseConfig::new("key", "   ").is_err());
        assert!(FirebaseConfig::new("key", "a/b").is_err());
    }

    #[test]
    fn resolve_optional_config_requires_both_values() {
        assert!(resolve_optional_firebase_config(None, None)
            .unwrap()
            .is_none());
        assert!(matches!(
            resolve_optional_firebase_config(Some("key".to_string()), None),
            Err(ConfigError::NotConfigured)
        ));
        let config =
            resolve_optional_firebase_config(Some("key".to_string()), Some("p".to_string()))
                .unwrap()
                .unwrap();
        assert_eq!(config.project_id, "p");
    }

    #[test]
    fn emulator_hosts_override_urls() {
        let config = FirebaseConfig::new("key", "demo")
            .unwrap()
            .with_auth_emulator("127.0.0.1:9099")
            .with_firestore_emulator("127.0.0.1:8080/");
        assert_eq!(
            config.identity_url(),
            "http://127.0.0.1:9099/identitytoolkit.googleapis.com/v1"
        );
        assert_eq!(
            config.secure_token_url(),
            "http://127.0.0.1:9099/securetoken.googleapis.com/v1"
        );
        assert_eq!(config.firestore_url(), "http://127.0.0.1:8080/v1");
    }

    #[test]
    fn validated_rejects_bad_urls_and_intervals() {
        let mut config = FirebaseConfig::new("key", "demo").unwrap();
        config.firestore_url = Some("firestore.local".to_string());
        assert!(config.clone().validated().is_err());

        config.firestore_url = None;
        config.poll_interval_ms = Some(10);
        assert!(config.clone().validated().is_err());

        config.poll_interval_ms = Some(500);
        assert_eq!(
            config.validated().unwrap().poll_interval(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn config_rejects_unknown_fields() {
        let payload = r#"{ "api_key": "k", "project_id": "p", "unexpected": true }"#;
        let error = serde_json::from_str::<FirebaseConfig>(payload).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }
}
