//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use scribble_core::config::{resolve_optional_firebase_config, ConfigError, FirebaseConfig};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";

pub const API_KEY_ENV: &str = "SCRIBBLE_FIREBASE_API_KEY";
pub const PROJECT_ID_ENV: &str = "SCRIBBLE_FIREBASE_PROJECT_ID";
pub const PROFILE_ENV: &str = "SCRIBBLE_PROFILE";
pub const AUTH_EMULATOR_ENV: &str = "FIREBASE_AUTH_EMULATOR_HOST";
pub const FIRESTORE_EMULATOR_ENV: &str = "FIRESTORE_EMULATOR_HOST";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub firebase_api_key: Option<String>,
    #[serde(default)]
    pub firebase_project_id: Option<String>,
    #[serde(default)]
    pub auth_emulator_host: Option<String>,
    #[serde(default)]
    pub firestore_emulator_host: Option<String>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("scribble").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    scribble_core::util::normalize_text_option(value)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(std::env::var(PROFILE_ENV).ok().as_deref()) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Build the Firebase settings, letting `env` override stored values.
    ///
    /// Returns `Ok(None)` when neither the profile nor the environment names a
    /// project.
    pub fn firebase_config(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<FirebaseConfig>, ConfigError> {
        let lookup = |name: &str| normalize_text_option(env(name));
        let api_key = lookup(API_KEY_ENV).or_else(|| self.firebase_api_key.clone());
        let project_id = lookup(PROJECT_ID_ENV).or_else(|| self.firebase_project_id.clone());
        let Some(mut config) = resolve_optional_firebase_config(api_key, project_id)? else {
            return Ok(None);
        };

        if let Some(host) =
            lookup(AUTH_EMULATOR_ENV).or_else(|| self.auth_emulator_host.clone())
        {
            config = config.with_auth_emulator(&host);
        }
        if let Some(host) =
            lookup(FIRESTORE_EMULATOR_ENV).or_else(|| self.firestore_emulator_host.clone())
        {
            config = config.with_firestore_emulator(&host);
        }
        if let Some(interval) = self.poll_interval_ms {
            config = config.with_poll_interval_ms(interval);
        }
        config.validated().map(Some)
    }

    /// Names of the settings still needed to reach a project.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.firebase_api_key.is_none() {
            missing.push("api_key");
        }
        if self.firebase_project_id.is_none() {
            missing.push("project_id");
        }
        missing
    }

    fn normalize(&mut self) {
        self.firebase_api_key = normalize_text_option(self.firebase_api_key.take());
        self.firebase_project_id = normalize_text_option(self.firebase_project_id.take());
        self.auth_emulator_host = normalize_text_option(self.auth_emulator_host.take());
        self.firestore_emulator_host = normalize_text_option(self.firestore_emulator_host.take());
    }
}

/// Show only the edges of a key.
pub fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count <= 8 {
        return "*".repeat(count);
    }
    let head = value.chars().take(4).collect::<String>();
    let tail = value.chars().skip(count - 4).collect::<String>();
    format!("{head}...{tail}")
}
