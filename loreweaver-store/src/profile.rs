//! Provider profile management.
//!
//! Profiles are JSON files under a managed directory; the active
//! profile is a one-field JSON file naming the profile id. Profile
//! ids are validated against `[A-Za-z0-9_-]{1,50}` before touching
//! the filesystem, which also rules out traversal through ids.

use crate::error::StoreError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

static PROFILE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,50}$").expect("profile id regex"));

const ACTIVE_PROFILE_FILE: &str = "active_profile.json";

/// The provider types a profile may name.
const KNOWN_PROVIDER_TYPES: &[&str] = &[
    "anthropic",
    "openai",
    "openai_compatible",
    "openrouter",
    "ollama",
    "groq",
    "zhipu",
];

/// One stored provider profile.
///
/// The API key is part of the profile file by necessity (that is what
/// a profile is for); it must never appear in logs — `Debug` redacts
/// it.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderProfile {
    /// Profile id, `[A-Za-z0-9_-]{1,50}`.
    pub profile_id: String,
    /// Display name.
    pub name: String,
    /// Provider type ("anthropic", "ollama", ...).
    pub provider_type: String,
    /// API key for providers that need one.
    pub api_key: Option<String>,
    /// Base URL override.
    pub base_url: Option<String>,
    /// Preferred model id.
    pub model: Option<String>,
    /// Extra headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Provider-specific extras.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl std::fmt::Debug for ProviderProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderProfile")
            .field("profile_id", &self.profile_id)
            .field("name", &self.name)
            .field("provider_type", &self.provider_type)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct ActiveProfile {
    profile_id: String,
}

/// Manages provider profiles under one directory.
pub struct ProfileManager {
    root: PathBuf,
}

impl ProfileManager {
    /// A manager over `root` (created lazily on first save).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn validate_id(profile_id: &str) -> Result<(), StoreError> {
        if PROFILE_ID.is_match(profile_id) {
            Ok(())
        } else {
            Err(StoreError::Validation(format!(
                "invalid profile id '{profile_id}': expected [A-Za-z0-9_-]{{1,50}}"
            )))
        }
    }

    /// Validate a profile's contents.
    pub fn validate(&self, profile: &ProviderProfile) -> Vec<String> {
        let mut errors = Vec::new();
        if let Err(err) = Self::validate_id(&profile.profile_id) {
            errors.push(err.to_string());
        }
        if profile.name.is_empty() {
            errors.push("profile name is required".into());
        }
        if !KNOWN_PROVIDER_TYPES.contains(&profile.provider_type.as_str()) {
            errors.push(format!("unknown provider type: {}", profile.provider_type));
        }
        if profile.model.is_none() {
            errors.push("model is required".into());
        }
        let needs_key = profile.provider_type != "ollama";
        if needs_key && profile.api_key.as_deref().unwrap_or("").is_empty() {
            errors.push(format!(
                "api key is required for provider type {}",
                profile.provider_type
            ));
        }
        if profile.provider_type == "openai_compatible"
            && profile.base_url.as_deref().unwrap_or("").is_empty()
        {
            errors.push("base url is required for openai_compatible".into());
        }
        errors
    }

    fn profile_path(&self, profile_id: &str) -> PathBuf {
        self.root.join(format!("{profile_id}.json"))
    }

    /// Save a profile after validating it. Returns the profile id.
    pub async fn save(&self, profile: &ProviderProfile) -> Result<String, StoreError> {
        let errors = self.validate(profile);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors.join("; ")));
        }
        tokio::fs::create_dir_all(&self.root).await?;
        let text = serde_json::to_string_pretty(profile)?;
        tokio::fs::write(self.profile_path(&profile.profile_id), text).await?;
        Ok(profile.profile_id.clone())
    }

    /// Load a profile by id.
    pub async fn load(&self, profile_id: &str) -> Result<ProviderProfile, StoreError> {
        Self::validate_id(profile_id)?;
        let text = tokio::fs::read_to_string(self.profile_path(profile_id))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StoreError::not_found("profile", profile_id),
                _ => StoreError::Io(e.to_string()),
            })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// List every stored profile. Unreadable files are skipped.
    pub async fn list(&self) -> Result<Vec<ProviderProfile>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        let mut profiles = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == ACTIVE_PROFILE_FILE || !name.ends_with(".json") {
                continue;
            }
            let profile_id = name.trim_end_matches(".json");
            match self.load(profile_id).await {
                Ok(profile) => profiles.push(profile),
                Err(err) => {
                    tracing::warn!(profile = profile_id, error = %err, "skipping unreadable profile");
                }
            }
        }
        profiles.sort_by(|a, b| a.profile_id.cmp(&b.profile_id));
        Ok(profiles)
    }

    /// Delete a profile; clears the active pointer if it named it.
    pub async fn delete(&self, profile_id: &str) -> Result<(), StoreError> {
        Self::validate_id(profile_id)?;
        match tokio::fs::remove_file(self.profile_path(profile_id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e.to_string())),
        }
        if let Some(active) = self.active_profile_id().await? {
            if active == profile_id {
                let _ = tokio::fs::remove_file(self.root.join(ACTIVE_PROFILE_FILE)).await;
            }
        }
        Ok(())
    }

    /// Mark a stored profile as active.
    pub async fn set_active(&self, profile_id: &str) -> Result<(), StoreError> {
        // Loading first ensures the profile exists and is readable.
        let profile = self.load(profile_id).await?;
        let text = serde_json::to_string_pretty(&ActiveProfile {
            profile_id: profile.profile_id,
        })?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(ACTIVE_PROFILE_FILE), text).await?;
        Ok(())
    }

    async fn active_profile_id(&self) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.root.join(ACTIVE_PROFILE_FILE)).await {
            Ok(text) => {
                let active: ActiveProfile = serde_json::from_str(&text)?;
                Ok(Some(active.profile_id))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }

    /// The active profile, if one is set and still exists.
    pub async fn active(&self) -> Result<Option<ProviderProfile>, StoreError> {
        match self.active_profile_id().await? {
            Some(profile_id) => Ok(Some(self.load(&profile_id).await?)),
            None => Ok(None),
        }
    }
}
