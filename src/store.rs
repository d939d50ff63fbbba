//! Provider profile store.
//!
//! All profiles live in a single JSON document (`~/.claude/providers.json`):
//!
//! ```json
//! {
//!   "current": "kimi",
//!   "providers": {
//!     "kimi": { "name": "Kimi", "api_key": "...", "base_url": "...", "model": "..." }
//!   },
//!   "mcp": {}
//! }
//! ```
//!
//! Loading never fails: a missing or malformed file yields the default
//! document. Every mutation is validated first, then written to disk, and only
//! then applied in memory, so a failed call leaves both the file and the
//! in-memory view untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;

/// A single provider credential profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderProfile {
    /// Display name
    pub name: String,
    /// Sent as `ANTHROPIC_AUTH_TOKEN`
    pub api_key: String,
    /// Sent as `ANTHROPIC_BASE_URL`
    pub base_url: String,
    /// Sent as `ANTHROPIC_MODEL`; the variable is omitted when this is empty
    pub model: String,
    /// Extra HTTP headers sent by the connectivity test
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl ProviderProfile {
    /// Create a profile without custom headers
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Required fields that are empty or whitespace-only
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("api_key", &self.api_key),
            ("base_url", &self.base_url),
            ("model", &self.model),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    /// True when every required field is filled in
    pub fn is_valid(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Fail with the list of missing fields, if any
    pub fn validate(&self) -> Result<(), StoreError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation { missing })
        }
    }
}

/// The on-disk providers document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Key of the selected provider, empty when none is selected
    pub current: String,
    /// Profiles keyed by their normalized (lowercase) name
    pub providers: BTreeMap<String, ProviderProfile>,
    /// MCP server definitions, carried through untouched except by `migrate`
    pub mcp: Map<String, Value>,
    /// Unknown top-level fields are preserved on save
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What the store holds when no usable file exists
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// No providers
    #[default]
    Empty,
    /// A few example providers with placeholder keys
    Samples,
}

impl Seed {
    /// Build the document used for a missing or unreadable file
    pub fn default_config(self) -> ProvidersConfig {
        let mut config = ProvidersConfig::default();
        if self == Seed::Samples {
            for (key, profile) in sample_profiles() {
                config.providers.insert(key.to_string(), profile);
            }
        }
        config
    }
}

fn sample_profiles() -> Vec<(&'static str, ProviderProfile)> {
    vec![
        (
            "anthropic",
            ProviderProfile::new(
                "Anthropic",
                "<your-anthropic-api-key>",
                "https://api.anthropic.com",
                "claude-sonnet-4-20250514",
            ),
        ),
        (
            "kimi",
            ProviderProfile::new(
                "Moonshot Kimi",
                "<your-moonshot-api-key>",
                "https://api.moonshot.cn",
                "kimi-k2-0711-preview",
            ),
        ),
        (
            "glm",
            ProviderProfile::new(
                "Zhipu GLM",
                "<your-bigmodel-api-key>",
                "https://open.bigmodel.cn",
                "glm-4.5",
            ),
        ),
    ]
}

/// Resolution of the `current` field against the provider map
#[derive(Debug, PartialEq, Eq)]
pub enum CurrentStatus<'a> {
    Unset,
    Active {
        key: &'a str,
        profile: &'a ProviderProfile,
    },
    /// `current` names a provider that no longer exists
    Dangling { key: &'a str },
}

/// Normalize a user-supplied provider key
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Handle on the providers file and its loaded contents
#[derive(Debug, Clone)]
pub struct ProviderStore {
    path: PathBuf,
    config: ProvidersConfig,
    recovered: Option<String>,
}

impl ProviderStore {
    /// Load the store, falling back to the seed document on any read/parse problem
    pub fn load(path: &Path, seed: Seed) -> Self {
        let (config, recovered) = match read_document(path, seed) {
            Ok(config) => (config, None),
            Err(reason) => {
                warn!(path = %path.display(), %reason, "providers file unusable, using defaults");
                (seed.default_config(), Some(reason))
            }
        };

        Self {
            path: path.to_path_buf(),
            config,
            recovered,
        }
    }

    /// Location of the providers file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The document as last loaded or saved
    pub fn config(&self) -> &ProvidersConfig {
        &self.config
    }

    /// Why the file on disk was replaced by defaults during `load`, if it was
    pub fn recovered_from(&self) -> Option<&str> {
        self.recovered.as_deref()
    }

    /// Look up a provider; the key is normalized first
    pub fn get(&self, key: &str) -> Option<&ProviderProfile> {
        self.config.providers.get(&normalize_key(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Provider keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.config.providers.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.config.providers.is_empty()
    }

    pub fn current_status(&self) -> CurrentStatus<'_> {
        let key = self.config.current.as_str();
        if key.is_empty() {
            return CurrentStatus::Unset;
        }
        match self.config.providers.get(key) {
            Some(profile) => CurrentStatus::Active { key, profile },
            None => CurrentStatus::Dangling { key },
        }
    }

    /// Write the in-memory document to disk
    pub fn save(&self) -> Result<(), StoreError> {
        write_document(&self.path, &self.config)
    }

    /// Add or overwrite a provider; becomes current if nothing is selected.
    ///
    /// Returns the normalized key.
    pub fn add_profile(
        &mut self,
        key: &str,
        profile: ProviderProfile,
    ) -> Result<String, StoreError> {
        let key = normalize_key(key);
        if key.is_empty() {
            return Err(StoreError::Validation {
                missing: vec!["key"],
            });
        }
        profile.validate()?;

        let mut next = self.config.clone();
        next.providers.insert(key.clone(), profile);
        if next.current.is_empty() {
            next.current = key.clone();
        }
        self.commit(next)?;
        Ok(key)
    }

    /// Remove a provider, reassigning `current` if it pointed at it
    pub fn remove_profile(&mut self, key: &str) -> Result<ProviderProfile, StoreError> {
        let key = normalize_key(key);
        let mut next = self.config.clone();
        let removed = next
            .providers
            .remove(&key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;

        if next.current == key {
            next.current = next.providers.keys().next().cloned().unwrap_or_default();
        }
        self.commit(next)?;
        Ok(removed)
    }

    /// Select a provider as current
    pub fn set_current(&mut self, key: &str) -> Result<(), StoreError> {
        let key = normalize_key(key);
        if !self.config.providers.contains_key(&key) {
            return Err(StoreError::NotFound { key });
        }
        let mut next = self.config.clone();
        next.current = key;
        self.commit(next)
    }

    /// Clear the current selection without touching providers
    pub fn clear_current(&mut self) -> Result<(), StoreError> {
        let mut next = self.config.clone();
        next.current.clear();
        self.commit(next)
    }

    /// Replace the `mcp` map wholesale
    pub fn set_mcp(&mut self, mcp: Map<String, Value>) -> Result<(), StoreError> {
        let mut next = self.config.clone();
        next.mcp = mcp;
        self.commit(next)
    }

    fn commit(&mut self, next: ProvidersConfig) -> Result<(), StoreError> {
        write_document(&self.path, &next)?;
        self.config = next;
        Ok(())
    }
}

/// Read the document, shallow-merging the parsed top-level object over the defaults
fn read_document(path: &Path, seed: Seed) -> Result<ProvidersConfig, String> {
    if !path.exists() {
        debug!(path = %path.display(), "providers file missing, using defaults");
        return Ok(seed.default_config());
    }

    let content = fs::read_to_string(path).map_err(|e| format!("cannot read file: {}", e))?;
    let parsed: Value = serde_json::from_str(&content).map_err(|e| format!("invalid JSON: {}", e))?;
    let Value::Object(parsed) = parsed else {
        return Err("top-level value is not an object".to_string());
    };

    let defaults = serde_json::to_value(seed.default_config()).map_err(|e| e.to_string())?;
    let Value::Object(mut merged) = defaults else {
        return Err("default document is not an object".to_string());
    };
    merged.extend(parsed);

    serde_json::from_value(Value::Object(merged)).map_err(|e| format!("unexpected shape: {}", e))
}

/// Write the document atomically: temp file then rename
fn write_document(path: &Path, config: &ProvidersConfig) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let mut content = serde_json::to_string_pretty(config)?;
    content.push('\n');

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, &content).map_err(|e| StoreError::io(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| StoreError::io(path, e))?;

    debug!(path = %path.display(), providers = config.providers.len(), "saved providers file");
    Ok(())
}
