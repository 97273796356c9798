//! Configuration management for Otakuverse
//!
//! Two layers of configuration exist:
//!
//! - [`Config`]: static application configuration loaded from a YAML
//!   file (endpoints, generation parameters, relay listen address). All
//!   fields have sensible defaults, so a missing file is fine.
//! - [`Settings`]: mutable user state (selected provider, credentials,
//!   model ids, avatar, theme) persisted in the key/value store and
//!   passed explicitly into the dispatch engine at call time.

use crate::error::{OtakuError, Result};
use crate::storage::{keys, Storage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The three supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-style chat completions; works direct or through the relay
    Groq,
    /// Google Gemini `generateContent`
    Gemini,
    /// Hugging Face inference API
    #[serde(rename = "huggingface")]
    HuggingFace,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Groq => write!(f, "groq"),
            Self::Gemini => write!(f, "gemini"),
            Self::HuggingFace => write!(f, "huggingface"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = OtakuError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "gemini" => Ok(Self::Gemini),
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            other => Err(OtakuError::Config(format!(
                "Unknown provider '{}' (expected groq, gemini, or huggingface)",
                other
            ))),
        }
    }
}

/// Static application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Provider endpoint configuration
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Generation parameter configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Relay server configuration
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Provider endpoint configuration
///
/// Every base URL can be overridden, which lets tests point adapters at
/// mock servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Groq OpenAI-compatible API base
    #[serde(default = "default_groq_api_base")]
    pub groq_api_base: String,

    /// Gemini API base
    #[serde(default = "default_gemini_api_base")]
    pub gemini_api_base: String,

    /// Hugging Face inference API base
    #[serde(default = "default_hf_api_base")]
    pub hf_api_base: String,

    /// Relay endpoint the keyless Groq path posts to
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Character lookup API base
    #[serde(default = "default_lookup_api_base")]
    pub lookup_api_base: String,
}

fn default_groq_api_base() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_hf_api_base() -> String {
    "https://api-inference.huggingface.co".to_string()
}

fn default_relay_url() -> String {
    "http://127.0.0.1:8787/api/chat".to_string()
}

fn default_lookup_api_base() -> String {
    "https://api.jikan.moe/v4".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            groq_api_base: default_groq_api_base(),
            gemini_api_base: default_gemini_api_base(),
            hf_api_base: default_hf_api_base(),
            relay_url: default_relay_url(),
            lookup_api_base: default_lookup_api_base(),
        }
    }
}

/// Fixed generation parameters applied to every call
///
/// Not user-tunable; the defaults favor diverse phrasing (temperature)
/// and short in-character replies (max tokens).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Reply length ceiling in tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f64 {
    0.9
}

fn default_max_tokens() -> u32 {
    250
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Relay server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Listen address for `otakuverse relay`
    #[serde(default = "default_relay_listen")]
    pub listen: String,

    /// Upstream vendor base the relay forwards to
    #[serde(default = "default_groq_api_base")]
    pub upstream: String,
}

fn default_relay_listen() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: default_relay_listen(),
            upstream: default_groq_api_base(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// A missing file yields the defaults; a malformed file is an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use otakuverse::config::Config;
    ///
    /// let config = Config::load("does-not-exist.yaml").unwrap();
    /// assert!(config.endpoints.groq_api_base.contains("groq"));
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate endpoint URLs
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("endpoints.groq_api_base", &self.endpoints.groq_api_base),
            ("endpoints.gemini_api_base", &self.endpoints.gemini_api_base),
            ("endpoints.hf_api_base", &self.endpoints.hf_api_base),
            ("endpoints.relay_url", &self.endpoints.relay_url),
            ("endpoints.lookup_api_base", &self.endpoints.lookup_api_base),
            ("relay.upstream", &self.relay.upstream),
        ] {
            url::Url::parse(value)
                .map_err(|e| OtakuError::Config(format!("{}: invalid URL '{}': {}", name, value, e)))?;
        }
        Ok(())
    }
}

/// Mutable user settings backed by the key/value store
///
/// Loaded once per command and passed explicitly into the engine; no
/// component reads ambient global state.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Selected provider
    pub provider: ProviderKind,
    /// Personal Groq API key; absent means the relayed free tier
    pub groq_key: Option<String>,
    /// Gemini API key (required for the Gemini provider)
    pub gemini_key: Option<String>,
    /// Hugging Face access token (required for the HF provider)
    pub hf_key: Option<String>,
    /// Per-provider model identifiers
    pub groq_model: String,
    pub gemini_model: String,
    pub hf_model: String,
    /// User avatar URL shown on user messages
    pub user_avatar: String,
    /// UI theme token
    pub theme: String,
}

fn default_groq_model() -> String {
    "llama3-8b-8192".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_hf_model() -> String {
    "mistralai/Mistral-7B-Instruct-v0.2".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Groq,
            groq_key: None,
            gemini_key: None,
            hf_key: None,
            groq_model: default_groq_model(),
            gemini_model: default_gemini_model(),
            hf_model: default_hf_model(),
            user_avatar: String::new(),
            theme: "dark".to_string(),
        }
    }
}

/// Normalize a stored key: trimmed, empty treated as absent
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Settings {
    /// Load settings from the store, falling back to defaults per key
    pub fn load(storage: &Storage) -> Result<Self> {
        let provider = match storage.get_string(keys::PROVIDER)? {
            Some(tag) => tag.parse().unwrap_or(ProviderKind::Groq),
            None => ProviderKind::Groq,
        };

        Ok(Self {
            provider,
            groq_key: non_empty(storage.get_string(keys::GROQ_KEY)?),
            gemini_key: non_empty(storage.get_string(keys::GEMINI_KEY)?),
            hf_key: non_empty(storage.get_string(keys::HF_KEY)?),
            groq_model: storage
                .get_string(keys::GROQ_MODEL)?
                .unwrap_or_else(default_groq_model),
            gemini_model: storage
                .get_string(keys::GEMINI_MODEL)?
                .unwrap_or_else(default_gemini_model),
            hf_model: storage
                .get_string(keys::HF_MODEL)?
                .unwrap_or_else(default_hf_model),
            user_avatar: storage.get_string(keys::USER_AVATAR)?.unwrap_or_default(),
            theme: storage
                .get_string(keys::THEME)?
                .unwrap_or_else(|| "dark".to_string()),
        })
    }

    /// Persist settings to the store as individual keys
    pub fn save(&self, storage: &Storage) -> Result<()> {
        storage.put_string(keys::PROVIDER, &self.provider.to_string())?;
        storage.put_string(keys::GROQ_KEY, self.groq_key.as_deref().unwrap_or(""))?;
        storage.put_string(keys::GEMINI_KEY, self.gemini_key.as_deref().unwrap_or(""))?;
        storage.put_string(keys::HF_KEY, self.hf_key.as_deref().unwrap_or(""))?;
        storage.put_string(keys::GROQ_MODEL, &self.groq_model)?;
        storage.put_string(keys::GEMINI_MODEL, &self.gemini_model)?;
        storage.put_string(keys::HF_MODEL, &self.hf_model)?;
        storage.put_string(keys::USER_AVATAR, &self.user_avatar)?;
        storage.put_string(keys::THEME, &self.theme)?;
        Ok(())
    }

    /// True when the selected provider will route through the relay
    ///
    /// Only the keyless Groq path is relayed; that path is the one the
    /// daily quota applies to.
    pub fn uses_relay(&self) -> bool {
        self.provider == ProviderKind::Groq && self.groq_key.is_none()
    }

    /// The personal credential for a provider, if configured
    pub fn credential_for(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Groq => self.groq_key.as_deref(),
            ProviderKind::Gemini => self.gemini_key.as_deref(),
            ProviderKind::HuggingFace => self.hf_key.as_deref(),
        }
    }

    /// The model id configured for a provider
    pub fn model_for(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::Groq => &self.groq_model,
            ProviderKind::Gemini => &self.gemini_model,
            ProviderKind::HuggingFace => &self.hf_model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_roundtrip() {
        for (tag, kind) in [
            ("groq", ProviderKind::Groq),
            ("gemini", ProviderKind::Gemini),
            ("huggingface", ProviderKind::HuggingFace),
        ] {
            assert_eq!(tag.parse::<ProviderKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), tag);
        }
    }

    #[test]
    fn test_provider_kind_hf_alias() {
        assert_eq!(
            "hf".parse::<ProviderKind>().unwrap(),
            ProviderKind::HuggingFace
        );
    }

    #[test]
    fn test_provider_kind_unknown() {
        assert!("openai".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.generation.temperature, 0.9);
        assert_eq!(config.generation.max_tokens, 250);
        assert!(config.endpoints.gemini_api_base.contains("googleapis"));
        assert_eq!(config.relay.listen, "127.0.0.1:8787");
    }

    #[test]
    fn test_config_partial_yaml_fills_defaults() {
        let yaml = r#"
generation:
  max_tokens: 100
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.generation.max_tokens, 100);
        assert_eq!(config.generation.temperature, 0.9);
        assert!(config.endpoints.groq_api_base.contains("groq"));
    }

    #[test]
    fn test_config_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.endpoints.relay_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.provider, ProviderKind::Groq);
        assert!(settings.groq_key.is_none());
        assert_eq!(settings.groq_model, "llama3-8b-8192");
        assert_eq!(settings.gemini_model, "gemini-1.5-flash");
        assert!(settings.hf_model.contains("Mistral"));
    }

    #[test]
    fn test_settings_roundtrip_through_storage() {
        let storage = Storage::in_memory();
        let mut settings = Settings::default();
        settings.provider = ProviderKind::Gemini;
        settings.gemini_key = Some("AIza-test".to_string());
        settings.user_avatar = "https://example.com/me.png".to_string();
        settings.save(&storage).unwrap();

        let loaded = Settings::load(&storage).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_settings_blank_key_is_absent() {
        let storage = Storage::in_memory();
        storage.put_string(keys::GROQ_KEY, "   ").unwrap();

        let loaded = Settings::load(&storage).unwrap();
        assert!(loaded.groq_key.is_none());
        assert!(loaded.uses_relay());
    }

    #[test]
    fn test_uses_relay_only_for_keyless_groq() {
        let mut settings = Settings::default();
        assert!(settings.uses_relay());

        settings.groq_key = Some("gsk_test".to_string());
        assert!(!settings.uses_relay());

        settings.provider = ProviderKind::Gemini;
        settings.groq_key = None;
        assert!(!settings.uses_relay());
    }

    #[test]
    fn test_unknown_stored_provider_falls_back_to_groq() {
        let storage = Storage::in_memory();
        storage.put_string(keys::PROVIDER, "netscape").unwrap();

        let loaded = Settings::load(&storage).unwrap();
        assert_eq!(loaded.provider, ProviderKind::Groq);
    }
}
