//! Provider module for Otakuverse
//!
//! This module contains the provider abstraction and the three adapter
//! implementations (Groq, Gemini, Hugging Face). The dispatch engine
//! holds no provider-specific branching beyond selecting the variant
//! through [`create_provider`].

pub mod base;
pub mod gemini;
pub mod groq;
pub mod huggingface;

pub use base::{history_tail, ChatProvider, NO_RESPONSE};
pub use gemini::{clean_model_id, GeminiConfig, GeminiProvider};
pub use groq::{GroqConfig, GroqProvider};
pub use huggingface::{HuggingFaceConfig, HuggingFaceProvider};

use crate::config::{Config, ProviderKind, Settings};
use crate::error::{OtakuError, Result};

/// Create the adapter for the currently selected provider
///
/// Gemini and Hugging Face require a personal credential and fail with
/// `MissingCredentials` before any network traffic when none is
/// configured. Groq tolerates an absent credential by falling back to
/// relay mode.
///
/// # Arguments
///
/// * `settings` - User settings (provider selection, keys, models)
/// * `config` - Application configuration (endpoint bases)
///
/// # Errors
///
/// Returns `OtakuError::MissingCredentials` when the selected provider
/// requires a key that is absent.
///
/// # Examples
///
/// ```
/// use otakuverse::config::{Config, Settings};
/// use otakuverse::providers::create_provider;
///
/// # fn main() -> otakuverse::error::Result<()> {
/// let settings = Settings::default();
/// let provider = create_provider(&settings, &Config::default())?;
/// assert_eq!(provider.name(), "groq");
/// # Ok(())
/// # }
/// ```
pub fn create_provider(settings: &Settings, config: &Config) -> Result<Box<dyn ChatProvider>> {
    match settings.provider {
        ProviderKind::Groq => Ok(Box::new(GroqProvider::new(GroqConfig {
            key: settings.groq_key.clone(),
            model: settings.groq_model.clone(),
            api_base: config.endpoints.groq_api_base.clone(),
            relay_url: config.endpoints.relay_url.clone(),
        })?)),
        ProviderKind::Gemini => {
            let key = settings
                .gemini_key
                .clone()
                .ok_or_else(|| OtakuError::MissingCredentials("gemini".to_string()))?;
            Ok(Box::new(GeminiProvider::new(GeminiConfig {
                key,
                model: settings.gemini_model.clone(),
                api_base: config.endpoints.gemini_api_base.clone(),
            })?))
        }
        ProviderKind::HuggingFace => {
            let key = settings
                .hf_key
                .clone()
                .ok_or_else(|| OtakuError::MissingCredentials("huggingface".to_string()))?;
            Ok(Box::new(HuggingFaceProvider::new(HuggingFaceConfig {
                key,
                model: settings.hf_model.clone(),
                api_base: config.endpoints.hf_api_base.clone(),
            })?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_groq_without_key_is_relay() {
        let settings = Settings::default();
        let provider = create_provider(&settings, &Config::default()).unwrap();
        assert_eq!(provider.name(), "groq");
    }

    #[test]
    fn test_create_groq_with_key() {
        let mut settings = Settings::default();
        settings.groq_key = Some("gsk_test".to_string());
        let provider = create_provider(&settings, &Config::default()).unwrap();
        assert_eq!(provider.name(), "groq");
    }

    #[test]
    fn test_create_gemini_requires_key() {
        let mut settings = Settings::default();
        settings.provider = ProviderKind::Gemini;

        let result = create_provider(&settings, &Config::default());
        assert!(result.is_err());
        let err = result.err().unwrap();
        let inner = err.downcast_ref::<OtakuError>().unwrap();
        assert!(matches!(inner, OtakuError::MissingCredentials(p) if p == "gemini"));
    }

    #[test]
    fn test_create_gemini_with_key() {
        let mut settings = Settings::default();
        settings.provider = ProviderKind::Gemini;
        settings.gemini_key = Some("AIza-test".to_string());

        let provider = create_provider(&settings, &Config::default()).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn test_create_huggingface_requires_key() {
        let mut settings = Settings::default();
        settings.provider = ProviderKind::HuggingFace;

        let result = create_provider(&settings, &Config::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_create_huggingface_with_key() {
        let mut settings = Settings::default();
        settings.provider = ProviderKind::HuggingFace;
        settings.hf_key = Some("hf_test".to_string());

        let provider = create_provider(&settings, &Config::default()).unwrap();
        assert_eq!(provider.name(), "huggingface");
    }
}
