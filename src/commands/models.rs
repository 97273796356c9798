//! Model listing handler
//!
//! Checks which Gemini models the configured key can actually use for
//! generation, mirroring the "check access" flow of the settings UI.

use crate::config::{Config, ProviderKind, Settings};
use crate::error::{OtakuError, Result};
use crate::providers::{GeminiConfig, GeminiProvider};
use crate::storage::Storage;
use colored::Colorize;

/// List Gemini models available to the configured key
pub async fn list(config: Config, storage: Storage) -> Result<()> {
    let settings = Settings::load(&storage)?;
    let Some(key) = settings.credential_for(ProviderKind::Gemini).map(String::from) else {
        println!(
            "{}",
            "No Gemini key configured. Add one with `otakuverse settings set-key gemini <key>`."
                .yellow()
        );
        return Err(OtakuError::MissingCredentials("gemini".to_string()).into());
    };

    let provider = GeminiProvider::new(GeminiConfig {
        key,
        model: settings.gemini_model.clone(),
        api_base: config.endpoints.gemini_api_base.clone(),
    })?;

    let models = provider.list_models().await?;
    println!("Models supporting generation with your key:");
    for model in models {
        let marker = if model == settings.gemini_model {
            "*".green().to_string()
        } else {
            " ".to_string()
        };
        println!("  {} {}", marker, model);
    }
    println!();
    println!(
        "Switch with {}.",
        "otakuverse settings set-model gemini <model>".cyan()
    );
    Ok(())
}
