//! Settings handlers
//!
//! All user settings live in the key/value store; each setter loads,
//! mutates, and saves the whole [`Settings`] unit so defaults stay
//! consistent.

use crate::config::{ProviderKind, Settings};
use crate::error::Result;
use crate::storage::Storage;
use colored::Colorize;
use prettytable::{format, Table};

/// Show current settings with masked credentials
pub fn show(storage: Storage) -> Result<()> {
    let settings = Settings::load(&storage)?;

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row!["Setting".bold(), "Value".bold()]);
    table.add_row(prettytable::row![
        "provider",
        settings.provider.to_string().cyan()
    ]);
    table.add_row(prettytable::row!["groq key", mask(settings.groq_key.as_deref())]);
    table.add_row(prettytable::row!["groq model", settings.groq_model]);
    table.add_row(prettytable::row![
        "gemini key",
        mask(settings.gemini_key.as_deref())
    ]);
    table.add_row(prettytable::row!["gemini model", settings.gemini_model]);
    table.add_row(prettytable::row!["hf key", mask(settings.hf_key.as_deref())]);
    table.add_row(prettytable::row!["hf model", settings.hf_model]);
    table.add_row(prettytable::row![
        "avatar",
        if settings.user_avatar.is_empty() {
            "(not set)".to_string()
        } else {
            settings.user_avatar
        }
    ]);
    table.add_row(prettytable::row!["theme", settings.theme]);

    table.printstd();
    Ok(())
}

/// Select the active provider
pub fn set_provider(storage: Storage, provider: String) -> Result<()> {
    let kind: ProviderKind = provider.parse()?;
    let mut settings = Settings::load(&storage)?;
    settings.provider = kind;
    settings.save(&storage)?;

    if kind == ProviderKind::Groq && settings.groq_key.is_none() {
        println!(
            "{}",
            "Using the relayed free tier (30 messages/day). Add a personal key for unlimited access."
                .yellow()
        );
    }
    println!("{}", format!("Provider set to {}", kind).green());
    Ok(())
}

/// Store (or clear) a personal API key for a provider
pub fn set_key(storage: Storage, provider: String, key: String) -> Result<()> {
    let kind: ProviderKind = provider.parse()?;
    let mut settings = Settings::load(&storage)?;

    let value = Some(key.trim().to_string()).filter(|k| !k.is_empty());
    let cleared = value.is_none();
    match kind {
        ProviderKind::Groq => settings.groq_key = value,
        ProviderKind::Gemini => settings.gemini_key = value,
        ProviderKind::HuggingFace => settings.hf_key = value,
    }
    settings.save(&storage)?;

    if cleared {
        println!("{}", format!("Cleared {} key", kind).green());
    } else {
        println!("{}", format!("Saved {} key", kind).green());
    }
    Ok(())
}

/// Set the model id for a provider
pub fn set_model(storage: Storage, provider: String, model: String) -> Result<()> {
    let kind: ProviderKind = provider.parse()?;
    let mut settings = Settings::load(&storage)?;

    match kind {
        ProviderKind::Groq => settings.groq_model = model.trim().to_string(),
        ProviderKind::Gemini => {
            settings.gemini_model = crate::providers::clean_model_id(&model);
        }
        ProviderKind::HuggingFace => settings.hf_model = model.trim().to_string(),
    }
    settings.save(&storage)?;
    println!(
        "{}",
        format!("Model for {} set to {}", kind, settings.model_for(kind)).green()
    );
    Ok(())
}

/// Set the avatar URL shown on user messages
pub fn set_avatar(storage: Storage, url: String) -> Result<()> {
    let mut settings = Settings::load(&storage)?;
    settings.user_avatar = url.trim().to_string();
    settings.save(&storage)?;
    println!("{}", "Avatar updated".green());
    Ok(())
}

/// Set the UI theme token
pub fn set_theme(storage: Storage, theme: String) -> Result<()> {
    let mut settings = Settings::load(&storage)?;
    settings.theme = theme.trim().to_string();
    settings.save(&storage)?;
    println!("{}", format!("Theme set to {}", settings.theme).green());
    Ok(())
}

/// Mask a credential for display
fn mask(key: Option<&str>) -> String {
    match key {
        None => "(not set)".to_string(),
        Some(key) if key.chars().count() > 8 => {
            let head: String = key.chars().take(4).collect();
            let tail: String = key.chars().skip(key.chars().count() - 2).collect();
            format!("{}…{}", head, tail)
        }
        Some(_) => "••••".to_string(),
    }
}
