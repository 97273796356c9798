//! Interactive chat mode handler
//!
//! Binds a readline loop to one persona's session: replays existing
//! history, submits each line through the dispatch engine, and renders
//! replies with the free-tier usage badge where it applies.

use crate::config::{Config, Settings};
use crate::engine::ChatEngine;
use crate::error::{OtakuError, Result};
use crate::persona::Persona;
use crate::quota::DAILY_LIMIT;
use crate::session::{ChatMessage, ChatRole};
use crate::storage::Storage;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Start interactive chat mode
///
/// # Arguments
///
/// * `config` - Application configuration
/// * `storage` - Storage handle shared with the engine
/// * `persona_id` - Persona to chat with; prompted for when absent
/// * `provider_override` - Optional provider tag overriding settings
pub async fn run_chat(
    config: Config,
    storage: Storage,
    persona_id: Option<String>,
    provider_override: Option<String>,
) -> Result<()> {
    let mut settings = Settings::load(&storage)?;
    if let Some(tag) = provider_override {
        settings.provider = tag.parse()?;
    }

    let engine = ChatEngine::new(config, storage);
    let mut editor =
        DefaultEditor::new().map_err(|e| OtakuError::Config(format!("Readline init: {}", e)))?;

    let persona = match persona_id {
        Some(id) => engine
            .personas()
            .get(&id)?
            .ok_or_else(|| OtakuError::NotFound(format!("persona {}", id)))?,
        None => pick_persona(&engine, &mut editor)?,
    };

    let session = engine.sessions().get_or_create(&persona.id)?;
    engine.sessions().set_active(Some(&session.id))?;

    println!();
    println!(
        "Chatting with {} via {} (/quit to leave)",
        persona.name.bold().magenta(),
        settings.provider.to_string().cyan()
    );
    if settings.uses_relay() {
        print_quota_badge(engine.quota().current_count()?);
    }
    println!();

    for message in &session.messages {
        print_message(&persona, message);
    }

    loop {
        let line = match editor.readline(&"you> ".cyan().to_string()) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(OtakuError::Config(format!("Readline: {}", e)).into()),
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" || text == "/exit" {
            break;
        }
        let _ = editor.add_history_entry(text);

        match engine.send_message(&settings, &persona.id, text).await {
            Ok(outcome) => {
                print_message(&persona, &outcome.reply);
                if let Some(count) = outcome.quota_count {
                    print_quota_badge(count);
                }
            }
            Err(err) => print_turn_error(err),
        }
    }

    println!("{}", "Bye!".dimmed());
    Ok(())
}

/// Prompt for a persona when none was given on the command line
fn pick_persona(engine: &ChatEngine, editor: &mut DefaultEditor) -> Result<Persona> {
    let session_personas: Vec<String> = engine
        .sessions()
        .list()?
        .into_iter()
        .map(|s| s.persona_id)
        .collect();
    let personas = engine.personas().list("", &session_personas)?;

    println!("Available personas:");
    for persona in &personas {
        println!(
            "  {} {} - {}",
            persona.avatar,
            persona.id.cyan(),
            persona.description.dimmed()
        );
    }

    let line = editor
        .readline("persona> ")
        .map_err(|e| OtakuError::Config(format!("Readline: {}", e)))?;
    let id = line.trim();
    engine
        .personas()
        .get(id)?
        .ok_or_else(|| OtakuError::NotFound(format!("persona {}", id)).into())
}

fn print_message(persona: &Persona, message: &ChatMessage) {
    match message.role {
        ChatRole::User => println!("{} {}", "you:".cyan().bold(), message.content),
        ChatRole::Assistant => println!(
            "{} {}",
            format!("{}:", persona.name).magenta().bold(),
            message.content
        ),
    }
}

fn print_quota_badge(count: u32) {
    let badge = format!("⚡ {}/{} free messages today", count, DAILY_LIMIT);
    let percentage = count * 100 / DAILY_LIMIT;
    if percentage >= 100 {
        println!("{}", badge.red());
    } else if percentage > 66 {
        println!("{}", badge.yellow());
    } else {
        println!("{}", badge.green());
    }
}

fn print_turn_error(err: anyhow::Error) {
    match err.downcast_ref::<OtakuError>() {
        Some(OtakuError::QuotaExceeded { limit }) => {
            println!(
                "{}",
                format!(
                    "Daily limit of {} free messages reached. Add a personal key with \
                     `otakuverse settings set-key groq <key>` for unlimited access.",
                    limit
                )
                .red()
            );
        }
        Some(OtakuError::MissingCredentials(provider)) => {
            println!(
                "{}",
                format!(
                    "No API key for {}. Add one with `otakuverse settings set-key {} <key>`.",
                    provider, provider
                )
                .yellow()
            );
        }
        Some(OtakuError::SessionBusy(_)) => {
            println!("{}", "Still waiting on the previous reply...".yellow());
        }
        // A stale persona/session reference is not user-actionable
        Some(OtakuError::NotFound(what)) => tracing::debug!("Ignoring stale reference: {}", what),
        _ => println!("{}", format!("Error: {}", err).red()),
    }
}
