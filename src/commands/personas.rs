//! Persona management handlers

use crate::config::Config;
use crate::error::Result;
use crate::lookup::{CharacterLookup, MIN_QUERY_LEN};
use crate::persona::PersonaStore;
use crate::session::SessionStore;
use crate::storage::Storage;
use colored::Colorize;
use prettytable::{format, Table};

/// List saved personas
///
/// Externally sourced personas only appear once a session references
/// them, keeping the saved list curated.
pub fn list(storage: Storage, filter: Option<String>) -> Result<()> {
    let personas = PersonaStore::new(storage.clone());
    let sessions = SessionStore::new(storage);

    let session_personas: Vec<String> = sessions
        .list()?
        .into_iter()
        .map(|s| s.persona_id)
        .collect();
    let matches = personas.list(filter.as_deref().unwrap_or(""), &session_personas)?;

    if matches.is_empty() {
        println!("{}", "No personas found. Try `personas search <name>`.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "ID".bold(),
        "Name".bold(),
        "Description".bold(),
        "Source".bold()
    ]);

    for persona in matches {
        let source = if persona.is_external { "search" } else { "built-in" };
        table.add_row(prettytable::row![
            persona.id.cyan(),
            format!("{} {}", persona.avatar, persona.name),
            persona.description,
            source
        ]);
    }

    table.printstd();
    println!();
    println!("Start chatting with {}.", "otakuverse chat --persona <ID>".cyan());
    Ok(())
}

/// Search the global character database and save the results
pub async fn search(config: Config, storage: Storage, query: String) -> Result<()> {
    if query.trim().chars().count() < MIN_QUERY_LEN {
        println!(
            "{}",
            format!("Type at least {} characters to search.", MIN_QUERY_LEN).yellow()
        );
        return Ok(());
    }

    let lookup = CharacterLookup::new(config.endpoints.lookup_api_base.clone())?;
    let results = lookup.search(&query).await?;

    if results.is_empty() {
        println!("{}", "No characters found.".yellow());
        return Ok(());
    }

    let personas = PersonaStore::new(storage);
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row!["ID".bold(), "Name".bold(), "About".bold()]);

    for persona in results {
        table.add_row(prettytable::row![
            persona.id.cyan(),
            persona.name.clone(),
            persona.description.clone()
        ]);
        // Saving never clobbers a previously discovered record
        personas.upsert(persona)?;
    }

    table.printstd();
    println!();
    println!("Start chatting with {}.", "otakuverse chat --persona <ID>".cyan());
    Ok(())
}
