//! Session management handlers

use crate::error::Result;
use crate::persona::PersonaStore;
use crate::session::SessionStore;
use crate::storage::Storage;
use colored::Colorize;
use prettytable::{format, Table};

/// List sessions, most recently active first
pub fn list(storage: Storage) -> Result<()> {
    let sessions = SessionStore::new(storage.clone());
    let personas = PersonaStore::new(storage);

    let all = sessions.list()?;
    if all.is_empty() {
        println!("{}", "No chat sessions yet.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "ID".bold(),
        "Persona".bold(),
        "Messages".bold(),
        "Last activity".bold(),
        "Last message".bold()
    ]);

    for session in all {
        let name = personas
            .get(&session.persona_id)?
            .map(|p| p.name)
            .unwrap_or_else(|| session.persona_id.clone());
        let last = session
            .messages
            .last()
            .map(|m| excerpt(&m.content, 40))
            .unwrap_or_else(|| "Start chatting...".to_string());

        table.add_row(prettytable::row![
            session.id.cyan(),
            name,
            session.messages.len(),
            session.last_message_at.format("%Y-%m-%d %H:%M"),
            last
        ]);
    }

    table.printstd();
    Ok(())
}

/// Delete a session by id
pub fn delete(storage: Storage, id: String) -> Result<()> {
    let sessions = SessionStore::new(storage);
    sessions.delete(&id)?;
    println!("{}", format!("Deleted session {}", id).green());
    Ok(())
}

fn excerpt(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(limit).collect();
        truncated.push_str("...");
        truncated
    }
}
