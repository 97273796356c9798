//! Command-line interface definition for Otakuverse
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chatting, persona management, sessions,
//! settings, and the relay server.

use clap::{Parser, Subcommand};

/// Otakuverse - chat with anime character personas
///
/// Converse with built-in or discovered characters through one of three
/// interchangeable AI providers (Groq, Gemini, Hugging Face).
#[derive(Parser, Debug, Clone)]
#[command(name = "otakuverse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Otakuverse
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat with a persona
    Chat {
        /// Persona to chat with (see `personas list`)
        #[arg(short, long)]
        persona: Option<String>,

        /// Override the provider from settings (groq, gemini, huggingface)
        #[arg(long)]
        provider: Option<String>,
    },

    /// Manage character personas
    Personas {
        /// Persona subcommand
        #[command(subcommand)]
        command: PersonaCommand,
    },

    /// Manage chat sessions
    Sessions {
        /// Session subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Show or change user settings
    Settings {
        /// Settings subcommand
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Query available Gemini models for the configured key
    Models {
        /// Model subcommand
        #[command(subcommand)]
        command: ModelCommand,
    },

    /// Show today's free-tier usage
    Quota,

    /// Run the relay server that fronts the shared Groq credential
    Relay {
        /// Listen address, e.g. 127.0.0.1:8787
        #[arg(short, long)]
        listen: Option<String>,
    },
}

/// Persona subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PersonaCommand {
    /// List saved personas
    List {
        /// Case-insensitive name filter
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Search the global character database
    Search {
        /// Free-text query (three characters minimum)
        query: String,
    },
}

/// Session subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List sessions, most recently active first
    List,

    /// Delete a session by id
    Delete {
        /// Session identifier
        id: String,
    },
}

/// Settings subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    /// Show current settings (keys are masked)
    Show,

    /// Select the active provider (groq, gemini, huggingface)
    SetProvider {
        /// Provider tag
        provider: String,
    },

    /// Store a personal API key for a provider (empty string clears it)
    SetKey {
        /// Provider tag
        provider: String,
        /// The API key
        key: String,
    },

    /// Set the model id for a provider
    SetModel {
        /// Provider tag
        provider: String,
        /// Model identifier
        model: String,
    },

    /// Set the avatar URL shown on your messages
    SetAvatar {
        /// Avatar URL
        url: String,
    },

    /// Set the UI theme token
    SetTheme {
        /// Theme name (dark, light)
        theme: String,
    },
}

/// Model subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ModelCommand {
    /// List models the configured Gemini key can access
    List,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
