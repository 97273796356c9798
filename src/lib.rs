//! Otakuverse - anime character chat library
//!
//! This library provides the core functionality for the Otakuverse chat
//! CLI: the provider dispatch engine, session and persona stores, the
//! daily free-tier quota tracker, provider adapters, and the relay
//! server fronting the shared credential.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `engine`: the dispatch state machine orchestrating each chat turn
//! - `providers`: provider abstraction and adapters (Groq, Gemini, HF)
//! - `session`: conversation sessions and append-only message logs
//! - `persona`: character personas, built-in and discovered
//! - `lookup`: external character search client
//! - `quota`: daily free-tier message quota
//! - `relay`: same-origin relay endpoint for the keyless path
//! - `storage`: key/value persistence port (sled or in-memory)
//! - `config`: application configuration and user settings
//! - `error`: error types and result alias
//! - `cli` / `commands`: command-line surface
//!
//! # Example
//!
//! ```no_run
//! use otakuverse::config::{Config, Settings};
//! use otakuverse::engine::ChatEngine;
//! use otakuverse::storage::Storage;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = ChatEngine::new(Config::default(), Storage::open_default()?);
//!     let outcome = engine
//!         .send_message(&Settings::default(), "goku", "Hey Goku!")
//!         .await?;
//!     println!("{}", outcome.reply.content);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod persona;
pub mod providers;
pub mod quota;
pub mod relay;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::{Config, ProviderKind, Settings};
pub use engine::{ChatEngine, TurnOutcome};
pub use error::{OtakuError, Result};
pub use persona::{builtin_personas, Persona, PersonaStore};
pub use session::{ChatMessage, ChatRole, ChatSession, SessionStore};
