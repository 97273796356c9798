//! Command handlers for the CLI
//!
//! This module provides the handlers invoked by the CLI entrypoint.
//! Handlers are intentionally small and use the library components:
//! the dispatch engine, the stores, the provider adapters, and the
//! relay server.

pub mod chat;
pub mod models;
pub mod personas;
pub mod quota;
pub mod relay;
pub mod sessions;
pub mod settings;
