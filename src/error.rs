//! Error types for Otakuverse
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Otakuverse operations
///
/// This enum encompasses all possible errors that can occur during
/// dispatch, provider interactions, persona lookup, configuration
/// loading, and state persistence.
#[derive(Error, Debug)]
pub enum OtakuError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing credentials for a provider that requires a personal key
    ///
    /// Recovered by prompting the user to open settings; never sent to
    /// the network.
    #[error("Missing API key for provider '{0}'. Add one with `otakuverse settings set-key`")]
    MissingCredentials(String),

    /// Daily free-tier message quota exhausted
    ///
    /// Raised before any network call when the relayed Groq path has hit
    /// its daily ceiling.
    #[error("Daily limit of {limit} free messages reached. Wait for tomorrow or add a personal key")]
    QuotaExceeded {
        /// The daily ceiling that was hit
        limit: u32,
    },

    /// Provider-related errors (non-2xx responses, malformed bodies)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider signalled rate limiting (HTTP 429 or equivalent)
    ///
    /// Distinguished from other provider failures so callers can render
    /// the wait-and-retry hint instead of a generic error.
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    /// A referenced session or persona no longer exists
    ///
    /// Indicates a stale reference rather than a user-actionable
    /// condition; callers treat it as a no-op.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A send is already in flight for the session
    ///
    /// Overlapping sends against one session are rejected rather than
    /// queued.
    #[error("A send is already in flight for session {0}")]
    SessionBusy(String),

    /// Character lookup errors (external search service)
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// State persistence errors (key/value store operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Otakuverse operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

impl OtakuError {
    /// Returns true when this error represents a provider rate limit
    ///
    /// Used by the dispatch engine to pick the rate-limit-specific
    /// conversation copy over the generic failure copy.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}
