//! Base provider trait and shared helpers
//!
//! This module defines the [`ChatProvider`] trait that all provider
//! adapters implement. An adapter owns the translation between the
//! engine's generic persona-plus-history shape and one vendor's wire
//! format: `build_request` produces the vendor JSON body,
//! `parse_response` extracts plain reply text, and `complete` performs
//! the HTTP round trip.

use crate::config::GenerationConfig;
use crate::error::Result;
use crate::persona::Persona;
use crate::session::ChatMessage;
use async_trait::async_trait;

/// Reply text used when a 2xx response carries no usable candidate
pub const NO_RESPONSE: &str = "(No response)";

/// Provider adapter contract
///
/// Each adapter independently bounds how much prior conversation it
/// includes per call (see [`history_tail`]); the slice always preserves
/// chronological order and always includes the just-appended user
/// message.
///
/// # Examples
///
/// ```no_run
/// use otakuverse::config::GenerationConfig;
/// use otakuverse::persona::builtin_personas;
/// use otakuverse::providers::{ChatProvider, GroqConfig, GroqProvider};
/// use otakuverse::session::ChatMessage;
///
/// # async fn example() -> otakuverse::error::Result<()> {
/// let provider = GroqProvider::new(GroqConfig::default())?;
/// let persona = builtin_personas().remove(0);
/// let history = vec![ChatMessage::user("Hi!", None)];
/// let reply = provider
///     .complete(&persona, &history, &GenerationConfig::default())
///     .await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short provider tag used in logs and error copy
    fn name(&self) -> &'static str;

    /// Translate persona + history + parameters into the vendor body
    ///
    /// Pure: no I/O, fully unit-testable.
    fn build_request(
        &self,
        persona: &Persona,
        history: &[ChatMessage],
        params: &GenerationConfig,
    ) -> Result<serde_json::Value>;

    /// Extract plain reply text from a successful vendor response body
    fn parse_response(&self, body: &serde_json::Value) -> Result<String>;

    /// Perform the network call and return the reply text
    ///
    /// # Errors
    ///
    /// Returns `OtakuError::RateLimited` for a rate-limit response and
    /// `OtakuError::Provider` for any other non-2xx or malformed
    /// response.
    async fn complete(
        &self,
        persona: &Persona,
        history: &[ChatMessage],
        params: &GenerationConfig,
    ) -> Result<String>;
}

/// The last `limit` messages of a history slice, in order
///
/// # Examples
///
/// ```
/// use otakuverse::providers::history_tail;
/// use otakuverse::session::ChatMessage;
///
/// let history: Vec<ChatMessage> = (0..12)
///     .map(|i| ChatMessage::user(format!("msg {}", i), None))
///     .collect();
/// let tail = history_tail(&history, 10);
/// assert_eq!(tail.len(), 10);
/// assert_eq!(tail[9].content, "msg 11");
/// ```
pub fn history_tail(history: &[ChatMessage], limit: usize) -> &[ChatMessage] {
    let start = history.len().saturating_sub(limit);
    &history[start..]
}
