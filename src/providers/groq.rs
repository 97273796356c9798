//! Groq provider adapter
//!
//! Speaks the OpenAI-style chat-completions shape. Two transport modes
//! share one request body:
//!
//! - **direct**: a personal API key is configured, so the adapter posts
//!   straight to the vendor with a bearer token;
//! - **relay**: no key is configured, so the identical payload goes to
//!   the same-origin relay endpoint, which injects the shared credential
//!   server-side. No credential ever leaves this process on that path.
//!
//! The relay path is the only one subject to the daily quota; the
//! dispatch engine owns that check.

use crate::config::GenerationConfig;
use crate::error::{OtakuError, Result};
use crate::persona::Persona;
use crate::providers::base::{history_tail, ChatProvider, NO_RESPONSE};
use crate::session::{ChatMessage, ChatRole};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// Messages of prior conversation included per call
const HISTORY_WINDOW: usize = 10;

/// Groq adapter configuration
#[derive(Debug, Clone)]
pub struct GroqConfig {
    /// Personal API key; `None` selects the relay mode
    pub key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Vendor API base (overridable for tests)
    pub api_base: String,
    /// Relay endpoint used when no key is configured
    pub relay_url: String,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            key: None,
            model: "llama3-8b-8192".to_string(),
            api_base: "https://api.groq.com/openai/v1".to_string(),
            relay_url: "http://127.0.0.1:8787/api/chat".to_string(),
        }
    }
}

/// Groq chat-completions adapter
pub struct GroqProvider {
    client: Client,
    config: GroqConfig,
}

impl GroqProvider {
    /// Create a new Groq adapter
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: GroqConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("otakuverse/0.1.0")
            .build()
            .map_err(|e| OtakuError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!(
            "Initialized Groq provider: model={}, mode={}",
            config.model,
            if config.key.is_some() { "direct" } else { "relay" }
        );

        Ok(Self { client, config })
    }

    /// True when this adapter posts to the relay instead of the vendor
    pub fn is_relay(&self) -> bool {
        self.config.key.is_none()
    }

    fn endpoint(&self) -> String {
        if self.is_relay() {
            self.config.relay_url.clone()
        } else {
            format!("{}/chat/completions", self.config.api_base)
        }
    }
}

/// Map a session role onto the chat-completions vocabulary
///
/// The legacy `model` synonym was already folded into `Assistant` at the
/// session boundary, so only two strings remain.
fn wire_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

#[async_trait]
impl ChatProvider for GroqProvider {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn build_request(
        &self,
        persona: &Persona,
        history: &[ChatMessage],
        params: &GenerationConfig,
    ) -> Result<serde_json::Value> {
        let mut messages = vec![json!({
            "role": "system",
            "content": format!(
                "{}\n\nIMPORTANT: Roleplay as {}. Stay in character.",
                persona.system_prompt, persona.name
            ),
        })];

        for message in history_tail(history, HISTORY_WINDOW) {
            messages.push(json!({
                "role": wire_role(message.role),
                "content": message.content,
            }));
        }

        Ok(json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        }))
    }

    fn parse_response(&self, body: &serde_json::Value) -> Result<String> {
        let text = body
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_RESPONSE);
        Ok(text.to_string())
    }

    async fn complete(
        &self,
        persona: &Persona,
        history: &[ChatMessage],
        params: &GenerationConfig,
    ) -> Result<String> {
        let body = self.build_request(persona, history, params)?;
        let url = self.endpoint();
        tracing::debug!(
            "Sending Groq request to {} ({} history messages)",
            url,
            history.len()
        );

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Groq request failed: {}", e);
            OtakuError::Provider(format!("Groq request failed: {}", e))
        })?;

        let status = response.status();
        let data: serde_json::Value = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Groq response: {}", e);
            OtakuError::Provider(format!("Failed to parse Groq response: {}", e))
        })?;

        if !status.is_success() {
            let message = data
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .or_else(|| data.get("error").and_then(|v| v.as_str()))
                .unwrap_or_else(|| status.as_str())
                .to_string();
            tracing::warn!("Groq returned {}: {}", status, message);

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || message.to_lowercase().contains("rate limit")
            {
                return Err(OtakuError::RateLimited(message).into());
            }
            return Err(OtakuError::Provider(format!("Groq error: {}", message)).into());
        }

        self.parse_response(&data)
    }
}
