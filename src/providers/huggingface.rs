//! Hugging Face provider adapter
//!
//! Direct-to-vendor adapter for the serverless inference API. Unlike the
//! chat-shaped vendors, this endpoint takes a single prompt string, so
//! the adapter renders the persona instruction and recent turns into the
//! Mistral instruct template (`[INST] ... [/INST]`). A personal access
//! token is always required.

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
///
/// Smaller than the chat-shaped providers: every message is inlined into
/// one prompt string, so the window directly controls payload size.
const HISTORY_WINDOW: usize = 5;

/// Hugging Face adapter configuration
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    /// Personal access token (required)
    pub key: String,
    /// Model repository id, e.g. `mistralai/Mistral-7B-Instruct-v0.2`
    pub model: String,
    /// Inference API base (overridable for tests)
    pub api_base: String,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            model: "mistralai/Mistral-7B-Instruct-v0.2".to_string(),
            api_base: "https://api-inference.huggingface.co".to_string(),
        }
    }
}

/// Hugging Face inference adapter
pub struct HuggingFaceProvider {
    client: Client,
    config: HuggingFaceConfig,
}

impl HuggingFaceProvider {
    /// Create a new Hugging Face adapter
    ///
    /// # Errors
    ///
    /// Returns `OtakuError::MissingCredentials` if the token is blank, or
    /// a provider error if HTTP client initialization fails.
    pub fn new(config: HuggingFaceConfig) -> Result<Self> {
        if config.key.trim().is_empty() {
            return Err(OtakuError::MissingCredentials("huggingface".to_string()).into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("otakuverse/0.1.0")
            .build()
            .map_err(|e| OtakuError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Render persona instruction and recent turns into one prompt string
    fn render_prompt(&self, persona: &Persona, history: &[ChatMessage]) -> String {
        let mut prompt = format!("<s>[INST] {} [/INST] Understood.</s>", persona.system_prompt);
        for message in history_tail(history, HISTORY_WINDOW) {
            prompt.push('\n');
            match message.role {
                ChatRole::User => {
                    prompt.push_str(&format!("[INST] {} [/INST]", message.content));
                }
                ChatRole::Assistant => {
                    prompt.push_str(&format!("{}</s>", message.content));
                }
            }
        }
        prompt
    }
}

#[async_trait]
impl ChatProvider for HuggingFaceProvider {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    fn build_request(
        &self,
        persona: &Persona,
        history: &[ChatMessage],
        params: &GenerationConfig,
    ) -> Result<serde_json::Value> {
        Ok(json!({
            "inputs": self.render_prompt(persona, history),
            "parameters": {
                "max_new_tokens": params.max_tokens,
                "temperature": params.temperature,
                "return_full_text": false,
            },
        }))
    }

    fn parse_response(&self, body: &serde_json::Value) -> Result<String> {
        // The inference API returns either an array of generations or a
        // single object, depending on the model backend.
        let text = body
            .pointer("/0/generated_text")
            .or_else(|| body.get("generated_text"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_RESPONSE);
        Ok(text.trim().to_string())
    }

    async fn complete(
        &self,
        persona: &Persona,
        history: &[ChatMessage],
        params: &GenerationConfig,
    ) -> Result<String> {
        let body = self.build_request(persona, history, params)?;
        let url = format!("{}/models/{}", self.config.api_base, self.config.model);
        tracing::debug!(
            "Sending Hugging Face request: model={}, {} history messages",
            self.config.model,
            history.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Hugging Face request failed: {}", e);
                OtakuError::Provider(format!("Hugging Face request failed: {}", e))
            })?;

        let status = response.status();
        let data: serde_json::Value = response.json().await.map_err(|e| {
            OtakuError::Provider(format!("Failed to parse Hugging Face response: {}", e))
        })?;

        if !status.is_success() {
            let message = data
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or_else(|| status.as_str())
                .to_string();
            tracing::warn!("Hugging Face returned {}: {}", status, message);

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || message.to_lowercase().contains("rate limit")
            {
                return Err(OtakuError::RateLimited(message).into());
            }
            return Err(OtakuError::Provider(format!("HF error: {}", message)).into());
        }

        self.parse_response(&data)
    }
}
