//! Gemini provider adapter
//!
//! Direct-to-vendor adapter for Google's `generateContent` API. The wire
//! shape differs from chat completions: turns go into `contents` with a
//! `user`/`model` role vocabulary, the persona instruction rides in a
//! separate `systemInstruction` block, and generation parameters use the
//! `generationConfig` casing. A personal API key is always required.

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

/// Gemini adapter configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Personal API key (required)
    pub key: String,
    /// Model identifier; a `models/` prefix is tolerated and stripped
    pub model: String,
    /// Vendor API base (overridable for tests)
    pub api_base: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

/// Gemini `generateContent` adapter
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

/// Strip a `models/` prefix and whitespace from a model id
///
/// The vendor's listing endpoint returns ids as `models/<name>`, but the
/// generate endpoint wants the bare name. Empty input falls back to the
/// default model.
pub fn clean_model_id(id: &str) -> String {
    let cleaned = id.trim().trim_start_matches("models/").trim();
    if cleaned.is_empty() {
        "gemini-1.5-flash".to_string()
    } else {
        cleaned.to_string()
    }
}

impl GeminiProvider {
    /// Create a new Gemini adapter
    ///
    /// # Errors
    ///
    /// Returns `OtakuError::MissingCredentials` if the key is blank, or
    /// a provider error if HTTP client initialization fails.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.key.trim().is_empty() {
            return Err(OtakuError::MissingCredentials("gemini".to_string()).into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("otakuverse/0.1.0")
            .build()
            .map_err(|e| OtakuError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn model(&self) -> String {
        clean_model_id(&self.config.model)
    }

    /// List models the configured key can use for generation
    ///
    /// Queries the vendor's model listing and keeps only models that
    /// support `generateContent`, with the `models/` prefix stripped.
    ///
    /// # Errors
    ///
    /// Returns a provider error with the vendor's message on a non-2xx
    /// response.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!(
            "{}/v1beta/models?key={}",
            self.config.api_base, self.config.key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OtakuError::Provider(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OtakuError::Provider(format!("Failed to parse Gemini response: {}", e)))?;

        if !status.is_success() {
            let message = data
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .unwrap_or_else(|| status.as_str())
                .to_string();
            return Err(OtakuError::Provider(format!("Gemini error: {}", message)).into());
        }

        let models = data
            .get("models")
            .and_then(|v| v.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter(|m| {
                        m.get("supportedGenerationMethods")
                            .and_then(|v| v.as_array())
                            .map(|methods| {
                                methods.iter().any(|method| method == "generateContent")
                            })
                            .unwrap_or(false)
                    })
                    .filter_map(|m| m.get("name").and_then(|v| v.as_str()))
                    .map(clean_model_id)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if models.is_empty() {
            return Err(OtakuError::Provider("No models found".to_string()).into());
        }
        Ok(models)
    }
}

/// Map a session role onto Gemini's `user`/`model` vocabulary
fn wire_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "model",
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn build_request(
        &self,
        persona: &Persona,
        history: &[ChatMessage],
        params: &GenerationConfig,
    ) -> Result<serde_json::Value> {
        let contents: Vec<serde_json::Value> = history_tail(history, HISTORY_WINDOW)
            .iter()
            .map(|message| {
                json!({
                    "role": wire_role(message.role),
                    "parts": [{"text": message.content}],
                })
            })
            .collect();

        Ok(json!({
            "contents": contents,
            "systemInstruction": {
                "parts": [{"text": format!(
                    "{}\n\nIMPORTANT: Roleplay as {}. Short responses.",
                    persona.system_prompt, persona.name
                )}]
            },
            "generationConfig": {
                "temperature": params.temperature,
                "maxOutputTokens": params.max_tokens,
            },
        }))
    }

    fn parse_response(&self, body: &serde_json::Value) -> Result<String> {
        let text = body
            .pointer("/candidates/0/content/parts/0/text")
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
        let model = self.model();
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.api_base, model, self.config.key
        );
        tracing::debug!(
            "Sending Gemini request: model={}, {} history messages",
            model,
            history.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Gemini request failed: {}", e);
                OtakuError::Provider(format!("Gemini request failed: {}", e))
            })?;

        let status = response.status();
        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OtakuError::Provider(format!("Failed to parse Gemini response: {}", e)))?;

        if !status.is_success() {
            let message = data
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .unwrap_or_else(|| status.as_str())
                .to_string();
            tracing::warn!("Gemini returned {}: {}", status, message);

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(OtakuError::Provider(format!(
                    "Model '{}' not found (404). Try `otakuverse models list`",
                    model
                ))
                .into());
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || message.to_lowercase().contains("rate limit")
            {
                return Err(OtakuError::RateLimited(message).into());
            }
            return Err(OtakuError::Provider(format!("Gemini error: {}", message)).into());
        }

        self.parse_response(&data)
    }
}
