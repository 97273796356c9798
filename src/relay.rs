//! Same-origin relay endpoint for the keyless Groq path
//!
//! The relay accepts the exact chat-completions payload a direct client
//! would send, forwards it upstream with a credential injected
//! server-side, and passes the vendor's JSON response back verbatim. On
//! vendor failure the vendor's status is preserved; HTTP 500 is reserved
//! for relay-internal failures (missing server credential, transport or
//! parse errors).
//!
//! The server credential comes from the `GROQ_API_KEY` environment
//! variable and never reaches any client.

use crate::error::{OtakuError, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::time::Duration;

/// Environment variable holding the server-side credential
pub const SERVER_KEY_ENV: &str = "GROQ_API_KEY";

/// Shared relay state
#[derive(Clone)]
pub struct RelayState {
    client: reqwest::Client,
    upstream: String,
    api_key: Option<String>,
}

impl RelayState {
    /// Create relay state over an upstream base URL
    ///
    /// # Arguments
    ///
    /// * `upstream` - Vendor API base, e.g. `https://api.groq.com/openai/v1`
    /// * `api_key` - Server-side credential; `None` makes every request
    ///   fail with the not-configured error
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(upstream: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("otakuverse-relay/0.1.0")
            .build()
            .map_err(|e| OtakuError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            upstream: upstream.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Create relay state reading the credential from the environment
    pub fn from_env(upstream: impl Into<String>) -> Result<Self> {
        Self::new(upstream, std::env::var(SERVER_KEY_ENV).ok())
    }
}

/// Build the relay router
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/api/chat", post(relay_chat))
        .with_state(state)
}

/// Bind and run the relay server
pub async fn serve(listen: &str, state: RelayState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!("Relay listening on {}", listener.local_addr()?);
    if state.api_key.is_none() {
        tracing::warn!(
            "{} is not set; relay requests will fail until it is configured",
            SERVER_KEY_ENV
        );
    }
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn relay_chat(
    State(state): State<RelayState>,
    Json(payload): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(api_key) = state.api_key.as_deref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Groq API Key not configured on server"})),
        );
    };

    let url = format!("{}/chat/completions", state.upstream);
    let response = match state
        .client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&payload)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Relay upstream request failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal Server Error"})),
            );
        }
    };

    let upstream_status = response.status();
    let data: serde_json::Value = match response.json().await {
        Ok(data) => data,
        Err(e) => {
            tracing::error!("Relay failed to parse upstream response: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal Server Error"})),
            );
        }
    };

    // reqwest and axum disagree on http versions, so the status crosses
    // over as a bare u16.
    let status = StatusCode::from_u16(upstream_status.as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if !upstream_status.is_success() {
        let message = data
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .unwrap_or("Error fetching from Groq")
            .to_string();
        tracing::warn!("Relay upstream returned {}: {}", upstream_status, message);
        return (status, Json(json!({"error": message})));
    }

    (status, Json(data))
}
