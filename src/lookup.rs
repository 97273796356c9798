//! External character lookup
//!
//! Searches a public anime character database (Jikan v4) and maps the
//! results into externally sourced [`Persona`] records, each with a
//! role-play system prompt synthesized from the available biographical
//! text. Queries of two characters or fewer return nothing; debouncing
//! rapid queries is a concern of interactive callers, not this client.

use crate::error::{OtakuError, Result};
use crate::persona::Persona;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Minimum query length before the search fires
pub const MIN_QUERY_LEN: usize = 3;

/// Maximum candidates returned per search
pub const MAX_RESULTS: usize = 5;

/// Length the description excerpt is truncated to
const DESCRIPTION_LIMIT: usize = 50;

/// Length the biographical text is truncated to inside the system prompt,
/// bounding the provider instruction size
const ABOUT_PROMPT_LIMIT: usize = 800;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<CharacterResult>,
}

#[derive(Debug, Deserialize)]
struct CharacterResult {
    mal_id: u64,
    name: String,
    #[serde(default)]
    about: Option<String>,
    #[serde(default)]
    images: Option<CharacterImages>,
}

#[derive(Debug, Deserialize)]
struct CharacterImages {
    #[serde(default)]
    jpg: Option<CharacterImage>,
}

#[derive(Debug, Deserialize)]
struct CharacterImage {
    #[serde(default)]
    image_url: Option<String>,
}

/// Client for the character search service
pub struct CharacterLookup {
    client: Client,
    api_base: String,
}

/// Truncate to a character count, appending an ellipsis when trimmed
fn excerpt(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(limit).collect();
        truncated.push_str("...");
        truncated
    }
}

impl CharacterLookup {
    /// Create a lookup client against an API base
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("otakuverse/0.1.0")
            .build()
            .map_err(|e| OtakuError::Lookup(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.into(),
        })
    }

    /// Search for characters matching a free-text query
    ///
    /// Returns up to [`MAX_RESULTS`] personas, each marked externally
    /// sourced. Queries shorter than [`MIN_QUERY_LEN`] return an empty
    /// list without touching the network.
    ///
    /// # Errors
    ///
    /// Returns `OtakuError::Lookup` on transport failures or non-2xx
    /// responses.
    pub async fn search(&self, query: &str) -> Result<Vec<Persona>> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/characters?q={}&limit={}",
            self.api_base,
            urlencode(query),
            MAX_RESULTS
        );
        tracing::debug!("Searching characters: {}", query);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OtakuError::Lookup(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OtakuError::Lookup(format!("Search returned {}", status)).into());
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| OtakuError::Lookup(format!("Failed to parse search response: {}", e)))?;

        Ok(parsed
            .data
            .into_iter()
            .take(MAX_RESULTS)
            .map(persona_from_result)
            .collect())
    }
}

/// Percent-encode a query string for use in a URL
fn urlencode(query: &str) -> String {
    url::form_urlencoded::byte_serialize(query.as_bytes()).collect()
}

fn persona_from_result(result: CharacterResult) -> Persona {
    let about = result.about.as_deref().unwrap_or("").trim().to_string();
    let description = if about.is_empty() {
        "Anime Character".to_string()
    } else {
        excerpt(&about, DESCRIPTION_LIMIT)
    };
    let bio = if about.is_empty() {
        "Unknown".to_string()
    } else {
        excerpt(&about, ABOUT_PROMPT_LIMIT)
    };

    Persona {
        id: format!("mal_{}", result.mal_id),
        name: result.name.clone(),
        avatar: result
            .images
            .and_then(|i| i.jpg)
            .and_then(|j| j.image_url)
            .unwrap_or_default(),
        description,
        system_prompt: format!(
            "You are {}. {}. Roleplay as {}.",
            result.name, bio, result.name
        ),
        color: "slate".to_string(),
        is_external: true,
    }
}
