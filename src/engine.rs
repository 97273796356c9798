//! Dispatch engine
//!
//! The orchestrator behind every chat turn. Given a user message, the
//! engine selects the active provider adapter, enforces the free-tier
//! quota, optimistically commits the user message, performs the provider
//! call, and commits either the assistant reply or a recovered error
//! message; the conversation stays continuous through provider
//! failures.
//!
//! Per-turn state machine:
//!
//! ```text
//! Idle -> AwaitingCredential (if missing) -> QuotaCheck -> Sending
//!      -> {Succeeded | Failed}
//! ```
//!
//! Configuration and quota rejections fire before any session mutation
//! or network traffic; once the user turn is appended it stays appended
//! even when the reply fails.

use crate::config::{Config, Settings};
use crate::error::{OtakuError, Result};
use crate::persona::PersonaStore;
use crate::providers::create_provider;
use crate::quota::{DailyQuota, DAILY_LIMIT};
use crate::session::{ChatMessage, SessionStore};
use crate::storage::Storage;
use std::collections::HashSet;
use std::sync::Mutex;

/// Conversation copy for a rate-limited provider failure
const RATE_LIMIT_COPY: &str =
    "**⚠️ Global free tier is busy (Rate Limit). Please wait 30s or use your own key in Settings.**";

/// Result of one completed chat turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The session the turn was appended to
    pub session_id: String,
    /// The committed assistant message (reply or recovered error)
    pub reply: ChatMessage,
    /// True when the reply is a recovered provider failure
    pub recovered_failure: bool,
    /// New quota count, present only when the relayed path incremented it
    pub quota_count: Option<u32>,
}

/// The dispatch engine
///
/// Owns the stores it mutates; settings are passed in per call rather
/// than held, so a settings change between turns takes effect
/// immediately and nothing reads ambient global state.
pub struct ChatEngine {
    config: Config,
    personas: PersonaStore,
    sessions: SessionStore,
    quota: DailyQuota,
    in_flight: Mutex<HashSet<String>>,
}

/// Removes a session from the in-flight set when a turn resolves
struct FlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    session_id: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.session_id);
        }
    }
}

impl ChatEngine {
    /// Create an engine over a storage handle
    pub fn new(config: Config, storage: Storage) -> Self {
        Self {
            config,
            personas: PersonaStore::new(storage.clone()),
            sessions: SessionStore::new(storage.clone()),
            quota: DailyQuota::new(storage),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// The persona store backing this engine
    pub fn personas(&self) -> &PersonaStore {
        &self.personas
    }

    /// The session store backing this engine
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The quota tracker backing this engine
    pub fn quota(&self) -> &DailyQuota {
        &self.quota
    }

    fn begin_flight(&self, session_id: &str) -> Result<FlightGuard<'_>> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| OtakuError::Storage("Poisoned in-flight lock".to_string()))?;
        if !set.insert(session_id.to_string()) {
            return Err(OtakuError::SessionBusy(session_id.to_string()).into());
        }
        Ok(FlightGuard {
            in_flight: &self.in_flight,
            session_id: session_id.to_string(),
        })
    }

    /// Send one user message to a persona and commit the exchange
    ///
    /// # Arguments
    ///
    /// * `settings` - Current user settings (provider, keys, models)
    /// * `persona_id` - Target persona; its session is created on demand
    /// * `text` - The user's message text
    ///
    /// # Errors
    ///
    /// Errors that fire *before* any session mutation or network call:
    ///
    /// * `MissingCredentials` - the selected provider needs a key
    /// * `QuotaExceeded` - the relayed free tier is exhausted for today
    /// * `NotFound` - the persona id references nothing
    /// * `SessionBusy` - a send is already in flight for this session
    ///
    /// Provider failures do NOT surface as errors: the user turn stays
    /// committed and a synthetic assistant message carrying the failure
    /// text is appended, with rate limits getting their own phrasing.
    pub async fn send_message(
        &self,
        settings: &Settings,
        persona_id: &str,
        text: &str,
    ) -> Result<TurnOutcome> {
        let persona = self
            .personas
            .get(persona_id)?
            .ok_or_else(|| OtakuError::NotFound(format!("persona {}", persona_id)))?;

        // Selecting the adapter is the credential gate: Gemini and HF
        // refuse to construct without a key, Groq falls back to relay.
        let provider = create_provider(settings, &self.config)?;

        let relayed = settings.uses_relay();
        if relayed && self.quota.is_exhausted()? {
            tracing::info!("Free-tier quota exhausted, blocking send");
            return Err(OtakuError::QuotaExceeded { limit: DAILY_LIMIT }.into());
        }

        let session = self.sessions.get_or_create(persona_id)?;
        let _guard = self.begin_flight(&session.id)?;

        // Optimistic append: the user turn is durable before the network
        // call begins.
        let user_avatar = Some(settings.user_avatar.clone()).filter(|a| !a.is_empty());
        let session = self
            .sessions
            .append_message(&session.id, ChatMessage::user(text, user_avatar))?;

        let persona_avatar = Some(persona.avatar.clone()).filter(|a| !a.is_empty());
        match provider
            .complete(&persona, &session.messages, &self.config.generation)
            .await
        {
            Ok(reply_text) => {
                let reply = ChatMessage::assistant(reply_text, persona_avatar);
                self.sessions.append_message(&session.id, reply.clone())?;

                let quota_count = if relayed {
                    Some(self.quota.increment()?)
                } else {
                    None
                };

                Ok(TurnOutcome {
                    session_id: session.id,
                    reply,
                    recovered_failure: false,
                    quota_count,
                })
            }
            Err(error) => {
                let rate_limited = error
                    .downcast_ref::<OtakuError>()
                    .map(OtakuError::is_rate_limit)
                    .unwrap_or(false);
                tracing::warn!(
                    "Provider {} failed (rate_limited={}): {}",
                    provider.name(),
                    rate_limited,
                    error
                );

                let content = if rate_limited {
                    RATE_LIMIT_COPY.to_string()
                } else {
                    format!("*[System Error]: {}*", error)
                };

                let reply = ChatMessage::assistant(content, None);
                self.sessions.append_message(&session.id, reply.clone())?;

                Ok(TurnOutcome {
                    session_id: session.id,
                    reply,
                    recovered_failure: true,
                    quota_count: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::quota::QuotaRecord;
    use crate::storage::keys;

    fn engine() -> (ChatEngine, Storage) {
        let storage = Storage::in_memory();
        (ChatEngine::new(Config::default(), storage.clone()), storage)
    }

    fn exhaust_quota(storage: &Storage) {
        let record = QuotaRecord {
            date: chrono::Local::now().date_naive().to_string(),
            count: DAILY_LIMIT,
        };
        storage.put_json(keys::DAILY_QUOTA, &record).unwrap();
    }

    #[tokio::test]
    async fn test_unknown_persona_is_not_found() {
        let (engine, _) = engine();
        let result = engine
            .send_message(&Settings::default(), "nobody", "hi")
            .await;

        let err = result.err().unwrap();
        let inner = err.downcast_ref::<OtakuError>().unwrap();
        assert!(matches!(inner, OtakuError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_credential_rejects_before_any_mutation() {
        let (engine, _) = engine();
        let mut settings = Settings::default();
        settings.provider = ProviderKind::Gemini;

        let result = engine.send_message(&settings, "goku", "hi").await;
        assert!(result.is_err());

        // No session was created, no message appended
        assert!(engine.sessions().find_by_persona("goku").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exhausted_quota_rejects_before_any_mutation() {
        let (engine, storage) = engine();
        exhaust_quota(&storage);

        let result = engine
            .send_message(&Settings::default(), "goku", "hi")
            .await;

        let err = result.err().unwrap();
        let inner = err.downcast_ref::<OtakuError>().unwrap();
        assert!(matches!(inner, OtakuError::QuotaExceeded { limit: 30 }));

        assert!(engine.sessions().find_by_persona("goku").unwrap().is_none());
        assert_eq!(engine.quota().current_count().unwrap(), DAILY_LIMIT);
    }

    #[tokio::test]
    async fn test_exhausted_quota_leaves_existing_session_untouched() {
        let (engine, storage) = engine();
        let session = engine.sessions().get_or_create("goku").unwrap();
        engine
            .sessions()
            .append_message(&session.id, ChatMessage::user("earlier", None))
            .unwrap();
        exhaust_quota(&storage);

        let result = engine
            .send_message(&Settings::default(), "goku", "hi")
            .await;
        assert!(result.is_err());

        let reloaded = engine.sessions().get(&session.id).unwrap().unwrap();
        assert_eq!(reloaded.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_is_recovered_into_conversation() {
        // Relay URL points at a closed port, so the call fails at the
        // transport level; the turn must still commit both messages.
        let (engine, _) = {
            let storage = Storage::in_memory();
            let mut config = Config::default();
            config.endpoints.relay_url = "http://127.0.0.1:1/api/chat".to_string();
            (ChatEngine::new(config, storage.clone()), storage)
        };

        let outcome = engine
            .send_message(&Settings::default(), "goku", "hi")
            .await
            .unwrap();

        assert!(outcome.recovered_failure);
        assert!(outcome.quota_count.is_none());
        assert!(outcome.reply.content.starts_with("*[System Error]"));

        let session = engine.sessions().get(&outcome.session_id).unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].content, "hi");
        // No quota increment on failure
        assert_eq!(engine.quota().current_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_second_send_after_failure_is_not_busy() {
        let (engine, _) = {
            let storage = Storage::in_memory();
            let mut config = Config::default();
            config.endpoints.relay_url = "http://127.0.0.1:1/api/chat".to_string();
            (ChatEngine::new(config, storage.clone()), storage)
        };

        let first = engine
            .send_message(&Settings::default(), "goku", "one")
            .await
            .unwrap();
        // The in-flight guard must have been released by the first turn
        let second = engine
            .send_message(&Settings::default(), "goku", "two")
            .await
            .unwrap();
        assert_eq!(first.session_id, second.session_id);
    }

    #[test]
    fn test_overlapping_flight_is_rejected() {
        let (engine, _) = engine();
        let guard = engine.begin_flight("session-1").unwrap();

        let second = engine.begin_flight("session-1");
        let err = second.err().unwrap();
        let inner = err.downcast_ref::<OtakuError>().unwrap();
        assert!(matches!(inner, OtakuError::SessionBusy(_)));

        // Other sessions are unaffected
        assert!(engine.begin_flight("session-2").is_ok());

        drop(guard);
        assert!(engine.begin_flight("session-1").is_ok());
    }
}
