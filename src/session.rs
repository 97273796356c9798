//! Conversation sessions and message history
//!
//! A session is one persistent conversation thread bound to exactly one
//! persona. Message logs are append-only: messages are never edited,
//! reordered, or removed once committed.

use crate::error::{OtakuError, Result};
use crate::storage::{keys, Storage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Message author role
///
/// Two variants only; the legacy `"model"` role string some providers
/// emit is accepted as an alias of `Assistant` when history is loaded,
/// so old logs replay identically. Adapters translate to vendor-specific
/// vocabulary at their own edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The human participant
    User,
    /// The character reply (legacy synonym: "model")
    #[serde(alias = "model")]
    Assistant,
}

/// A single conversation message
///
/// Immutable once appended to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Opaque identifier (ULID); distinct across both ends of one exchange
    pub id: String,
    /// Author role
    pub role: ChatRole,
    /// Message text
    pub content: String,
    /// Optional avatar override (URL or glyph)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl ChatMessage {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use otakuverse::session::{ChatMessage, ChatRole};
    ///
    /// let msg = ChatMessage::user("Hello!", None);
    /// assert_eq!(msg.role, ChatRole::User);
    /// ```
    pub fn user(content: impl Into<String>, avatar: Option<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            role: ChatRole::User,
            content: content.into(),
            avatar,
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>, avatar: Option<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            role: ChatRole::Assistant,
            content: content.into(),
            avatar,
        }
    }
}

/// One conversation thread bound to a persona
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Session identifier (ULID)
    pub id: String,
    /// Identifier of the persona this session targets
    pub persona_id: String,
    /// Append-only message log in conversation order
    pub messages: Vec<ChatMessage>,
    /// Timestamp of the most recent user turn (RFC-3339 on the wire)
    pub last_message_at: DateTime<Utc>,
}

impl ChatSession {
    fn new(persona_id: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            persona_id: persona_id.into(),
            messages: Vec::new(),
            last_message_at: Utc::now(),
        }
    }
}

/// Persistent store of conversation sessions
///
/// Sessions are held as one JSON array under the `sessions` key, with a
/// separate `active_session` pointer. At most one session exists per
/// persona; [`SessionStore::get_or_create`] is idempotent by persona id.
#[derive(Clone)]
pub struct SessionStore {
    storage: Storage,
}

impl SessionStore {
    /// Create a store over the shared storage handle
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    fn load(&self) -> Result<Vec<ChatSession>> {
        Ok(self
            .storage
            .get_json(keys::SESSIONS)?
            .unwrap_or_default())
    }

    fn save(&self, sessions: &[ChatSession]) -> Result<()> {
        self.storage.put_json(keys::SESSIONS, &sessions)
    }

    /// List all sessions, most recently active first
    pub fn list(&self) -> Result<Vec<ChatSession>> {
        let mut sessions = self.load()?;
        sessions.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(sessions)
    }

    /// Find the session targeting a persona, if one exists
    pub fn find_by_persona(&self, persona_id: &str) -> Result<Option<ChatSession>> {
        Ok(self
            .load()?
            .into_iter()
            .find(|s| s.persona_id == persona_id))
    }

    /// Fetch a session by its identifier
    pub fn get(&self, session_id: &str) -> Result<Option<ChatSession>> {
        Ok(self.load()?.into_iter().find(|s| s.id == session_id))
    }

    /// Return the existing session for a persona or create an empty one
    ///
    /// Re-initiating a chat with the same persona reuses the existing
    /// session rather than creating a duplicate. A newly created session
    /// becomes the active one.
    ///
    /// # Examples
    ///
    /// ```
    /// use otakuverse::session::SessionStore;
    /// use otakuverse::storage::Storage;
    ///
    /// # fn main() -> otakuverse::error::Result<()> {
    /// let store = SessionStore::new(Storage::in_memory());
    /// let first = store.get_or_create("goku")?;
    /// let second = store.get_or_create("goku")?;
    /// assert_eq!(first.id, second.id);
    /// # Ok(())
    /// # }
    /// ```
    pub fn get_or_create(&self, persona_id: &str) -> Result<ChatSession> {
        if let Some(existing) = self.find_by_persona(persona_id)? {
            return Ok(existing);
        }

        let session = ChatSession::new(persona_id);
        let mut sessions = self.load()?;
        sessions.push(session.clone());
        self.save(&sessions)?;
        self.set_active(Some(&session.id))?;
        tracing::debug!(
            "Created session {} for persona {}",
            session.id,
            persona_id
        );
        Ok(session)
    }

    /// Append a message to a session's log
    ///
    /// The last-activity timestamp is bumped only for user-authored
    /// messages; assistant replies extend the log without affecting the
    /// freshness ordering.
    ///
    /// # Errors
    ///
    /// Returns `OtakuError::NotFound` if the session id is unknown.
    pub fn append_message(&self, session_id: &str, message: ChatMessage) -> Result<ChatSession> {
        let mut sessions = self.load()?;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| OtakuError::NotFound(format!("session {}", session_id)))?;

        if message.role == ChatRole::User {
            session.last_message_at = Utc::now();
        }
        session.messages.push(message);

        let updated = session.clone();
        self.save(&sessions)?;
        Ok(updated)
    }

    /// Delete a session
    ///
    /// Clears the active-session pointer when it targeted the deleted
    /// session. Deleting an unknown id is a no-op.
    pub fn delete(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.load()?;
        sessions.retain(|s| s.id != session_id);
        self.save(&sessions)?;

        if self.active_session()?.as_deref() == Some(session_id) {
            self.set_active(None)?;
        }
        Ok(())
    }

    /// The currently active session id, if any
    pub fn active_session(&self) -> Result<Option<String>> {
        self.storage.get_string(keys::ACTIVE_SESSION)
    }

    /// Update (or clear) the active-session pointer
    pub fn set_active(&self, session_id: Option<&str>) -> Result<()> {
        match session_id {
            Some(id) => self.storage.put_string(keys::ACTIVE_SESSION, id),
            None => self.storage.remove(keys::ACTIVE_SESSION),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Storage::in_memory())
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ChatRole::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&ChatRole::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_legacy_model_role_is_assistant() {
        let role: ChatRole = serde_json::from_str("\"model\"").unwrap();
        assert_eq!(role, ChatRole::Assistant);
    }

    #[test]
    fn test_message_ids_are_distinct_within_one_exchange() {
        let user = ChatMessage::user("hi", None);
        let reply = ChatMessage::assistant("hello", None);
        assert_ne!(user.id, reply.id);
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = store();
        let first = store.get_or_create("goku").unwrap();
        let second = store.get_or_create("goku").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_one_session_per_persona() {
        let store = store();
        store.get_or_create("goku").unwrap();
        store.get_or_create("naruto").unwrap();
        store.get_or_create("goku").unwrap();
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_new_session_becomes_active() {
        let store = store();
        let session = store.get_or_create("goku").unwrap();
        assert_eq!(store.active_session().unwrap(), Some(session.id));
    }

    #[test]
    fn test_existing_session_does_not_steal_active_pointer() {
        let store = store();
        store.get_or_create("goku").unwrap();
        let naruto = store.get_or_create("naruto").unwrap();
        // Reopening goku's existing session leaves the pointer on naruto
        store.get_or_create("goku").unwrap();
        assert_eq!(store.active_session().unwrap(), Some(naruto.id));
    }

    #[test]
    fn test_append_is_append_only() {
        let store = store();
        let session = store.get_or_create("goku").unwrap();

        let mut lengths = Vec::new();
        for i in 0..4 {
            let updated = store
                .append_message(&session.id, ChatMessage::user(format!("msg {}", i), None))
                .unwrap();
            lengths.push(updated.messages.len());
        }
        // Log length is non-decreasing over the session's lifetime
        assert_eq!(lengths, vec![1, 2, 3, 4]);

        let reloaded = store.get(&session.id).unwrap().unwrap();
        let contents: Vec<&str> = reloaded
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["msg 0", "msg 1", "msg 2", "msg 3"]);
    }

    #[test]
    fn test_append_unknown_session_is_not_found() {
        let store = store();
        let result = store.append_message("nope", ChatMessage::user("hi", None));
        assert!(result.is_err());
        let err = result.unwrap_err();
        let inner = err.downcast_ref::<OtakuError>().unwrap();
        assert!(matches!(inner, OtakuError::NotFound(_)));
    }

    #[test]
    fn test_user_message_bumps_last_activity() {
        let store = store();
        let session = store.get_or_create("goku").unwrap();
        let before = store.get(&session.id).unwrap().unwrap().last_message_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .append_message(&session.id, ChatMessage::user("hi", None))
            .unwrap();
        let after = store.get(&session.id).unwrap().unwrap().last_message_at;
        assert!(after > before);
    }

    #[test]
    fn test_assistant_message_does_not_bump_last_activity() {
        let store = store();
        let session = store.get_or_create("goku").unwrap();
        let before = store.get(&session.id).unwrap().unwrap().last_message_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .append_message(&session.id, ChatMessage::assistant("yo", None))
            .unwrap();
        let after = store.get(&session.id).unwrap().unwrap().last_message_at;
        assert_eq!(after, before);
    }

    #[test]
    fn test_delete_clears_active_pointer() {
        let store = store();
        let session = store.get_or_create("goku").unwrap();
        assert_eq!(store.active_session().unwrap(), Some(session.id.clone()));

        store.delete(&session.id).unwrap();
        assert!(store.active_session().unwrap().is_none());
        assert!(store.get(&session.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_other_session_keeps_pointer() {
        let store = store();
        let goku = store.get_or_create("goku").unwrap();
        let naruto = store.get_or_create("naruto").unwrap();

        store.delete(&goku.id).unwrap();
        assert_eq!(store.active_session().unwrap(), Some(naruto.id));
    }

    #[test]
    fn test_list_orders_by_recent_user_activity() {
        let store = store();
        let goku = store.get_or_create("goku").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let naruto = store.get_or_create("naruto").unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .append_message(&goku.id, ChatMessage::user("kamehameha", None))
            .unwrap();

        let ids: Vec<String> = store.list().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![goku.id, naruto.id]);
    }

    #[test]
    fn test_session_rehydrates_from_json_with_legacy_roles() {
        let storage = Storage::in_memory();
        let raw = serde_json::json!([{
            "id": "01ARZ3NDEKTSV4RRFFQ69G5FAV",
            "persona_id": "goku",
            "messages": [
                {"id": "1", "role": "user", "content": "hi"},
                {"id": "2", "role": "model", "content": "Kakarot here."}
            ],
            "last_message_at": "2024-05-01T12:00:00Z"
        }]);
        storage.put_json(keys::SESSIONS, &raw).unwrap();

        let store = SessionStore::new(storage);
        let session = store.find_by_persona("goku").unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].role, ChatRole::Assistant);
    }
}
