//! Dispatch engine integration tests
//!
//! Exercises the per-turn state machine against mock provider servers:
//! quota enforcement on the relayed path, optimistic appends, recovered
//! failures, and the direct-key paths that bypass the quota entirely.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use otakuverse::config::{Config, ProviderKind, Settings};
use otakuverse::engine::ChatEngine;
use otakuverse::quota::{QuotaRecord, DAILY_LIMIT};
use otakuverse::storage::{keys, Storage};
use otakuverse::OtakuError;

fn engine_with_relay(relay_base: &str) -> (ChatEngine, Storage) {
    let storage = Storage::in_memory();
    let mut config = Config::default();
    config.endpoints.relay_url = format!("{}/api/chat", relay_base);
    (ChatEngine::new(config, storage.clone()), storage)
}

fn seed_quota(storage: &Storage, count: u32) {
    let record = QuotaRecord {
        date: chrono::Local::now().date_naive().to_string(),
        count,
    };
    storage.put_json(keys::DAILY_QUOTA, &record).unwrap();
}

fn completion_body(text: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "choices": [{"message": {"role": "assistant", "content": text}}]
    })
}

/// The 29th free message succeeds, lands both turns, and exhausts the tier
#[tokio::test]
async fn test_relayed_send_at_count_29_reaches_the_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3-8b-8192"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hey! Wanna spar?")))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, storage) = engine_with_relay(&server.uri());
    seed_quota(&storage, 29);

    let outcome = engine
        .send_message(&Settings::default(), "goku", "hi")
        .await
        .unwrap();

    assert!(!outcome.recovered_failure);
    assert_eq!(outcome.reply.content, "Hey! Wanna spar?");
    assert_eq!(outcome.quota_count, Some(30));

    let session = engine.sessions().get(&outcome.session_id).unwrap().unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].content, "hi");
    assert_eq!(session.messages[1].content, "Hey! Wanna spar?");

    assert_eq!(engine.quota().current_count().unwrap(), DAILY_LIMIT);
    assert!(engine.quota().is_exhausted().unwrap());
}

/// At the limit with no personal key the send is rejected before any
/// append or network call
#[tokio::test]
async fn test_exhausted_quota_blocks_send_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("nope")))
        .expect(0)
        .mount(&server)
        .await;

    let (engine, storage) = engine_with_relay(&server.uri());
    seed_quota(&storage, DAILY_LIMIT);

    // Pre-existing session to check its length is untouched
    let session = engine.sessions().get_or_create("goku").unwrap();

    let result = engine
        .send_message(&Settings::default(), "goku", "hi")
        .await;
    let err = result.err().unwrap();
    assert!(matches!(
        err.downcast_ref::<OtakuError>().unwrap(),
        OtakuError::QuotaExceeded { limit: 30 }
    ));

    let reloaded = engine.sessions().get(&session.id).unwrap().unwrap();
    assert!(reloaded.messages.is_empty());
    // The expect(0) on the mock is verified when the server drops
}

/// A rate-limited provider failure appends exactly one assistant message
/// with the rate-limit phrasing and never increments the quota
#[tokio::test]
async fn test_rate_limit_gets_distinct_copy_and_no_increment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached for the shared key"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, storage) = engine_with_relay(&server.uri());
    seed_quota(&storage, 5);

    let outcome = engine
        .send_message(&Settings::default(), "goku", "hi")
        .await
        .unwrap();

    assert!(outcome.recovered_failure);
    assert!(outcome.quota_count.is_none());
    assert!(outcome.reply.content.contains("free tier is busy"));

    let session = engine.sessions().get(&outcome.session_id).unwrap().unwrap();
    assert_eq!(session.messages.len(), 2);

    // Failure never counts against the quota
    assert_eq!(engine.quota().current_count().unwrap(), 5);
}

/// A non-rate-limit provider failure is recovered with generic copy
#[tokio::test]
async fn test_provider_error_is_recovered_with_generic_copy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "upstream exploded"}
        })))
        .mount(&server)
        .await;

    let (engine, _) = engine_with_relay(&server.uri());

    let outcome = engine
        .send_message(&Settings::default(), "goku", "hi")
        .await
        .unwrap();

    assert!(outcome.recovered_failure);
    assert!(outcome.reply.content.starts_with("*[System Error]"));
    assert!(outcome.reply.content.contains("upstream exploded"));
}

/// A personal Groq key goes direct to the vendor with a bearer token and
/// never touches the quota, regardless of the stored count
#[tokio::test]
async fn test_direct_groq_key_bypasses_quota_and_relay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer gsk_personal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Direct hit!")))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Storage::in_memory();
    let mut config = Config::default();
    config.endpoints.groq_api_base = server.uri();
    // Relay URL points nowhere reachable; the direct path must not use it
    config.endpoints.relay_url = "http://127.0.0.1:1/api/chat".to_string();
    let engine = ChatEngine::new(config, storage.clone());
    seed_quota(&storage, DAILY_LIMIT);

    let mut settings = Settings::default();
    settings.groq_key = Some("gsk_personal".to_string());

    let outcome = engine
        .send_message(&settings, "goku", "hi")
        .await
        .unwrap();

    assert_eq!(outcome.reply.content, "Direct hit!");
    assert!(outcome.quota_count.is_none());
    assert_eq!(engine.quota().current_count().unwrap(), DAILY_LIMIT);
}

/// The Gemini direct path translates to the vendor shape and bypasses
/// the quota
#[tokio::test]
async fn test_gemini_direct_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(body_partial_json(json!({
            "generationConfig": {"temperature": 0.9, "maxOutputTokens": 250}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "Hmph. Fine."}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Storage::in_memory();
    let mut config = Config::default();
    config.endpoints.gemini_api_base = server.uri();
    let engine = ChatEngine::new(config, storage.clone());
    seed_quota(&storage, 12);

    let mut settings = Settings::default();
    settings.provider = ProviderKind::Gemini;
    settings.gemini_key = Some("AIza-test".to_string());

    let outcome = engine
        .send_message(&settings, "levi", "clean this room")
        .await
        .unwrap();

    assert_eq!(outcome.reply.content, "Hmph. Fine.");
    assert!(outcome.quota_count.is_none());
    assert_eq!(engine.quota().current_count().unwrap(), 12);
}

/// The Hugging Face direct path renders the instruct template and parses
/// the array-shaped response
#[tokio::test]
async fn test_huggingface_direct_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/mistralai/Mistral-7B-Instruct-v0.2"))
        .and(header("authorization", "Bearer hf_test"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"generated_text": " Believe it!"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let storage = Storage::in_memory();
    let mut config = Config::default();
    config.endpoints.hf_api_base = server.uri();
    let engine = ChatEngine::new(config, storage);

    let mut settings = Settings::default();
    settings.provider = ProviderKind::HuggingFace;
    settings.hf_key = Some("hf_test".to_string());

    let outcome = engine
        .send_message(&settings, "naruto", "hey")
        .await
        .unwrap();
    assert_eq!(outcome.reply.content, "Believe it!");
}

/// Repeated sends reuse the same session and keep appending in order
#[tokio::test]
async fn test_sequential_turns_share_one_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Sure!")))
        .expect(2)
        .mount(&server)
        .await;

    let (engine, _) = engine_with_relay(&server.uri());
    let settings = Settings::default();

    let first = engine.send_message(&settings, "goku", "one").await.unwrap();
    let second = engine.send_message(&settings, "goku", "two").await.unwrap();

    assert_eq!(first.session_id, second.session_id);
    assert_eq!(first.quota_count, Some(1));
    assert_eq!(second.quota_count, Some(2));

    let session = engine.sessions().get(&second.session_id).unwrap().unwrap();
    let contents: Vec<&str> = session
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["one", "Sure!", "two", "Sure!"]);
}

/// The user avatar from settings rides on user messages, the persona
/// avatar on replies
#[tokio::test]
async fn test_avatars_are_attached_per_role() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Yo!")))
        .mount(&server)
        .await;

    let (engine, _) = engine_with_relay(&server.uri());
    let mut settings = Settings::default();
    settings.user_avatar = "https://example.com/me.png".to_string();

    let outcome = engine.send_message(&settings, "goku", "hi").await.unwrap();
    let session = engine.sessions().get(&outcome.session_id).unwrap().unwrap();

    assert_eq!(
        session.messages[0].avatar.as_deref(),
        Some("https://example.com/me.png")
    );
    // Built-in goku carries a glyph avatar
    assert_eq!(session.messages[1].avatar.as_deref(), Some("🐉"));
}
