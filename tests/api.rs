//! API endpoint integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use murmur_relay::db::{HistoryRepo, TurnRole};
use murmur_relay::llm::ChatClient;
use murmur_relay::voice::{SpeechToText, TextToSpeech};
use murmur_relay::{api, DbPool, PromptRegistry};
use tower::ServiceExt;

mod common;
use common::{setup_prompts, setup_test_db};

/// Build a test API router without external providers configured
fn build_test_router(db: DbPool, prompts: PromptRegistry) -> axum::Router {
    let state = Arc::new(api::ApiState {
        history: HistoryRepo::new(db),
        prompts,
        stt: None,
        tts: None,
        chat: None,
    });

    router_from_state(state)
}

/// Build a test API router with dummy provider credentials; requests
/// never reach the network in these tests
fn build_test_router_with_providers(db: DbPool, prompts: PromptRegistry) -> axum::Router {
    let state = Arc::new(api::ApiState {
        history: HistoryRepo::new(db),
        prompts,
        stt: Some(Arc::new(
            SpeechToText::new_deepgram("test-key".to_string(), "general".to_string()).unwrap(),
        )),
        tts: Some(Arc::new(
            TextToSpeech::new_deepgram("test-key".to_string(), "aura-asteria-en".to_string())
                .unwrap(),
        )),
        chat: Some(Arc::new(
            ChatClient::new("test-key".to_string(), "gpt-4o-mini".to_string()).unwrap(),
        )),
    });

    router_from_state(state)
}

fn router_from_state(state: Arc<api::ApiState>) -> axum::Router {
    axum::Router::new()
        .merge(api::voice::router(state.clone()))
        .merge(api::prompts::router(state.clone()))
        .merge(api::memory::router(state.clone()))
        .merge(api::tts::router(state))
        .merge(api::health::router())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, prompts) = setup_prompts();
    let app = build_test_router(setup_test_db(), prompts);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_prompts_lists_default() {
    let (_dir, prompts) = setup_prompts();
    let app = build_test_router(setup_test_db(), prompts);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/prompts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let names: Vec<&str> = json["prompts"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(names.contains(&"default"));
}

#[tokio::test]
async fn test_memory_fetch_empty() {
    let (_dir, prompts) = setup_prompts();
    let app = build_test_router(setup_test_db(), prompts);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/memory/alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["history"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_memory_fetch_shows_turns_in_order() {
    let db = setup_test_db();
    let repo = HistoryRepo::new(db.clone());
    repo.append_turn("alice", TurnRole::User, "what's the time?")
        .unwrap();
    repo.append_turn("alice", TurnRole::Assistant, "It's noon.")
        .unwrap();

    let (_dir, prompts) = setup_prompts();
    let app = build_test_router(db, prompts);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/memory/alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let history = json["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[0]["content"], "what's the time?");
    assert_eq!(history[1]["role"], "assistant");
    assert_eq!(history[1]["content"], "It's noon.");
}

#[tokio::test]
async fn test_memory_clear_requires_user_id() {
    let (_dir, prompts) = setup_prompts();
    let app = build_test_router(setup_test_db(), prompts);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/memory/clear")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_memory_clear_is_idempotent() {
    let db = setup_test_db();
    let repo = HistoryRepo::new(db.clone());
    repo.append_turn("alice", TurnRole::User, "remember me")
        .unwrap();

    let (_dir, prompts) = setup_prompts();
    let app = build_test_router(db.clone(), prompts);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/memory/clear")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"userId":"alice"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["ok"], true);
    }

    assert_eq!(repo.turn_count("alice").unwrap(), 0);
}

#[tokio::test]
async fn test_voice_unconfigured_returns_503() {
    let (_dir, prompts) = setup_prompts();
    let app = build_test_router(setup_test_db(), prompts);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/voice")
                .header(
                    header::CONTENT_TYPE,
                    "multipart/form-data; boundary=test-boundary",
                )
                .body(Body::from("--test-boundary--\r\n"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "not_configured");
}

#[tokio::test]
async fn test_voice_missing_audio_is_bad_request() {
    let (_dir, prompts) = setup_prompts();
    let app = build_test_router_with_providers(setup_test_db(), prompts);

    // Multipart body carrying only a userId field, no audio part
    let body = concat!(
        "--test-boundary\r\n",
        "Content-Disposition: form-data; name=\"userId\"\r\n",
        "\r\n",
        "alice\r\n",
        "--test-boundary--\r\n",
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/voice")
                .header(
                    header::CONTENT_TYPE,
                    "multipart/form-data; boundary=test-boundary",
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "bad_request");
    assert_eq!(json["error"]["message"], "audio file missing");
}

#[tokio::test]
async fn test_voice_empty_audio_is_bad_request() {
    let (_dir, prompts) = setup_prompts();
    let app = build_test_router_with_providers(setup_test_db(), prompts);

    // An audio part with zero bytes counts as missing
    let body = concat!(
        "--test-boundary\r\n",
        "Content-Disposition: form-data; name=\"audio\"; filename=\"utt.wav\"\r\n",
        "Content-Type: audio/wav\r\n",
        "\r\n",
        "\r\n",
        "--test-boundary--\r\n",
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/voice")
                .header(
                    header::CONTENT_TYPE,
                    "multipart/form-data; boundary=test-boundary",
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tts_unconfigured_returns_503() {
    let (_dir, prompts) = setup_prompts();
    let app = build_test_router(setup_test_db(), prompts);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/tts?text=hello")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "not_configured");
}

#[tokio::test]
async fn test_history_round_trip_through_repo_and_api() {
    // Simulates the post-exchange state: the pipeline appended the
    // user transcript then the assistant reply; a re-fetch shows both
    // in order
    let db = setup_test_db();
    let repo = HistoryRepo::new(db.clone());
    repo.append_turn("bob", TurnRole::User, "tell me a joke")
        .unwrap();
    repo.append_turn("bob", TurnRole::Assistant, "Why did the crab cross the road?")
        .unwrap();
    repo.append_turn("bob", TurnRole::User, "why?").unwrap();
    repo.append_turn("bob", TurnRole::Assistant, "To get to the other tide.")
        .unwrap();

    let (_dir, prompts) = setup_prompts();
    let app = build_test_router(db, prompts);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/memory/bob")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let json = body_json(response).await;
    let history = json["history"].as_array().unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[2]["content"], "why?");
    assert_eq!(history[3]["role"], "assistant");
}
