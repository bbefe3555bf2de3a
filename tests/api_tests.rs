mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::Arc;

use common::{content, service_for, spawn_mock_llm};
use misspoke::{Database, LLMService, SessionService, api::*};

async fn create_test_server_with(llm_service: LLMService) -> TestServer {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let session_service = SessionService::new(db, Arc::new(llm_service.clone()));
    let app_state = AppState {
        session_service,
        llm_service,
    };

    TestServer::new(create_router(app_state)).unwrap()
}

async fn create_test_server() -> TestServer {
    // No API key, so every model call degrades immediately
    create_test_server_with(LLMService::new(String::new(), None)).await
}

#[tokio::test]
async fn test_chat_requires_messages() {
    let server = create_test_server().await;

    let response = server.post("/api/chat").json(&json!({ "language": "Spanish" })).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_chat_rejects_messages_that_are_not_a_list() {
    let server = create_test_server().await;

    let response = server
        .post("/api/chat")
        .json(&json!({ "messages": "hi", "language": "Spanish" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["success"], false);
}

#[tokio::test]
async fn test_chat_accepts_unknown_turn_types() {
    let (base_url, mock) = spawn_mock_llm(vec![("tutor", content("Vale"))]).await;
    let server = create_test_server_with(service_for(&base_url, &["tutor"])).await;

    let response = server
        .post("/api/chat")
        .json(&json!({
            "messages": [
                { "type": "system", "content": "Greeting shown" },
                { "type": "user", "content": "Hola" }
            ],
            "language": "Spanish"
        }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["content"], "Vale");

    let sent = mock.last_request().unwrap();
    assert_eq!(sent["messages"][1]["role"], "assistant");
    assert_eq!(sent["messages"][2]["role"], "user");
}

#[tokio::test]
async fn test_chat_without_models_is_unavailable() {
    let server = create_test_server().await;

    let response = server
        .post("/api/chat")
        .json(&json!({
            "messages": [{ "type": "user", "content": "Hola" }],
            "language": "Spanish",
            "personality": "Cheerful",
            "topic": "Ordering Coffee",
            "level": "Beginner"
        }))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["error"], "Failed to generate response");
}

#[tokio::test]
async fn test_chat_returns_model_reply() {
    let (base_url, _mock) = spawn_mock_llm(vec![("tutor", content("¡Hola! ¿Qué tal?"))]).await;
    let server = create_test_server_with(service_for(&base_url, &["tutor"])).await;

    let response = server
        .post("/api/chat")
        .json(&json!({
            "messages": [{ "type": "user", "content": "Hola" }],
            "language": "Spanish"
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["content"], "¡Hola! ¿Qué tal?");
}

#[tokio::test]
async fn test_translate_validation() {
    let server = create_test_server().await;

    let response = server
        .post("/api/translate")
        .json(&json!({ "targetLanguage": "French" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/translate")
        .json(&json!({ "text": "Hello", "targetLanguage": "Detect" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.post("/api/translate").json(&json!({ "text": "Hello" })).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_translate_failure_is_unavailable() {
    let server = create_test_server().await;

    let response = server
        .post("/api/translate")
        .json(&json!({ "text": "Hello", "targetLanguage": "French" }))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_summary_requires_transcript_and_tolerates_failure() {
    let server = create_test_server().await;

    let response = server.post("/api/summary").json(&json!({})).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/summary")
        .json(&json!({ "transcript": "USER: Hola\nAI: ¡Hola!" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_prompt_falls_back_to_static_prompt() {
    let server = create_test_server().await;

    let response = server.post("/api/prompt").json(&json!({ "topic": "Travel" })).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/prompt")
        .json(&json!({ "language": "German", "personality": "calm", "topic": "Travel" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["systemPrompt"], "You are a calm German tutor. Teach Travel.");
    assert_eq!(body["data"]["firstMessage"], "Hello! Let's learn German.");
}

#[tokio::test]
async fn test_translate_ui_always_succeeds() {
    let server = create_test_server().await;

    let response = server
        .post("/api/translate-ui")
        .json(&json!({ "targetLanguage": "Japanese" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["join"], "Join Call");
    assert_eq!(body["data"].as_object().unwrap().len(), 14);

    let response = server.post("/api/translate-ui").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["practice"], "Conversation Practice");
}

#[tokio::test]
async fn test_catalog_routes() {
    let server = create_test_server().await;

    let response = server.get("/api/personalities").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 8);
    assert_eq!(body["data"][0]["id"], "cheerful");

    let response = server.get("/api/personalities/calm").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["subtitle"], "Zen & Slow");

    server
        .get("/api/personalities/grumpy")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let response = server.get("/api/curriculum/French").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["topic"], "Ordering Coffee in French");
    assert_eq!(body["data"]["items"][2]["status"], "in-progress");

    let response = server.get("/api/curriculum/klingon").await;
    let body: Value = response.json();
    assert_eq!(body["data"]["language"], "default");
}

#[tokio::test]
async fn test_progress_roundtrip() {
    let server = create_test_server().await;

    let response = server.get("/api/progress/spanish").await;
    response.assert_status_ok();
    assert!(response.json::<Value>()["data"].is_null());

    let response = server
        .put("/api/progress/spanish")
        .json(&json!({
            "items": [
                { "id": "greetings", "status": "completed" },
                { "id": "introductions", "status": "in-progress" }
            ]
        }))
        .await;
    response.assert_status_ok();

    let response = server.get("/api/progress/spanish").await;
    let body: Value = response.json();
    assert_eq!(body["data"]["lang"], "spanish");
    assert_eq!(body["data"]["items"][1]["status"], "in-progress");
    assert!(body["data"]["last_updated"].is_string());
}

#[tokio::test]
async fn test_session_lifecycle() {
    let server = create_test_server().await;

    let response = server
        .post("/api/sessions/end")
        .json(&json!({ "messages": [], "language": "spanish", "personality_id": "cheerful" }))
        .await;
    response.assert_status_ok();
    assert!(response.json::<Value>()["data"].is_null());

    let response = server
        .post("/api/sessions/end")
        .json(&json!({
            "messages": [
                { "role": "ai", "content": "¡Hola!", "timestamp": "2024-03-05T10:00:00Z" },
                { "role": "user", "content": "Hola", "timestamp": "2024-03-05T10:00:05Z", "confidence": 0.9 }
            ],
            "language": "spanish",
            "personality_id": "cheerful"
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["start_time"], "2024-03-05T10:00:00Z");
    assert_eq!(body["data"]["avg_confidence"], 0.9);

    let response = server.get(&format!("/api/sessions/{}", id)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["messages"].as_array().unwrap().len(), 2);

    let response = server.get("/api/sessions").await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 1);

    let response = server.get("/api/sessions/latest/spanish").await;
    assert_eq!(response.json::<Value>()["data"]["id"], id.as_str());

    let response = server.get("/api/sessions/latest/french").await;
    assert!(response.json::<Value>()["data"].is_null());

    let response = server.get("/api/profile").await;
    let body: Value = response.json();
    assert_eq!(body["data"]["total_sessions"], 1);
    assert_eq!(body["data"]["streak_days"], 1);
}

#[tokio::test]
async fn test_get_missing_session_is_not_found() {
    let server = create_test_server().await;

    let response = server.get("/api/sessions/does-not-exist").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_update_merges_onto_default() {
    let server = create_test_server().await;

    let response = server.get("/api/profile").await;
    assert!(response.json::<Value>()["data"].is_null());

    let response = server
        .put("/api/profile")
        .json(&json!({ "current_level": "Intermediate" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["id"], "default");
    assert_eq!(body["data"]["current_level"], "Intermediate");
    assert_eq!(body["data"]["total_sessions"], 0);
}

#[tokio::test]
async fn test_user_registration_and_login() {
    let server = create_test_server().await;

    let register = json!({
        "email": "ana@example.com",
        "password": "s3cret-pass",
        "name": "Ana",
        "native_language": "English",
        "learning_language": "Spanish"
    });

    let response = server.post("/api/users").json(&register).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["email"], "ana@example.com");
    assert!(body["data"].get("password_hash").is_none());

    let response = server.post("/api/users").json(&register).await;
    response.assert_status(StatusCode::CONFLICT);

    let response = server
        .post("/api/users/login")
        .json(&json!({ "email": "ana@example.com", "password": "s3cret-pass" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["name"], "Ana");

    let response = server
        .post("/api/users/login")
        .json(&json!({ "email": "ana@example.com", "password": "wrong" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/users/login")
        .json(&json!({ "email": "nobody@example.com", "password": "whatever" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_registered_email_is_trimmed() {
    let server = create_test_server().await;

    let response = server
        .post("/api/users")
        .json(&json!({ "email": "  ana@example.com ", "password": "s3cret-pass", "name": "Ana" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["email"], "ana@example.com");

    server.get("/api/users/ana@example.com").await.assert_status_ok();

    let response = server
        .post("/api/users/login")
        .json(&json!({ "email": "ana@example.com", "password": "s3cret-pass" }))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_user_validation_and_updates() {
    let server = create_test_server().await;

    let response = server
        .post("/api/users")
        .json(&json!({ "email": "not-an-email", "name": "X" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/api/users")
        .json(&json!({ "email": "li@example.com", "name": "Li" }))
        .await
        .assert_status_ok();

    let response = server
        .put("/api/users/li@example.com")
        .json(&json!({ "learning_language": "Japanese" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["learning_language"], "Japanese");
    assert_eq!(body["data"]["name"], "Li");

    let response = server.get("/api/users/li@example.com").await;
    response.assert_status_ok();

    let response = server.get("/api/users/ghost@example.com").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .put("/api/users/ghost@example.com")
        .json(&json!({ "name": "Ghost" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}
