#![allow(dead_code)]

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use misspoke::{LLMProviderType, LLMService};

/// What the mock answers for a given model
#[derive(Clone)]
pub enum MockReply {
    Content(String),
    Status(u16),
}

#[derive(Default)]
pub struct MockState {
    replies: HashMap<String, MockReply>,
    requests: Mutex<Vec<Value>>,
}

impl MockState {
    /// Models in the order they were requested
    pub fn requested_models(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|body| body["model"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn last_request(&self) -> Option<Value> {
        self.requests.lock().unwrap().last().cloned()
    }
}

async fn chat_completions(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let model = body["model"].as_str().unwrap_or_default().to_string();
    state.requests.lock().unwrap().push(body);

    match state.replies.get(&model) {
        Some(MockReply::Content(content)) => Json(json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }],
            "model": model,
            "usage": { "total_tokens": 42 }
        }))
        .into_response(),
        Some(MockReply::Status(code)) => {
            let status = StatusCode::from_u16(*code).unwrap();
            (status, "mock failure").into_response()
        }
        None => (StatusCode::NOT_FOUND, "unknown model").into_response(),
    }
}

/// Serve an OpenAI-compatible endpoint on an ephemeral port
pub async fn spawn_mock_llm(replies: Vec<(&str, MockReply)>) -> (String, Arc<MockState>) {
    let state = Arc::new(MockState {
        replies: replies
            .into_iter()
            .map(|(model, reply)| (model.to_string(), reply))
            .collect(),
        requests: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/chat/completions", post(chat_completions))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

pub fn content(text: &str) -> MockReply {
    MockReply::Content(text.to_string())
}

/// Service pointed at the mock with an explicit model order
pub fn service_for(base_url: &str, models: &[&str]) -> LLMService {
    LLMService::new_with_provider(
        "test-key".to_string(),
        Some(base_url.to_string()),
        LLMProviderType::OpenRouter,
        Some(models.iter().map(|m| m.to_string()).collect()),
    )
}
