//! Ordered multi-model fallback over a single provider.
//!
//! Each model in the list gets exactly one request. Any failure (transport
//! error, non-2xx status including 429, empty content) moves straight on to the
//! next model with no retry or delay. The first non-empty completion wins.
//! When every model fails the caller receives `None` and picks its own static
//! fallback.

use std::time::Instant;

use crate::llm_providers::{ChatMessage, LLMProvider, LlmError};
use crate::log_llm_operation;

#[derive(Debug, Clone)]
pub struct ModelFallbackChain {
    provider: LLMProvider,
    models: Vec<String>,
}

impl ModelFallbackChain {
    pub fn new(provider: LLMProvider, models: Vec<String>) -> Self {
        Self { provider, models }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Complete a bare prompt sent as a single user message
    pub async fn generate_content_safe(&self, prompt: &str) -> Option<String> {
        self.generate_with_messages_safe(&[ChatMessage::user(prompt)]).await
    }

    /// Complete a role-tagged conversation, trying each model in order
    pub async fn generate_with_messages_safe(&self, messages: &[ChatMessage]) -> Option<String> {
        let provider = self.provider.provider_name();

        if !self.provider.has_api_key() {
            tracing::error!(
                component = "llm_service",
                provider = provider,
                "LLM API key is not set; skipping all models"
            );
            return None;
        }

        for model in &self.models {
            log_llm_operation!(attempt, provider = provider, model = model, message_count = messages.len());
            let started = Instant::now();

            match self.provider.complete(model, messages).await {
                Ok(completion) => {
                    log_llm_operation!(
                        success,
                        provider = provider,
                        model = completion.model,
                        duration_ms = started.elapsed().as_millis() as u64,
                        response_length = completion.content.len()
                    );
                    return Some(completion.content);
                }
                Err(LlmError::RateLimited(body)) => {
                    tracing::warn!(
                        component = "llm_service",
                        provider = provider,
                        model = %model,
                        body = %body,
                        "Rate limited, trying next model"
                    );
                }
                Err(e) => {
                    log_llm_operation!(failed, provider = provider, model = model, error = e);
                }
            }
        }

        log_llm_operation!(exhausted, provider = provider, attempts = self.models.len());
        None
    }
}
