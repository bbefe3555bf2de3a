pub mod api;
pub mod config;
pub mod curriculum;
pub mod database;
pub mod errors;
pub mod llm_providers;
pub mod llm_service;
pub mod logging;
pub mod model_fallback;
pub mod models;
pub mod security;
pub mod session_service;

pub use config::Config;
pub use database::Database;
pub use errors::*;
pub use llm_providers::{JsonResponseParser, LLMProvider, LLMProviderFactory, LLMProviderType};
pub use llm_service::{LLMService, TranscriptAnalyzer};
pub use model_fallback::ModelFallbackChain;
pub use models::*;
pub use session_service::SessionService;
