use anyhow::Result;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Common message structure for chat-completion requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Why a single model attempt produced no usable completion
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion had no content")]
    EmptyContent,
}

/// A successful completion and the model that actually served it
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub model: String,
}

/// Enum-based provider so the service stays `Clone` without boxing
#[derive(Debug, Clone)]
pub enum LLMProvider {
    OpenRouter(OpenRouterProvider),
    Gemini(GeminiProvider),
}

impl LLMProvider {
    /// Issue exactly one completion request against `model`
    pub async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<Completion, LlmError> {
        match self {
            LLMProvider::OpenRouter(provider) => provider.complete(model, messages).await,
            LLMProvider::Gemini(provider) => provider.complete(model, messages).await,
        }
    }

    /// Get the provider name for logging
    pub fn provider_name(&self) -> &'static str {
        match self {
            LLMProvider::OpenRouter(provider) => provider.provider_name(),
            LLMProvider::Gemini(provider) => provider.provider_name(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        match self {
            LLMProvider::OpenRouter(provider) => !provider.api_key.is_empty(),
            LLMProvider::Gemini(provider) => !provider.api_key.is_empty(),
        }
    }
}

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// OpenAI-compatible chat completions endpoint, OpenRouter by default
#[derive(Debug, Clone)]
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
    site_url: String,
    app_title: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
    model: Option<String>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenUsage {
    total_tokens: Option<u64>,
}

impl OpenRouterProvider {
    pub fn new(api_key: String, base_url: Option<String>, site_url: String, app_title: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| OPENROUTER_BASE_URL.to_string()),
            site_url,
            app_title,
        }
    }

    pub async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<Completion, LlmError> {
        let request_body = ChatCompletionRequest { model, messages };

        debug!(
            provider = self.provider_name(),
            model = %model,
            base_url = %self.base_url,
            message_count = messages.len(),
            "Making LLM request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", &self.app_title)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(status, error_text));
        }

        let body: ChatCompletionResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyContent)?;

        if let Some(usage) = body.usage {
            debug!(
                provider = self.provider_name(),
                model = %model,
                tokens_used = ?usage.total_tokens,
                "Token usage"
            );
        }

        Ok(Completion {
            content,
            model: body.model.unwrap_or_else(|| model.to_string()),
        })
    }

    pub fn provider_name(&self) -> &'static str {
        "OpenRouter"
    }
}

/// Gemini provider implementation
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "topK")]
    top_k: i32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i32,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
        }
    }

    pub async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<Completion, LlmError> {
        // Gemini has no chat roles here; fold the conversation into one prompt
        let full_prompt = messages
            .iter()
            .map(|m| match m.role.as_str() {
                "user" => m.content.clone(),
                role => format!("[{}]\n{}", role, m.content),
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: full_prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.7,
                top_k: 40,
                top_p: 0.9,
                max_output_tokens: 2048,
            },
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        debug!(
            provider = self.provider_name(),
            model = %model,
            base_url = %self.base_url,
            message_count = messages.len(),
            "Making LLM request"
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(status, error_text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let content = gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .map(|part| part.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyContent)?;

        Ok(Completion {
            content,
            model: model.to_string(),
        })
    }

    pub fn provider_name(&self) -> &'static str {
        "Gemini"
    }
}

fn status_error(status: StatusCode, body: String) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited(body)
    } else {
        LlmError::Status {
            status: status.as_u16(),
            body,
        }
    }
}

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z]*").expect("code fence pattern is valid"));

/// Longest `\u` escape prefix that can still be valid
const UNICODE_ESCAPE_DIGITS: usize = 4;

/// Centralized JSON response parser with extraction and repair for model output
#[derive(Debug, Clone, Default)]
pub struct JsonResponseParser;

impl JsonResponseParser {
    /// Remove Markdown code-fence markers, keeping the fenced content
    pub fn strip_code_fences(content: &str) -> String {
        CODE_FENCE.replace_all(content, "").trim().to_string()
    }

    /// Extract the JSON object from responses that might be wrapped in markdown or prose
    pub fn extract_json_from_response(content: &str) -> String {
        let stripped = Self::strip_code_fences(content);

        if let (Some(start), Some(end)) = (stripped.find('{'), stripped.rfind('}')) {
            if end > start {
                return stripped[start..=end].to_string();
            }
        }

        stripped
    }

    /// Fix the malformations models commonly emit.
    ///
    /// Drops trailing commas before `}`/`]`, drops `\u` escapes with fewer than
    /// four hex digits, and escapes raw control characters inside strings.
    /// Text outside string literals is otherwise left alone.
    pub fn repair_json(candidate: &str) -> String {
        let chars: Vec<char> = candidate.chars().collect();
        let mut out = String::with_capacity(candidate.len());
        let mut in_string = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if in_string {
                match c {
                    '\\' => match chars.get(i + 1).copied() {
                        Some('u') => {
                            let digits = chars[i + 2..]
                                .iter()
                                .take(UNICODE_ESCAPE_DIGITS)
                                .take_while(|h| h.is_ascii_hexdigit())
                                .count();
                            if digits == UNICODE_ESCAPE_DIGITS {
                                out.extend(&chars[i..i + 2 + digits]);
                            }
                            i += 2 + digits;
                            continue;
                        }
                        Some(next) => {
                            out.push('\\');
                            out.push(next);
                            i += 2;
                            continue;
                        }
                        None => {}
                    },
                    '"' => {
                        in_string = false;
                        out.push(c);
                    }
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    _ => out.push(c),
                }
            } else {
                match c {
                    '"' => {
                        in_string = true;
                        out.push(c);
                    }
                    ',' => {
                        let next = chars[i + 1..].iter().copied().find(|ch| !ch.is_whitespace());
                        if !matches!(next, Some('}') | Some(']')) {
                            out.push(c);
                        }
                    }
                    _ => out.push(c),
                }
            }

            i += 1;
        }

        out
    }

    /// Parse model output into `T`: strict first, then once more after repair
    pub fn parse_json_response<T>(&self, content: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let json_content = Self::extract_json_from_response(content);

        match serde_json::from_str::<T>(&json_content) {
            Ok(value) => Ok(value),
            Err(strict_err) => {
                let repaired = Self::repair_json(&json_content);
                debug!(error = %strict_err, "Strict JSON parse failed, retrying after repair");
                serde_json::from_str::<T>(&repaired).map_err(|e| {
                    info!(error = %e, "Repaired JSON still unparseable");
                    anyhow::anyhow!("Failed to parse JSON response: {}", e)
                })
            }
        }
    }
}

/// Factory for creating LLM providers based on provider type
pub struct LLMProviderFactory;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LLMProviderType {
    OpenRouter,
    Gemini,
}

impl LLMProviderType {
    /// Parse a provider name, falling back to OpenRouter for anything unrecognised
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "gemini" | "google" => LLMProviderType::Gemini,
            "openrouter" | "openai" | "chatgpt" | "gpt" => LLMProviderType::OpenRouter,
            _ => {
                info!("Unknown LLM provider '{}', defaulting to OpenRouter", name);
                LLMProviderType::OpenRouter
            }
        }
    }

    /// Fallback preference order used when no model list is configured
    pub fn default_models(&self) -> Vec<String> {
        let models: &[&str] = match self {
            LLMProviderType::OpenRouter => &[
                "google/gemini-2.0-flash-exp:free",
                "openai/gpt-4o-mini",
                "meta-llama/llama-3.1-8b-instruct:free",
                "anthropic/claude-3.5-sonnet",
                "google/gemini-flash-1.5-8b",
            ],
            LLMProviderType::Gemini => &["gemini-2.0-flash-exp", "gemini-1.5-flash"],
        };
        models.iter().map(|m| m.to_string()).collect()
    }
}

impl LLMProviderFactory {
    /// Create a new LLM provider instance based on provider type
    pub fn create_provider(
        provider_type: LLMProviderType,
        api_key: String,
        base_url: Option<String>,
        site_url: String,
        app_title: String,
    ) -> LLMProvider {
        match provider_type {
            LLMProviderType::OpenRouter => {
                LLMProvider::OpenRouter(OpenRouterProvider::new(api_key, base_url, site_url, app_title))
            }
            LLMProviderType::Gemini => LLMProvider::Gemini(GeminiProvider::new(api_key, base_url)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_strip_code_fences() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(JsonResponseParser::strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_ignores_surrounding_prose() {
        let raw = "Sure! Here is the result:\n{\"summary\": \"ok\"}\nHope that helps.";
        assert_eq!(
            JsonResponseParser::extract_json_from_response(raw),
            "{\"summary\": \"ok\"}"
        );
    }

    #[test]
    fn test_extract_json_without_braces_returns_text() {
        assert_eq!(
            JsonResponseParser::extract_json_from_response("  no json here "),
            "no json here"
        );
    }

    #[test]
    fn test_repair_trailing_commas() {
        let repaired = JsonResponseParser::repair_json("{\"a\": [1, 2, ], \"b\": 3,\n}");
        assert_eq!(repaired, "{\"a\": [1, 2 ], \"b\": 3\n}");
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["a"][1], 2);
    }

    #[test]
    fn test_repair_keeps_commas_inside_strings() {
        let repaired = JsonResponseParser::repair_json("{\"a\": \"x, }\"}");
        assert_eq!(repaired, "{\"a\": \"x, }\"}");
    }

    #[test]
    fn test_repair_short_unicode_escape() {
        let repaired = JsonResponseParser::repair_json(r#"{"a": "café \u12 ok"}"#);
        assert_eq!(repaired, r#"{"a": "café  ok"}"#);
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["a"], "café  ok");
    }

    #[test]
    fn test_repair_bare_newlines_in_strings() {
        let repaired = JsonResponseParser::repair_json("{\"a\": \"line one\nline two\"}");
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["a"], "line one\nline two");
    }

    #[test]
    fn test_parse_json_response_repairs() {
        #[derive(Deserialize)]
        struct Payload {
            words: Vec<String>,
        }

        let parser = JsonResponseParser;
        let raw = "```json\n{\"words\": [\"hola\", \"adiós\",],}\n```";
        let payload: Payload = parser.parse_json_response(raw).unwrap();
        assert_eq!(payload.words, vec!["hola", "adiós"]);
    }

    #[test]
    fn test_parse_json_response_gives_up() {
        let parser = JsonResponseParser;
        assert!(parser.parse_json_response::<Value>("I cannot help with that.").is_err());
        assert!(parser.parse_json_response::<Value>("{\"a\": }").is_err());
    }

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(LLMProviderType::parse("Gemini"), LLMProviderType::Gemini);
        assert_eq!(LLMProviderType::parse("google"), LLMProviderType::Gemini);
        assert_eq!(LLMProviderType::parse("openai"), LLMProviderType::OpenRouter);
        assert_eq!(LLMProviderType::parse("OpenRouter"), LLMProviderType::OpenRouter);
        assert_eq!(LLMProviderType::parse("mystery"), LLMProviderType::OpenRouter);
    }

    #[test]
    fn test_default_model_order() {
        let models = LLMProviderType::OpenRouter.default_models();
        assert_eq!(models.len(), 5);
        assert_eq!(models[0], "google/gemini-2.0-flash-exp:free");
        assert_eq!(models[1], "openai/gpt-4o-mini");
    }
}
