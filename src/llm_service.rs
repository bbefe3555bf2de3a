use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::llm_providers::{ChatMessage, JsonResponseParser, LLMProviderFactory, LLMProviderType};
use crate::model_fallback::ModelFallbackChain;
use crate::models::{
    ChatRequest, ChatTurn, PromptRequest, SessionAnalysis, TutorPrompt, UiStrings,
};

// Import logging macros
use crate::log_llm_operation;

const DEFAULT_SITE_URL: &str = "http://localhost:3000";
const DEFAULT_APP_TITLE: &str = "Language Tutor Bot";

/// English UI labels; also the fallback whenever translation fails
pub const ENGLISH_UI_STRINGS: &[(&str, &str)] = &[
    ("practice", "Conversation Practice"),
    ("topic", "Topic"),
    ("online", "AI ONLINE"),
    ("roadmap", "Your Roadmap"),
    ("complete", "Complete"),
    ("completed", "COMPLETED"),
    ("in_progress", "IN PROGRESS"),
    ("locked", "LOCKED"),
    ("listen", "Listen"),
    ("translate", "Translate"),
    ("connected", "Connected"),
    ("join", "Join Call"),
    ("leave", "Leave"),
    ("placeholder", "Talk to MisSpoke !!"),
];

pub fn english_ui_strings() -> UiStrings {
    ENGLISH_UI_STRINGS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Produces a structured analysis of a finished session transcript
#[async_trait]
pub trait TranscriptAnalyzer: Send + Sync {
    async fn analyze_transcript(&self, transcript: &str) -> Option<SessionAnalysis>;
}

#[derive(Clone)]
pub struct LLMService {
    chain: ModelFallbackChain,
    json_parser: JsonResponseParser,
}

impl LLMService {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self::new_with_provider(api_key, base_url, LLMProviderType::OpenRouter, None)
    }

    pub fn new_with_provider(
        api_key: String,
        base_url: Option<String>,
        provider_type: LLMProviderType,
        models: Option<Vec<String>>,
    ) -> Self {
        Self::with_site(
            api_key,
            base_url,
            provider_type,
            models,
            DEFAULT_SITE_URL.to_string(),
            DEFAULT_APP_TITLE.to_string(),
        )
    }

    pub fn with_site(
        api_key: String,
        base_url: Option<String>,
        provider_type: LLMProviderType,
        models: Option<Vec<String>>,
        site_url: String,
        app_title: String,
    ) -> Self {
        let provider =
            LLMProviderFactory::create_provider(provider_type, api_key, base_url, site_url, app_title);
        let models = models
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| provider_type.default_models());

        Self {
            chain: ModelFallbackChain::new(provider, models),
            json_parser: JsonResponseParser,
        }
    }

    /// Get the provider name for logging and testing
    pub fn provider_name(&self) -> &'static str {
        self.chain.provider_name()
    }

    pub fn models(&self) -> &[String] {
        self.chain.models()
    }

    pub async fn generate_content_safe(&self, prompt: &str) -> Option<String> {
        self.chain.generate_content_safe(prompt).await
    }

    pub async fn generate_with_messages_safe(&self, messages: &[ChatMessage]) -> Option<String> {
        self.chain.generate_with_messages_safe(messages).await
    }

    /// Next tutor turn for a text conversation
    pub async fn chat_reply(&self, request: &ChatRequest, turns: &[ChatTurn]) -> Option<String> {
        let system_prompt = tutor_system_prompt(request);

        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ChatMessage::system(system_prompt));
        for turn in turns {
            messages.push(if turn.is_user() {
                ChatMessage::user(turn.content.clone())
            } else {
                ChatMessage::assistant(turn.content.clone())
            });
        }

        info!(
            language = %request.language,
            personality = %request.personality,
            turn_count = turns.len(),
            "Generating tutor chat reply"
        );

        self.chain.generate_with_messages_safe(&messages).await
    }

    pub async fn translate(&self, text: &str, target_language: &str) -> Option<String> {
        let prompt = format!(
            r#"Translate the following text into {target_language}.
Ensure the translation is natural and accurate for a language learner.
Return ONLY the translated text. Do not include any explanations or markdown.

Text to translate:
"{text}""#
        );

        self.chain
            .generate_content_safe(&prompt)
            .await
            .map(|t| t.trim().to_string())
    }

    pub async fn generate_session_summary(&self, transcript: &str) -> Option<SessionAnalysis> {
        let prompt = format!(
            r#"Analyze the following language learning session transcript.
Identify:
1. Key topics discussed
2. Main grammatical mistakes made by the user
3. New vocabulary used correctly
4. The user's emotional state (confident, hesitant, frustrated, etc.)

Transcript:
{transcript}

Output JSON format:
{{
  "summary": "Brief 1-sentence summary",
  "mistakes": ["mistake 1", "mistake 2"],
  "vocabulary": ["word 1", "word 2"],
  "emotions": ["emotion 1", "emotion 2"]
}}"#
        );

        let response_text = self.chain.generate_content_safe(&prompt).await?;
        debug!(response_content = %response_text, "Raw LLM response for session summary");

        match self.json_parser.parse_json_response::<SessionAnalysis>(&response_text) {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                log_llm_operation!(warn, "generate_session_summary", format!("summary unparseable: {}", e));
                None
            }
        }
    }

    /// System prompt and opening line for the voice agent; never fails
    pub async fn generate_tutor_prompt(&self, request: &PromptRequest) -> TutorPrompt {
        let language = request.language.as_deref().unwrap_or("language");
        let native_language = request.native_language.as_deref().unwrap_or("English");
        let personality = request.personality.as_deref().unwrap_or("friendly");
        let topic = request.topic.as_deref().unwrap_or("conversation");
        let level = request.level.as_deref().unwrap_or("Beginner");

        let prompt = format!(
            r#"Create a detailed system prompt for an AI language tutor with the following traits:
- Target Language: {language}
- User's Native Language: {native_language}
- Personality: {personality}
- Current Topic: {topic}
- User Level: {level}

The system prompt should be designed for a voice conversational agent.
It must instruct the AI to:
1. Behave consistently as the specified personality.
2. Speak primarily in {language}, adapting complexity to {level}.
3. Provide brief translations or explanations in {native_language} ONLY when necessary or asked.
4. Correct mistakes gently and encouragingly.
5. Keep responses concise (1-3 sentences) to maintain conversational flow.
6. Engage the user with relevant questions about the topic.

Also generate a welcoming "first message" to start the conversation.

Output JSON format:
{{
  "systemPrompt": "The detailed instruction for the AI...",
  "firstMessage": "The opening greeting in the target language..."
}}"#
        );

        let generated = match self.chain.generate_content_safe(&prompt).await {
            Some(text) => match self.json_parser.parse_json_response::<TutorPrompt>(&text) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    log_llm_operation!(warn, "generate_tutor_prompt", format!("prompt unparseable, using fallback: {}", e));
                    None
                }
            },
            None => None,
        };

        generated.unwrap_or_else(|| fallback_tutor_prompt(request))
    }

    /// UI labels in `target_language`; the English table on any failure
    pub async fn translate_ui(&self, target_language: Option<&str>) -> UiStrings {
        let english = english_ui_strings();

        let target = match target_language.map(str::trim) {
            Some(t) if !t.is_empty() && !t.eq_ignore_ascii_case("English") => t,
            _ => return english,
        };

        // Serializing a BTreeMap<String, String> cannot fail
        let input = serde_json::to_string_pretty(&english).unwrap_or_default();
        let prompt = format!(
            r#"Translate the following UI strings to {target}.
Return ONLY a valid JSON object where the keys are the same as the input keys, and the values are the translations.
Do not include any markdown formatting or explanations.

Input JSON:
{input}"#
        );

        let Some(text) = self.chain.generate_content_safe(&prompt).await else {
            return english;
        };

        match self.json_parser.parse_json_response::<UiStrings>(&text) {
            Ok(mut translated) => {
                translated.retain(|key, _| english.contains_key(key));
                for (key, value) in &english {
                    translated.entry(key.clone()).or_insert_with(|| value.clone());
                }
                translated
            }
            Err(e) => {
                warn!(language = %target, error = %e, "UI translation unparseable, using English");
                english
            }
        }
    }
}

#[async_trait]
impl TranscriptAnalyzer for LLMService {
    async fn analyze_transcript(&self, transcript: &str) -> Option<SessionAnalysis> {
        self.generate_session_summary(transcript).await
    }
}

pub fn tutor_system_prompt(request: &ChatRequest) -> String {
    let ChatRequest {
        language,
        personality,
        topic,
        level,
        ..
    } = request;

    format!(
        r#"### IDENTITY ###
You are the specialized {personality} {language} tutor. You are NOT a general AI assistant.

### SESSION CONTEXT (IMPERATIVE) ###
- Target Language: {language}
- Your Personality: {personality}
- Current Topic: {topic}
- User Level: {level}

### MANDATORY CONSTRAINTS ###
1. NEVER ask "What language would you like to practice?" or "What is your level?". These are ALREADY SET to {language} and {level}.
2. If the user provides a short response (e.g., "Yes", "Hi", "Ok"), DO NOT pivot to generic help. Instead, dive deeper into {topic} in {language}.
3. Speak 95% in {language}. Use the user's native language only for brief translations in brackets.
4. Embody the {personality} personality in every sentence.

### EXAMPLE TRANSITION ###
User: "Yes." or "Hi!"
Assistant: "¡Genial! Empecemos con nuestro tema: {topic}. [Great! Let's start with our topic: {topic}.]" (Assuming Spanish/Energetic)"#
    )
}

pub fn fallback_tutor_prompt(request: &PromptRequest) -> TutorPrompt {
    let language = request.language.as_deref();
    TutorPrompt {
        system_prompt: format!(
            "You are a {} {} tutor. Teach {}.",
            request.personality.as_deref().unwrap_or("friendly"),
            language.unwrap_or("language"),
            request.topic.as_deref().unwrap_or("conversation"),
        ),
        first_message: format!("Hello! Let's learn {}.", language.unwrap_or("a new language")),
    }
}
