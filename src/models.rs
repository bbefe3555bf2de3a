use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Ai,
}

impl MessageRole {
    /// Speaker label used when flattening a session into a transcript
    pub fn transcript_label(&self) -> &'static str {
        match self {
            MessageRole::User => "USER",
            MessageRole::Ai => "AI",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub correction: Option<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionPatterns {
    #[serde(default)]
    pub pronunciation: Vec<String>,
    #[serde(default)]
    pub grammar: Vec<String>,
    #[serde(default)]
    pub vocabulary: Vec<String>,
    #[serde(default)]
    pub common_mistakes: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

/// One persisted practice session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMemory {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub language: String,
    pub personality_id: String,
    pub messages: Vec<SessionMessage>,
    #[serde(default)]
    pub confidence_scores: Vec<f64>,
    pub summary: Option<String>,
    #[serde(default)]
    pub mistakes: Vec<String>,
    #[serde(default)]
    pub vocabulary: Vec<String>,
    #[serde(default)]
    pub emotions: Vec<String>,
    pub avg_confidence: Option<f64>,
    pub patterns: Option<SessionPatterns>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LearnedPatterns {
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub current_level: String,
    pub total_sessions: i64,
    pub streak_days: i64,
    pub last_practice_date: DateTime<Utc>,
    pub avg_confidence_score: f64,
    pub learned_patterns: LearnedPatterns,
}

pub const DEFAULT_PROFILE_ID: &str = "default";

impl UserProfile {
    pub fn new_default(now: DateTime<Utc>) -> Self {
        Self {
            id: DEFAULT_PROFILE_ID.to_string(),
            current_level: "Beginner".to_string(),
            total_sessions: 0,
            streak_days: 0,
            last_practice_date: now,
            avg_confidence_score: 0.0,
            learned_patterns: LearnedPatterns::default(),
        }
    }

    /// Overlay the fields present in `update` onto this profile
    pub fn apply(&mut self, update: UserProfileUpdate) {
        if let Some(level) = update.current_level {
            self.current_level = level;
        }
        if let Some(total) = update.total_sessions {
            self.total_sessions = total;
        }
        if let Some(streak) = update.streak_days {
            self.streak_days = streak;
        }
        if let Some(date) = update.last_practice_date {
            self.last_practice_date = date;
        }
        if let Some(score) = update.avg_confidence_score {
            self.avg_confidence_score = score;
        }
        if let Some(patterns) = update.learned_patterns {
            self.learned_patterns = patterns;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfileUpdate {
    pub current_level: Option<String>,
    pub total_sessions: Option<i64>,
    pub streak_days: Option<i64>,
    pub last_practice_date: Option<DateTime<Utc>>,
    pub avg_confidence_score: Option<f64>,
    pub learned_patterns: Option<LearnedPatterns>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub name: String,
    pub native_language: Option<String>,
    pub learning_language: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: Option<String>,
    pub name: String,
    pub native_language: Option<String>,
    pub learning_language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub native_language: Option<String>,
    pub learning_language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    Completed,
    InProgress,
    Locked,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressItem {
    pub id: String,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurriculumProgress {
    pub lang: String,
    pub items: Vec<ProgressItem>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveProgressRequest {
    pub items: Vec<ProgressItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndSessionRequest {
    pub messages: Vec<SessionMessage>,
    pub language: String,
    pub personality_id: String,
}

/// Structured analysis of a session transcript produced by the model
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionAnalysis {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mistakes: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub vocabulary: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub emotions: Vec<String>,
}

// Models emit `null` for lists they have nothing to put in
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A chat turn as sent by the web client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `user` for the learner; anything else is a tutor turn
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
}

impl ChatTurn {
    pub fn is_user(&self) -> bool {
        self.kind == "user"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Kept loose so a non-array payload can be rejected as a bad request
    pub messages: Option<Value>,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub level: String,
}

impl ChatRequest {
    /// Conversation turns, or `None` unless `messages` is an array of turn objects
    pub fn turns(&self) -> Option<Vec<ChatTurn>> {
        match &self.messages {
            Some(value @ Value::Array(_)) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: Option<String>,
    pub target_language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub translation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    pub language: Option<String>,
    pub native_language: Option<String>,
    pub personality: Option<String>,
    pub topic: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TutorPrompt {
    pub system_prompt: String,
    pub first_message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateUiRequest {
    pub target_language: Option<String>,
}

/// UI label key to display string
pub type UiStrings = BTreeMap<String, String>;
