use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::database::Database;
use crate::llm_service::TranscriptAnalyzer;
use crate::models::*;
use crate::{log_service_start, log_service_success, log_service_warn};

#[derive(Clone)]
pub struct SessionService {
    db: Database,
    analyzer: Arc<dyn TranscriptAnalyzer>,
}

impl SessionService {
    pub fn new(db: Database, analyzer: Arc<dyn TranscriptAnalyzer>) -> Self {
        Self { db, analyzer }
    }

    /// Persist a finished conversation and roll its stats into the profile.
    ///
    /// Returns `None` without touching storage when there are no messages.
    pub async fn end_session(
        &self,
        messages: Vec<SessionMessage>,
        language: String,
        personality_id: String,
    ) -> Result<Option<SessionMemory>> {
        let Some(first) = messages.first() else {
            return Ok(None);
        };

        log_service_start!("session_service", "end_session", message_count = messages.len());
        let started = Instant::now();

        let start_time = first.timestamp;
        let end_time = Utc::now();
        let transcript = build_transcript(&messages);

        let analysis = match self.analyzer.analyze_transcript(&transcript).await {
            Some(analysis) => analysis,
            None => {
                log_service_warn!("session_service", "end_session", "summary unavailable, saving without it");
                SessionAnalysis::default()
            }
        };

        let confidence_scores: Vec<f64> = messages.iter().filter_map(|m| m.confidence).collect();
        let avg_confidence = mean(&confidence_scores);

        let session = SessionMemory {
            id: Uuid::new_v4().to_string(),
            start_time,
            end_time: Some(end_time),
            language,
            personality_id,
            messages,
            confidence_scores,
            summary: analysis.summary,
            mistakes: analysis.mistakes,
            vocabulary: analysis.vocabulary,
            emotions: analysis.emotions,
            avg_confidence,
            patterns: None,
        };
        self.db.save_session(&session).await?;

        // Held until the profile is written so concurrent endings each count
        let _profile_guard = self.db.lock_profile().await;

        let previous = self.db.get_user_profile().await?;
        let streak_days = next_streak(
            previous
                .as_ref()
                .map(|p| (local_day(p.last_practice_date), p.streak_days)),
            local_day(end_time),
        );

        let mut profile = previous.unwrap_or_else(|| UserProfile::new_default(end_time));
        profile.total_sessions += 1;
        profile.streak_days = streak_days;
        profile.last_practice_date = end_time;
        if session.avg_confidence.is_some() {
            if let Some(score) = self.db.average_session_confidence().await? {
                profile.avg_confidence_score = score;
            }
        }
        self.db.store_user_profile(&profile).await?;

        log_service_success!(
            "session_service",
            "end_session",
            session_id = session.id,
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(Some(session))
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<SessionMemory>> {
        self.db.get_session(id).await
    }

    pub async fn get_all_sessions(&self) -> Result<Vec<SessionMemory>> {
        self.db.get_all_sessions().await
    }

    pub async fn get_latest_session(&self, language: &str) -> Result<Option<SessionMemory>> {
        self.db.get_latest_session(language).await
    }

    pub async fn get_user_profile(&self) -> Result<Option<UserProfile>> {
        self.db.get_user_profile().await
    }

    pub async fn update_user_profile(&self, update: UserProfileUpdate) -> Result<UserProfile> {
        self.db.update_user_profile(update).await
    }

    pub async fn save_curriculum_progress(
        &self,
        lang: &str,
        items: Vec<ProgressItem>,
    ) -> Result<CurriculumProgress> {
        self.db.save_curriculum_progress(lang, items).await
    }

    pub async fn get_curriculum_progress(&self, lang: &str) -> Result<Option<CurriculumProgress>> {
        self.db.get_curriculum_progress(lang).await
    }

    pub async fn register_user(&self, request: RegisterUserRequest) -> Result<User> {
        self.db.register_user(request).await
    }

    pub async fn get_user(&self, email: &str) -> Result<Option<User>> {
        self.db.get_user(email).await
    }

    pub async fn update_user(&self, email: &str, request: UpdateUserRequest) -> Result<Option<User>> {
        self.db.update_user(email, request).await
    }
}

/// One `SPEAKER: text` line per message
pub fn build_transcript(messages: &[SessionMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.transcript_label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Streak after practicing on `today`, given the last practice day and its streak.
///
/// A same-day practice keeps the streak, but never below one day.
pub fn next_streak(last: Option<(NaiveDate, i64)>, today: NaiveDate) -> i64 {
    match last {
        Some((last_day, streak)) if last_day == today => streak.max(1),
        Some((last_day, streak)) if last_day.succ_opt() == Some(today) => streak + 1,
        _ => 1,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

// Streaks follow the server's calendar, not UTC
fn local_day(dt: DateTime<Utc>) -> NaiveDate {
    dt.with_timezone(&Local).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_streak_same_day_unchanged() {
        assert_eq!(next_streak(Some((day(2024, 3, 5), 4)), day(2024, 3, 5)), 4);
    }

    #[test]
    fn test_streak_same_day_counts_today_at_least() {
        // A profile created through the update route starts at zero
        assert_eq!(next_streak(Some((day(2024, 3, 5), 0)), day(2024, 3, 5)), 1);
    }

    #[test]
    fn test_streak_consecutive_day_increments() {
        assert_eq!(next_streak(Some((day(2024, 3, 5), 4)), day(2024, 3, 6)), 5);
        // Month and year boundaries count as consecutive
        assert_eq!(next_streak(Some((day(2024, 1, 31), 2)), day(2024, 2, 1)), 3);
        assert_eq!(next_streak(Some((day(2023, 12, 31), 9)), day(2024, 1, 1)), 10);
    }

    #[test]
    fn test_streak_resets_after_gap() {
        assert_eq!(next_streak(Some((day(2024, 3, 1), 7)), day(2024, 3, 5)), 1);
        assert_eq!(next_streak(None, day(2024, 3, 5)), 1);
    }

    #[test]
    fn test_transcript_format() {
        let now = Utc::now();
        let messages = vec![
            SessionMessage {
                role: MessageRole::User,
                content: "Hola".to_string(),
                timestamp: now,
                correction: None,
                confidence: None,
            },
            SessionMessage {
                role: MessageRole::Ai,
                content: "¡Hola! ¿Qué tal?".to_string(),
                timestamp: now,
                correction: None,
                confidence: None,
            },
        ];
        assert_eq!(build_transcript(&messages), "USER: Hola\nAI: ¡Hola! ¿Qué tal?");
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[0.5, 1.0]), Some(0.75));
    }
}
