use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};

use crate::log_db_operation;
use crate::models::*;
use crate::security::hash_password;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    // Serializes read-modify-write cycles on the single profile row
    profile_lock: Arc<Mutex<()>>,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let db = Database {
            pool,
            profile_lock: Arc::new(Mutex::new(())),
        };
        db.migrate().await?;
        log_db_operation!(info, "migrate", "schema ready");
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                start_time TEXT NOT NULL,
                end_time TEXT,
                language TEXT NOT NULL,
                personality_id TEXT NOT NULL,
                messages TEXT NOT NULL,
                confidence_scores TEXT NOT NULL,
                summary TEXT,
                mistakes TEXT NOT NULL,
                vocabulary TEXT NOT NULL,
                emotions TEXT NOT NULL,
                avg_confidence REAL,
                patterns TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_start_time ON sessions (start_time)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_profiles (
                id TEXT PRIMARY KEY,
                current_level TEXT NOT NULL,
                total_sessions INTEGER NOT NULL DEFAULT 0,
                streak_days INTEGER NOT NULL DEFAULT 0,
                last_practice_date TEXT NOT NULL,
                avg_confidence_score REAL NOT NULL DEFAULT 0.0,
                learned_patterns TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                email TEXT PRIMARY KEY,
                password_hash TEXT,
                name TEXT NOT NULL,
                native_language TEXT,
                learning_language TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS curriculum_progress (
                lang TEXT PRIMARY KEY,
                items TEXT NOT NULL,
                last_updated TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Session operations
    pub async fn save_session(&self, session: &SessionMemory) -> Result<()> {
        let started = Instant::now();
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO sessions (id, start_time, end_time, language, personality_id,
                                             messages, confidence_scores, summary, mistakes,
                                             vocabulary, emotions, avg_confidence, patterns)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&session.id)
        .bind(format_timestamp(&session.start_time))
        .bind(session.end_time.as_ref().map(format_timestamp))
        .bind(&session.language)
        .bind(&session.personality_id)
        .bind(serde_json::to_string(&session.messages)?)
        .bind(serde_json::to_string(&session.confidence_scores)?)
        .bind(&session.summary)
        .bind(serde_json::to_string(&session.mistakes)?)
        .bind(serde_json::to_string(&session.vocabulary)?)
        .bind(serde_json::to_string(&session.emotions)?)
        .bind(session.avg_confidence)
        .bind(session.patterns.as_ref().map(serde_json::to_string).transpose()?)
        .execute(&self.pool)
        .await?;

        log_db_operation!(
            debug,
            "save_session",
            session_id = session.id,
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(())
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<SessionMemory>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_session(&row)).transpose()
    }

    /// All sessions, oldest first
    pub async fn get_all_sessions(&self) -> Result<Vec<SessionMemory>> {
        let started = Instant::now();
        let rows = sqlx::query("SELECT * FROM sessions ORDER BY start_time ASC")
            .fetch_all(&self.pool)
            .await?;

        let sessions = rows.iter().map(row_to_session).collect::<Result<Vec<_>>>()?;
        log_db_operation!(
            debug,
            "get_all_sessions",
            count = sessions.len(),
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(sessions)
    }

    /// Most recent session for a language
    pub async fn get_latest_session(&self, language: &str) -> Result<Option<SessionMemory>> {
        let row = sqlx::query(
            "SELECT * FROM sessions WHERE language = ?1 ORDER BY start_time DESC LIMIT 1",
        )
        .bind(language)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_session(&row)).transpose()
    }

    /// Mean of the per-session confidence averages, ignoring sessions without any
    pub async fn average_session_confidence(&self) -> Result<Option<f64>> {
        let row = sqlx::query(
            "SELECT AVG(avg_confidence) AS score FROM sessions WHERE avg_confidence IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<Option<f64>, _>("score"))
    }

    // Profile operations
    pub async fn get_user_profile(&self) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT * FROM user_profiles WHERE id = ?1")
            .bind(DEFAULT_PROFILE_ID)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(UserProfile {
                id: row.get("id"),
                current_level: row.get("current_level"),
                total_sessions: row.get("total_sessions"),
                streak_days: row.get("streak_days"),
                last_practice_date: parse_timestamp(&row.get::<String, _>("last_practice_date"))?,
                avg_confidence_score: row.get("avg_confidence_score"),
                learned_patterns: serde_json::from_str(&row.get::<String, _>("learned_patterns"))?,
            })),
            None => Ok(None),
        }
    }

    /// Exclusive access to the profile row until the guard drops.
    ///
    /// Callers holding the guard must write through [`Database::store_user_profile`],
    /// not [`Database::update_user_profile`], which takes the lock itself.
    pub async fn lock_profile(&self) -> MutexGuard<'_, ()> {
        self.profile_lock.lock().await
    }

    /// Merge `update` onto the stored profile, creating the default one first if needed
    pub async fn update_user_profile(&self, update: UserProfileUpdate) -> Result<UserProfile> {
        let _guard = self.lock_profile().await;

        let mut profile = match self.get_user_profile().await? {
            Some(profile) => profile,
            None => UserProfile::new_default(Utc::now()),
        };
        profile.apply(update);
        self.store_user_profile(&profile).await?;

        Ok(profile)
    }

    pub async fn store_user_profile(&self, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO user_profiles (id, current_level, total_sessions, streak_days,
                                                  last_practice_date, avg_confidence_score, learned_patterns)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.current_level)
        .bind(profile.total_sessions)
        .bind(profile.streak_days)
        .bind(format_timestamp(&profile.last_practice_date))
        .bind(profile.avg_confidence_score)
        .bind(serde_json::to_string(&profile.learned_patterns)?)
        .execute(&self.pool)
        .await?;

        log_db_operation!(info, "store_user_profile", "profile written");
        Ok(())
    }

    // Curriculum progress operations
    pub async fn save_curriculum_progress(
        &self,
        lang: &str,
        items: Vec<ProgressItem>,
    ) -> Result<CurriculumProgress> {
        let progress = CurriculumProgress {
            lang: lang.to_string(),
            items,
            last_updated: Utc::now(),
        };

        sqlx::query(
            "INSERT OR REPLACE INTO curriculum_progress (lang, items, last_updated) VALUES (?1, ?2, ?3)",
        )
        .bind(&progress.lang)
        .bind(serde_json::to_string(&progress.items)?)
        .bind(format_timestamp(&progress.last_updated))
        .execute(&self.pool)
        .await?;

        Ok(progress)
    }

    pub async fn get_curriculum_progress(&self, lang: &str) -> Result<Option<CurriculumProgress>> {
        let row = sqlx::query("SELECT * FROM curriculum_progress WHERE lang = ?1")
            .bind(lang)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(CurriculumProgress {
                lang: row.get("lang"),
                items: serde_json::from_str(&row.get::<String, _>("items"))?,
                last_updated: parse_timestamp(&row.get::<String, _>("last_updated"))?,
            })),
            None => Ok(None),
        }
    }

    // User operations
    pub async fn register_user(&self, request: RegisterUserRequest) -> Result<User> {
        let user = User {
            email: request.email,
            password_hash: request.password.as_deref().map(hash_password),
            name: request.name,
            native_language: request.native_language,
            learning_language: request.learning_language,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, name, native_language, learning_language, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.native_language)
        .bind(&user.learning_language)
        .bind(format_timestamp(&user.created_at))
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(User {
                email: row.get("email"),
                password_hash: row.get("password_hash"),
                name: row.get("name"),
                native_language: row.get("native_language"),
                learning_language: row.get("learning_language"),
                created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
            })),
            None => Ok(None),
        }
    }

    /// Apply a partial update; returns `None` without writing when the user does not exist
    pub async fn update_user(&self, email: &str, request: UpdateUserRequest) -> Result<Option<User>> {
        let mut user = match self.get_user(email).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        if let Some(name) = request.name {
            user.name = name;
        }
        if let Some(native) = request.native_language {
            user.native_language = Some(native);
        }
        if let Some(learning) = request.learning_language {
            user.learning_language = Some(learning);
        }

        sqlx::query(
            "UPDATE users SET name = ?1, native_language = ?2, learning_language = ?3 WHERE email = ?4",
        )
        .bind(&user.name)
        .bind(&user.native_language)
        .bind(&user.learning_language)
        .bind(&user.email)
        .execute(&self.pool)
        .await?;

        Ok(Some(user))
    }
}

fn row_to_session(row: &SqliteRow) -> Result<SessionMemory> {
    Ok(SessionMemory {
        id: row.get("id"),
        start_time: parse_timestamp(&row.get::<String, _>("start_time"))?,
        end_time: row
            .get::<Option<String>, _>("end_time")
            .map(|s| parse_timestamp(&s))
            .transpose()?,
        language: row.get("language"),
        personality_id: row.get("personality_id"),
        messages: serde_json::from_str(&row.get::<String, _>("messages"))?,
        confidence_scores: serde_json::from_str(&row.get::<String, _>("confidence_scores"))?,
        summary: row.get("summary"),
        mistakes: serde_json::from_str(&row.get::<String, _>("mistakes"))?,
        vocabulary: serde_json::from_str(&row.get::<String, _>("vocabulary"))?,
        emotions: serde_json::from_str(&row.get::<String, _>("emotions"))?,
        avg_confidence: row.get("avg_confidence"),
        patterns: row
            .get::<Option<String>, _>("patterns")
            .map(|s| serde_json::from_str(&s))
            .transpose()?,
    })
}

// Fixed-width UTC timestamps so lexical order in SQLite matches time order
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Invalid timestamp '{}': {}", s, e))
}
