use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    api_error,
    curriculum::{self, Curriculum, Personality},
    errors::{ApiError, ErrorContext, ErrorResponse, classify_database_error},
    llm_service::LLMService,
    models::*,
    security::verify_password,
    session_service::SessionService,
};

// Import logging macros
use crate::{log_api_error, log_api_start, log_api_success, log_api_warn};

#[derive(Clone)]
pub struct AppState {
    pub session_service: SessionService,
    pub llm_service: LLMService,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ErrorResponse>;

fn required<'a>(value: &'a Option<String>) -> Option<&'a str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// Tutor endpoints

pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> ApiResult<ChatReply> {
    log_api_start!("chat", language = request.language);

    let Some(turns) = request.turns() else {
        return Err(api_error!(validation, "chat", "chat", "messages array is required"));
    };

    match state.llm_service.chat_reply(&request, &turns).await {
        Some(content) => {
            log_api_success!("chat", "tutor reply generated");
            Ok(Json(ApiResponse::success(ChatReply { content })))
        }
        None => Err(ApiError::LLMError("no model produced a reply".to_string()).to_response_with_context(
            ErrorContext::new("chat", "chat").with_user_message("Failed to generate response"),
        )),
    }
}

pub async fn translate(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> ApiResult<Translation> {
    log_api_start!("translate");

    let Some(text) = required(&request.text) else {
        return Err(api_error!(validation, "translate", "translation", "text is required"));
    };
    let target = match required(&request.target_language) {
        Some(target) if !target.eq_ignore_ascii_case("detect") => target,
        _ => {
            return Err(api_error!(
                validation,
                "translate",
                "translation",
                "targetLanguage is required and cannot be Detect"
            ));
        }
    };

    match state.llm_service.translate(text, target).await {
        Some(translation) => {
            log_api_success!("translate", "text translated");
            Ok(Json(ApiResponse::success(Translation { translation })))
        }
        None => Err(api_error!(llm, "translate", "translation", "no model produced a translation")),
    }
}

pub async fn summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> ApiResult<Option<SessionAnalysis>> {
    log_api_start!("summary");

    let Some(transcript) = required(&request.transcript) else {
        return Err(api_error!(validation, "summary", "summary", "transcript is required"));
    };

    let analysis = state.llm_service.generate_session_summary(transcript).await;
    if analysis.is_none() {
        log_api_warn!("summary", "summary unavailable, returning null");
    }
    Ok(Json(ApiResponse::success(analysis)))
}

pub async fn prompt(State(state): State<AppState>, Json(request): Json<PromptRequest>) -> ApiResult<TutorPrompt> {
    let Some(language) = required(&request.language) else {
        return Err(api_error!(validation, "prompt", "prompt", "language is required"));
    };
    log_api_start!("prompt", language = language);

    let prompt = state.llm_service.generate_tutor_prompt(&request).await;
    Ok(Json(ApiResponse::success(prompt)))
}

pub async fn translate_ui(
    State(state): State<AppState>,
    request: Option<Json<TranslateUiRequest>>,
) -> Json<ApiResponse<UiStrings>> {
    let target = request.and_then(|Json(r)| r.target_language);
    log_api_start!("translate_ui", language = target.as_deref().unwrap_or("English"));

    let strings = state.llm_service.translate_ui(target.as_deref()).await;
    Json(ApiResponse::success(strings))
}

// Catalog endpoints

pub async fn get_personalities() -> Json<ApiResponse<&'static [Personality]>> {
    Json(ApiResponse::success(curriculum::PERSONALITIES))
}

pub async fn get_personality(Path(id): Path<String>) -> ApiResult<&'static Personality> {
    match curriculum::personality(&id) {
        Some(personality) => Ok(Json(ApiResponse::success(personality))),
        None => Err(api_error!(not_found, "get_personality", "personality", &id)),
    }
}

pub async fn get_curriculum(Path(lang): Path<String>) -> Json<ApiResponse<&'static Curriculum>> {
    debug!(language = %lang, "Looking up curriculum");
    Json(ApiResponse::success(curriculum::curriculum_for(&lang)))
}

// Progress endpoints

pub async fn get_progress(
    State(state): State<AppState>,
    Path(lang): Path<String>,
) -> ApiResult<Option<CurriculumProgress>> {
    log_api_start!("get_progress", language = lang);

    match state.session_service.get_curriculum_progress(&lang).await {
        Ok(progress) => Ok(Json(ApiResponse::success(progress))),
        Err(e) => {
            log_api_error!("get_progress", error = e, "database error loading progress");
            Err(ApiError::DatabaseError(e)
                .to_response_with_context(ErrorContext::new("get_progress", "curriculum_progress").with_id(&lang)))
        }
    }
}

pub async fn save_progress(
    State(state): State<AppState>,
    Path(lang): Path<String>,
    Json(request): Json<SaveProgressRequest>,
) -> ApiResult<CurriculumProgress> {
    log_api_start!("save_progress", language = lang);

    match state.session_service.save_curriculum_progress(&lang, request.items).await {
        Ok(progress) => {
            log_api_success!("save_progress", count = progress.items.len(), "progress saved");
            Ok(Json(ApiResponse::success(progress)))
        }
        Err(e) => Err(api_error!(database, "save_progress", "curriculum_progress", e)),
    }
}

// Session endpoints

pub async fn end_session(
    State(state): State<AppState>,
    Json(request): Json<EndSessionRequest>,
) -> ApiResult<Option<SessionMemory>> {
    log_api_start!("end_session", language = request.language);

    if request.messages.is_empty() {
        log_api_warn!("end_session", language = request.language, "no messages, nothing saved");
    }

    match state
        .session_service
        .end_session(request.messages, request.language, request.personality_id)
        .await
    {
        Ok(session) => {
            if let Some(session) = &session {
                log_api_success!("end_session", session_id = session.id, "session saved");
            }
            Ok(Json(ApiResponse::success(session)))
        }
        Err(e) => {
            log_api_error!("end_session", error = e, "failed to save session");
            Err(api_error!(database, "end_session", "session", e))
        }
    }
}

pub async fn get_all_sessions(State(state): State<AppState>) -> ApiResult<Vec<SessionMemory>> {
    log_api_start!("get_all_sessions");

    match state.session_service.get_all_sessions().await {
        Ok(sessions) => {
            log_api_success!("get_all_sessions", count = sessions.len(), "sessions retrieved");
            Ok(Json(ApiResponse::success(sessions)))
        }
        Err(e) => Err(ApiError::DatabaseError(e).to_response_with_context(ErrorContext::new("get_all_sessions", "session"))),
    }
}

pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<SessionMemory> {
    log_api_start!("get_session", session_id = id);

    match state.session_service.get_session(&id).await {
        Ok(Some(session)) => {
            log_api_success!("get_session", session_id = id, "session retrieved");
            Ok(Json(ApiResponse::success(session)))
        }
        Ok(None) => Err(api_error!(not_found, "get_session", "session", &id)),
        Err(e) => {
            log_api_error!("get_session", session_id = id, error = e, "database error retrieving session");
            Err(ApiError::DatabaseError(e)
                .to_response_with_context(ErrorContext::new("get_session", "session").with_id(&id)))
        }
    }
}

pub async fn get_latest_session(
    State(state): State<AppState>,
    Path(lang): Path<String>,
) -> ApiResult<Option<SessionMemory>> {
    log_api_start!("get_latest_session", language = lang);

    match state.session_service.get_latest_session(&lang).await {
        Ok(session) => Ok(Json(ApiResponse::success(session))),
        Err(e) => Err(ApiError::DatabaseError(e)
            .to_response_with_context(ErrorContext::new("get_latest_session", "session").with_id(&lang))),
    }
}

// Profile endpoints

pub async fn get_profile(State(state): State<AppState>) -> ApiResult<Option<UserProfile>> {
    match state.session_service.get_user_profile().await {
        Ok(profile) => Ok(Json(ApiResponse::success(profile))),
        Err(e) => Err(ApiError::DatabaseError(e).to_response_with_context(ErrorContext::new("get_profile", "profile"))),
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    Json(update): Json<UserProfileUpdate>,
) -> ApiResult<UserProfile> {
    log_api_start!("update_profile");

    match state.session_service.update_user_profile(update).await {
        Ok(profile) => {
            log_api_success!("update_profile", "profile updated");
            Ok(Json(ApiResponse::success(profile)))
        }
        Err(e) => Err(api_error!(database, "update_profile", "profile", e)),
    }
}

// User endpoints

pub async fn register_user(
    State(state): State<AppState>,
    Json(mut request): Json<RegisterUserRequest>,
) -> ApiResult<User> {
    request.email = request.email.trim().to_string();
    let email = request.email.as_str();
    if email.is_empty() || !email.contains('@') {
        return Err(api_error!(validation, "register_user", "user", "a valid email is required"));
    }
    if request.name.trim().is_empty() {
        return Err(api_error!(validation, "register_user", "user", "name is required"));
    }

    info!(email = %email, "Registering user");

    let context = ErrorContext::new("register_user", "user").with_id(email);
    match state.session_service.register_user(request).await {
        Ok(user) => {
            log_api_success!("register_user", "user registered");
            Ok(Json(ApiResponse::success(user)))
        }
        Err(e) => Err(classify_database_error(&e).to_response_with_context(context)),
    }
}

pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> ApiResult<User> {
    log_api_start!("login");

    let user = match state.session_service.get_user(&request.email).await {
        Ok(user) => user,
        Err(e) => return Err(api_error!(database, "login", "user", e)),
    };

    match user {
        Some(user)
            if user
                .password_hash
                .as_deref()
                .is_some_and(|stored| verify_password(&request.password, stored)) =>
        {
            log_api_success!("login", "user authenticated");
            Ok(Json(ApiResponse::success(user)))
        }
        _ => Err(ApiError::Unauthorized(request.email.clone())
            .to_response_with_context(ErrorContext::new("login", "user").with_id(&request.email))),
    }
}

pub async fn get_user(State(state): State<AppState>, Path(email): Path<String>) -> ApiResult<User> {
    match state.session_service.get_user(&email).await {
        Ok(Some(user)) => Ok(Json(ApiResponse::success(user))),
        Ok(None) => Err(api_error!(not_found, "get_user", "user", &email)),
        Err(e) => Err(api_error!(database, "get_user", "user", e)),
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<User> {
    match state.session_service.update_user(&email, request).await {
        Ok(Some(user)) => {
            log_api_success!("update_user", "user updated");
            Ok(Json(ApiResponse::success(user)))
        }
        Ok(None) => Err(api_error!(not_found, "update_user", "user", &email)),
        Err(e) => Err(api_error!(database, "update_user", "user", e)),
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Tutor routes
        .route("/api/chat", post(chat))
        .route("/api/translate", post(translate))
        .route("/api/summary", post(summary))
        .route("/api/prompt", post(prompt))
        .route("/api/translate-ui", post(translate_ui))

        // Catalog routes
        .route("/api/personalities", get(get_personalities))
        .route("/api/personalities/:id", get(get_personality))
        .route("/api/curriculum/:lang", get(get_curriculum))
        .route("/api/progress/:lang", get(get_progress).put(save_progress))

        // Session memory routes
        .route("/api/sessions", get(get_all_sessions))
        .route("/api/sessions/end", post(end_session))
        .route("/api/sessions/latest/:lang", get(get_latest_session))
        .route("/api/sessions/:id", get(get_session))

        // Profile and user routes
        .route("/api/profile", get(get_profile).put(update_profile))
        .route("/api/users", post(register_user))
        .route("/api/users/login", post(login))
        .route("/api/users/:email", get(get_user).put(update_user))

        .with_state(state)
}
