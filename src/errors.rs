use crate::api::ApiResponse;
use axum::{http::StatusCode, response::Json};
use tracing::{error, info, warn};

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),

    #[error("LLM service error: {0}")]
    LLMError(String),

    #[error("Resource already exists: {0}")]
    DuplicateResource(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub user_friendly_message: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
            user_friendly_message: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn with_user_message(mut self, message: &str) -> Self {
        self.user_friendly_message = Some(message.to_string());
        self
    }
}

pub type ErrorResponse = (StatusCode, Json<ApiResponse<()>>);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateResource(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::LLMError(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client; internal detail stays in the logs
    fn client_message(&self, resource_type: &str, override_message: Option<String>) -> String {
        match self {
            ApiError::NotFound(_) => override_message.unwrap_or_else(|| format!("{} not found", resource_type)),
            ApiError::LLMError(_) => override_message
                .unwrap_or_else(|| "AI service temporarily unavailable. Please try again.".to_string()),
            ApiError::ValidationError(_) | ApiError::DuplicateResource(_) => self.to_string(),
            // Same answer for unknown email and wrong password
            ApiError::Unauthorized(_) => "Invalid email or password".to_string(),
            ApiError::DatabaseError(_) => "Database operation failed. Please try again.".to_string(),
        }
    }

    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(self, context: ErrorContext) -> ErrorResponse {
        let status = self.status();
        let operation = context.operation.as_str();
        let resource_type = context.resource_type.as_str();
        let resource_id = context.resource_id.as_deref();

        match &self {
            ApiError::NotFound(_) => {
                info!(operation, resource_type, resource_id, error = %self, "Resource not found")
            }
            ApiError::Unauthorized(_) => warn!(operation, resource_type, "Rejected credentials"),
            ApiError::ValidationError(_) | ApiError::DuplicateResource(_) => {
                warn!(operation, resource_type, resource_id, error = %self, "Request rejected")
            }
            ApiError::LLMError(_) | ApiError::DatabaseError(_) => {
                error!(operation, resource_type, resource_id, error = %self, status = status.as_u16(), "Request failed")
            }
        }

        let message = self.client_message(resource_type, context.user_friendly_message.clone());
        (status, Json(ApiResponse::error(message)))
    }
}

/// Helper macro for structured error logging
#[macro_export]
macro_rules! api_error {
    (not_found, $operation:expr, $resource_type:expr, $id:expr) => {
        $crate::errors::ApiError::NotFound(format!("{} with id '{}' not found", $resource_type, $id))
            .to_response_with_context(
                $crate::errors::ErrorContext::new($operation, $resource_type).with_id($id),
            )
    };

    (validation, $operation:expr, $resource_type:expr, $message:expr) => {
        $crate::errors::ApiError::ValidationError($message.to_string())
            .to_response_with_context($crate::errors::ErrorContext::new($operation, $resource_type))
    };

    (database, $operation:expr, $resource_type:expr, $error:expr) => {
        $crate::errors::classify_database_error(&$error)
            .to_response_with_context($crate::errors::ErrorContext::new($operation, $resource_type))
    };

    (llm, $operation:expr, $resource_type:expr, $message:expr) => {
        $crate::errors::ApiError::LLMError($message.to_string())
            .to_response_with_context($crate::errors::ErrorContext::new($operation, $resource_type))
    };
}

/// Helper function to detect error types from anyhow error messages
pub fn classify_database_error(error: &anyhow::Error) -> ApiError {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("already exists") || error_str.contains("unique constraint") {
        ApiError::DuplicateResource("Resource already exists".to_string())
    } else if error_str.contains("not found") || error_str.contains("no rows") {
        ApiError::NotFound("Resource not found".to_string())
    } else if error_str.contains("required") || error_str.contains("cannot be null") {
        ApiError::ValidationError("Required field is missing or invalid".to_string())
    } else {
        ApiError::DatabaseError(anyhow::anyhow!("{}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("get_session", "session")
            .with_id("abc")
            .with_user_message("Custom message");

        assert_eq!(context.operation, "get_session");
        assert_eq!(context.resource_type, "session");
        assert_eq!(context.resource_id, Some("abc".to_string()));
        assert_eq!(context.user_friendly_message, Some("Custom message".to_string()));
    }

    #[test]
    fn test_error_classification() {
        let duplicate_error = anyhow::anyhow!("UNIQUE constraint failed: users.email");
        assert!(matches!(
            classify_database_error(&duplicate_error),
            ApiError::DuplicateResource(_)
        ));

        let not_found_error = anyhow::anyhow!("No rows returned");
        assert!(matches!(classify_database_error(&not_found_error), ApiError::NotFound(_)));

        let other = anyhow::anyhow!("disk I/O error");
        assert!(matches!(classify_database_error(&other), ApiError::DatabaseError(_)));
    }

    #[test]
    fn test_api_error_responses() {
        let (status, body) = ApiError::NotFound("Session not found".to_string())
            .to_response_with_context(ErrorContext::new("get_session", "session").with_id("abc"));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.0.error.as_deref(), Some("session not found"));

        let context = || ErrorContext::new("register_user", "user");

        let (status, _) = ApiError::ValidationError("Invalid data".to_string()).to_response_with_context(context());
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = ApiError::DuplicateResource("Already exists".to_string()).to_response_with_context(context());
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = ApiError::LLMError("all models failed".to_string()).to_response_with_context(context());
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = ApiError::Unauthorized("ana@example.com".to_string()).to_response_with_context(context());
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.0.error.as_deref(), Some("Invalid email or password"));
        assert!(!body.0.success);
    }
}
