use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use super::validation::FieldError;
use crate::services::AuthError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ValidationError(String),

    /// Per-field form errors, returned to the client as the response data.
    FieldErrors(Vec<FieldError>),

    InternalError(String),

    /// No principal, or credentials were presented and did not resolve.
    Unauthorized(String),

    /// A principal was resolved but lacks the capability.
    Forbidden(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::FieldErrors(errors) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                write!(f, "Invalid fields: {}", fields.join(", "))
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::FieldErrors(errors) => {
                let body = ApiResponse {
                    success: false,
                    data: Some(errors),
                    error: Some("Validation failed".to_string()),
                };
                return (StatusCode::BAD_REQUEST, Json(body)).into_response();
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::Unauthenticated => ApiError::unauthorized(),
            AuthError::DuplicateEmail => ApiError::FieldErrors(vec![FieldError::new(
                "email",
                "Email already registered",
            )]),
            AuthError::DuplicateUsername => ApiError::FieldErrors(vec![FieldError::new(
                "username",
                "Username already in use",
            )]),
            AuthError::UserNotFound => ApiError::NotFound("User not found".to_string()),
            AuthError::Validation(msg) => ApiError::ValidationError(msg),
            AuthError::Forbidden => ApiError::forbidden("Insufficient permissions"),
            AuthError::Database(msg) => ApiError::DatabaseError(msg),
            err @ (AuthError::Credential(_) | AuthError::Token(_) | AuthError::Internal(_)) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("{} {} not found", resource, id))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Invalid credentials".to_string())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_codes() {
        assert_eq!(render(ApiError::unauthorized()).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(render(ApiError::forbidden("no")).await.0, StatusCode::FORBIDDEN);
        assert_eq!(render(ApiError::not_found("Post", 3)).await.0, StatusCode::NOT_FOUND);
        assert_eq!(render(ApiError::validation("bad")).await.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_internal_details_are_masked() {
        let (status, body) = render(ApiError::internal("secret stack trace")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_field_error() {
        let (status, body) = render(AuthError::DuplicateEmail.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"][0]["field"], "email");
        assert_eq!(body["data"][0]["message"], "Email already registered");
    }

    #[tokio::test]
    async fn test_invalid_credentials_is_unauthorized() {
        let (status, body) = render(AuthError::InvalidCredentials.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");
    }
}
