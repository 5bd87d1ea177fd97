//! HTTP error mapping.
//!
//! Domain errors become an [`AppError`] carrying a status code and a stable
//! machine-readable code. Policy rejections keep their own codes
//! (`ROLE_FULL`, `ROLE_CAP_EXCEEDED`, ...) so clients can tell them apart.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use signup_notifications::FeedError;
use signup_registration::RegistrationError;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(actor: CurrentActor) -> Result<Json<BellList>, AppError> {
///     let bells = state.feed.list_bells(actor.id).await?;
///     Ok(Json(bells))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: &'static str,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, code: &'static str, message: String) -> Self {
        Self {
            status,
            message,
            code,
        }
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message.into())
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message.into())
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message.into())
    }

    /// 422 Unprocessable Entity.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message.into())
    }

    /// 500 Internal Server Error. The message is logged, not returned.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            message.into(),
        )
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                code = self.code,
                message = %self.message,
                "Internal server error"
            );
            "An internal error occurred".to_string()
        } else {
            self.message
        };

        let body = ErrorResponse {
            code: self.code,
            message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        let message = err.to_string();
        match err {
            RegistrationError::Validation(_) => Self::validation(message),
            RegistrationError::EventClosed(_) => Self::new(StatusCode::CONFLICT, "EVENT_CLOSED", message),
            RegistrationError::RoleFull { .. } => Self::new(StatusCode::CONFLICT, "ROLE_FULL", message),
            RegistrationError::DuplicateRegistration(_) => {
                Self::new(StatusCode::CONFLICT, "DUPLICATE_REGISTRATION", message)
            }
            RegistrationError::RoleCapExceeded => {
                Self::new(StatusCode::CONFLICT, "ROLE_CAP_EXCEEDED", message)
            }
            RegistrationError::Unauthorized(_) => Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message),
            RegistrationError::EventNotFound(_)
            | RegistrationError::RoleNotFound(_)
            | RegistrationError::RegistrationNotFound(_) => Self::not_found(message),
            RegistrationError::InvariantViolation(_) | RegistrationError::Store(_) => {
                Self::internal(message)
            }
        }
    }
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        let message = err.to_string();
        match err {
            FeedError::NotFound(_) => Self::not_found(message),
            FeedError::Validation(_) => Self::bad_request(message),
            FeedError::Database(_) => Self::internal(message),
        }
    }
}
