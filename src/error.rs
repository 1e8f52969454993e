use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Entity kinds that can be reported as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A catalog book.
    Book,
    /// A book review.
    Review,
    /// A user account.
    User,
}

impl Resource {
    fn code(self) -> &'static str {
        match self {
            Resource::Book => "NOT_EXIST_BOOK",
            Resource::Review => "NOT_EXIST_REVIEW",
            Resource::User => "NOT_EXIST_USER",
        }
    }
}

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// A required field is missing from the request.
    #[error("Missing required field")]
    KeyError,

    /// Request input failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Review contents exceed the allowed length.
    #[error("Review contents too long")]
    LongContents,

    /// Referenced entity does not exist.
    #[error("{0:?} does not exist")]
    NotExist(Resource),

    /// Listing produced no books.
    #[error("No books matched")]
    NoBooks,

    /// Bearer token is unknown or expired.
    #[error("Invalid or expired access token")]
    InvalidAccessToken,

    /// Third-party provider rejected the token.
    #[error("Provider rejected token")]
    InvalidToken,

    /// Authenticated user may not touch this resource.
    #[error("Unauthorized")]
    Unauthorized,

    /// Registration is turned off in the config.
    #[error("Registration is disabled")]
    RegistrationDisabled,

    /// Resource already exists. Carries the response code.
    #[error("Conflict: {0}")]
    Conflict(&'static str),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and response code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::KeyError => (StatusCode::BAD_REQUEST, "KEY_ERROR"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            AppError::LongContents => (StatusCode::BAD_REQUEST, "LONG_CONTENTS"),
            AppError::NotExist(resource) => (StatusCode::BAD_REQUEST, resource.code()),
            AppError::NoBooks => (StatusCode::BAD_REQUEST, "NO_BOOKS"),
            AppError::InvalidAccessToken => (StatusCode::BAD_REQUEST, "INVALID_ACCESS_TOKEN"),
            AppError::InvalidToken => (StatusCode::BAD_REQUEST, "INVALID_TOKEN"),
            AppError::Unauthorized => (StatusCode::FORBIDDEN, "UNAUTHORIZED"),
            AppError::RegistrationDisabled => (StatusCode::FORBIDDEN, "REGISTRATION_DISABLED"),
            AppError::Conflict(code) => (StatusCode::CONFLICT, code),
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        } else {
            tracing::debug!(error = %self, code, "Request rejected");
        }

        (status, Json(json!({ "message": code }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(_) => AppError::KeyError,
            other => AppError::InvalidRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotExist(Resource::Book).status_and_code(),
            (StatusCode::BAD_REQUEST, "NOT_EXIST_BOOK")
        );
        assert_eq!(
            AppError::Unauthorized.status_and_code(),
            (StatusCode::FORBIDDEN, "UNAUTHORIZED")
        );
        assert_eq!(
            AppError::Conflict("ALREADY_EXIST").status_and_code(),
            (StatusCode::CONFLICT, "ALREADY_EXIST")
        );
        assert_eq!(
            AppError::Internal("boom".to_string()).status_and_code().1,
            "INTERNAL_ERROR"
        );
    }
}
