//! API Error Types
//!
//! Every failure leaves the API as `400 {"errors": [...]}` (or 500 for
//! server faults), one entry per problem, so clients can show all syntax and
//! argument problems of a statement at once.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::dto::ErrorResponse;
use crate::query::MqlError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request body could not be read
    #[error("Validation error: {0}")]
    Validation(String),

    /// Statement failed to parse, compile or execute
    #[error(transparent)]
    Query(#[from] MqlError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Query(MqlError::Syntax(_)) => (StatusCode::BAD_REQUEST, "SYNTAX_ERROR"),
            ApiError::Query(MqlError::Compile(_)) => (StatusCode::BAD_REQUEST, "COMPILE_ERROR"),
            ApiError::Query(MqlError::Remote(_)) => (StatusCode::BAD_REQUEST, "REMOTE_ERROR"),
            ApiError::Query(MqlError::Evaluation(_)) => {
                (StatusCode::BAD_REQUEST, "EVALUATION_ERROR")
            }
            ApiError::Query(MqlError::Timeout(_)) => (StatusCode::BAD_REQUEST, "TIMEOUT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }

    /// Messages for the `errors` array
    pub fn problems(&self) -> Vec<String> {
        match self {
            ApiError::Query(e) => e.problems(),
            other => vec![other.to_string()],
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "API error occurred"
        );

        let body = ErrorResponse {
            errors: self.problems(),
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
