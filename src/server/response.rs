//! JSON response envelope and error mapping
//!
//! Successful responses look like `{"success": true, "message": ..., "data": ...}`,
//! failures like `{"success": false, "error": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AuthError, TaskError};

/// Message returned to rate limited clients
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please try again later.";

/// Message returned for every authentication failure on protected routes
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Success envelope with an explicit status code
pub fn respond<T: Serialize>(status: StatusCode, body: ApiResponse<T>) -> Response {
    (status, Json(body)).into_response()
}

/// Error envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// HTTP error response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE)
    }

    pub fn rate_limited() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_MESSAGE)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, err.to_string())
            }
            AuthError::EmailTaken => Self::new(StatusCode::CONFLICT, err.to_string()),
            AuthError::MissingAuth
            | AuthError::UnsupportedScheme
            | AuthError::Token(_)
            | AuthError::UnknownUser => Self::unauthorized(),
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            TaskError::Validation(e) => Self::bad_request(e.to_string()),
            TaskError::Database(e) => {
                tracing::error!(error = %e, "Task storage failure");
                Self::internal()
            }
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Auth(e) => e.into(),
            AppError::Validation(e) => Self::bad_request(e.to_string()),
            AppError::Task(e) => e.into(),
            AppError::Hash(_)
            | AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal(_) => {
                tracing::error!(error = %err, "Request failed");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
