use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::workflow::WorkflowError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) | AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::Workflow(WorkflowError::Unauthorized(_)) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::Workflow(WorkflowError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::Workflow(WorkflowError::AlreadyResolved) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable `error` field of the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) | AppError::Workflow(WorkflowError::Unauthorized(_)) => "forbidden",
            AppError::NotFound(_) | AppError::Workflow(WorkflowError::NotFound(_)) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Workflow(WorkflowError::AlreadyResolved) => "already_resolved",
            AppError::BadRequest(_) => "bad_request",
            AppError::Configuration(_) => "configuration",
            AppError::Token(_) => "token",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(err) => tracing::error!(error = %err, "database error"),
            AppError::Internal(message) => tracing::error!(%message, "internal error"),
            _ => {}
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };

        (self.status_code(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_http_statuses() {
        let cases = [
            (AppError::from(WorkflowError::AlreadyResolved), StatusCode::CONFLICT),
            (AppError::from(WorkflowError::Unauthorized("not a member".into())), StatusCode::FORBIDDEN),
            (AppError::from(WorkflowError::NotFound("validation")), StatusCode::NOT_FOUND),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn already_resolved_has_its_own_kind() {
        assert_eq!(AppError::from(WorkflowError::AlreadyResolved).kind(), "already_resolved");
        assert_eq!(AppError::conflict("taken").kind(), "conflict");
        assert_eq!(AppError::token("expired").status_code(), StatusCode::UNAUTHORIZED);
    }
}
