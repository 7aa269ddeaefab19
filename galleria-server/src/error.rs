//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! Database errors are logged with full detail but only a generic message is
//! returned to the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::ai::{AiError, SubmitError};
use crate::entities::{is_foreign_key_violation, is_unique_violation};

/// All errors that can occur in the galleria-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A unique constraint rejected a create or rename.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing or wrong admin token.
    #[error("unauthorized")]
    Unauthorized,

    /// Generation queue full or workers stopped.
    #[error("backend not ready: {0}")]
    BackendNotReady(String),

    /// Propagated from a synchronous upstream call.
    #[error(transparent)]
    Ai(#[from] AiError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
            ServerError::BackendNotReady(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),

            // Upstream errors carry the upstream's own message.
            ServerError::Ai(e) => {
                let status = match e {
                    AiError::MissingCredentials => StatusCode::SERVICE_UNAVAILABLE,
                    AiError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
                    AiError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                };
                (status, e.to_string())
            }

            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl ServerError {
    /// Map constraint violations from a write to client errors: a UNIQUE
    /// violation becomes `Conflict(conflict)`, a FOREIGN KEY violation becomes
    /// `NotFound(missing)`. Anything else stays a database error.
    pub fn from_write(e: sqlx::Error, conflict: &str, missing: &str) -> Self {
        if is_unique_violation(&e) {
            ServerError::Conflict(conflict.to_owned())
        } else if is_foreign_key_violation(&e) {
            ServerError::NotFound(missing.to_owned())
        } else {
            ServerError::Database(e)
        }
    }
}

impl From<SubmitError> for ServerError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::QueueFull | SubmitError::Closed => {
                ServerError::BackendNotReady(e.to_string())
            }
            SubmitError::Database(e) => ServerError::Database(e),
        }
    }
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(e: validator::ValidationErrors) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (ServerError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServerError::Conflict("x".into()), StatusCode::CONFLICT),
            (ServerError::Unauthorized, StatusCode::UNAUTHORIZED),
            (SubmitError::QueueFull.into(), StatusCode::SERVICE_UNAVAILABLE),
            (AiError::MissingCredentials.into(), StatusCode::SERVICE_UNAVAILABLE),
            (AiError::GenerationFailed("x".into()).into(), StatusCode::BAD_GATEWAY),
            (
                AiError::GenerationTimeout(Duration::from_secs(60)).into(),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (sqlx::Error::RowNotFound.into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
