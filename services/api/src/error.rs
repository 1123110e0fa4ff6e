//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered as an HTTP response (`{ "error": "..." }`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use santri_core::{DomainError, PortError};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A domain operation refused the request or failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error while running the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request body or query could not be understood.
    #[error("{0}")]
    BadRequest(String),

    /// No valid session accompanied the request.
    #[error("Authentication required")]
    Unauthenticated,

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The body of every failed response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Domain(err) => match err {
                DomainError::Validation(_) => StatusCode::BAD_REQUEST,
                DomainError::Authorization(_) => StatusCode::FORBIDDEN,
                DomainError::NotFound(_) => StatusCode::NOT_FOUND,
                DomainError::AlreadyReviewed(_) => StatusCode::CONFLICT,
                DomainError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Port(err) => match err {
                PortError::NotFound(_) => StatusCode::NOT_FOUND,
                PortError::Conflict(_) => StatusCode::CONFLICT,
                PortError::Unauthorized => StatusCode::UNAUTHORIZED,
                PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// The text shown to clients. Port errors carry their own message; the
    /// variant prefix of their `Display` is for logs only.
    fn client_message(&self) -> String {
        match self {
            ApiError::Port(PortError::NotFound(msg) | PortError::Conflict(msg)) => msg.clone(),
            ApiError::Port(PortError::Unauthorized) => "Authentication required".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            _ if status.is_server_error() => {
                error!("Request failed: {:?}", self);
                "Internal server error".to_string()
            }
            other => other.client_message(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, body["error"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn port_errors_render_their_own_message() {
        let (status, message) =
            render(PortError::Conflict("email already registered".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "email already registered");

        let (status, message) = render(PortError::NotFound("no such halaqoh".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "no such halaqoh");

        let (status, message) = render(PortError::Unauthorized.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message, "Authentication required");
    }

    #[tokio::test]
    async fn server_errors_are_masked() {
        let (status, message) =
            render(PortError::Unexpected("disk I/O error at /var/db".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }

    #[tokio::test]
    async fn domain_errors_keep_their_message() {
        let (status, message) =
            render(DomainError::Validation("surah must be between 1 and 114".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "surah must be between 1 and 114");
    }
}
