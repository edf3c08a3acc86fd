//! Error types for the stub backend.
//!
//! [`StubError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the stub API layer.
#[derive(Debug, thiserror::Error)]
pub enum StubError {
    /// No credential was presented for a protected endpoint.
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    /// A credential was presented but does not match.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A simulated outage is active.
    #[error("backend unavailable (simulated {0})")]
    Outage(u16),
}

impl IntoResponse for StubError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingCredentials(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidCredentials(_) => StatusCode::FORBIDDEN,
            Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Outage(code) => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
            }
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
