//! Error types for whalewhisper-relay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::providers::CatalogError;

/// Result type alias for whalewhisper-relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the HTTP surface.
///
/// Chat relay and provider validation never produce these: their failures
/// are values (an SSE error frame or a validation result).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("{0}")]
    Catalog(#[from] CatalogError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Catalog(CatalogError::MissingBaseUrl) => StatusCode::BAD_REQUEST,
            Error::Catalog(CatalogError::Http(_)) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": "relay_error",
                "code": status.as_u16()
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
