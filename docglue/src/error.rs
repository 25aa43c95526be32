//! Error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-level error for configuration, bootstrap and I/O failures.
///
/// Store and handler operations have their own message-only errors
/// ([`StoreError`](crate::store::StoreError),
/// [`HandlerError`](crate::handlers::HandlerError)).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Could not establish or verify the document-store connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// A configured value is not a valid HTTP header value
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            status: status.as_u16(),
        }
    }

    /// Create error response with a code
    pub fn with_code(
        status: StatusCode,
        code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let code = match &self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Connection(_) => "CONNECTION_ERROR",
            Error::InvalidHeader(_) => "INVALID_HEADER",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
        };

        tracing::error!(code, "{}", self);

        // Internal details stay in the log
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let body = ErrorResponse::with_code(status, code, "Internal server error");
        (status, Json(body)).into_response()
    }
}
