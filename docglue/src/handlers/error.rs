//! Handler-level failures
//!
//! The store client has already logged the cause by the time a
//! [`HandlerError`] exists; it only carries a presentable message.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ErrorResponse;

/// Operation being performed when the handler error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerOperation {
    /// Creating an element
    Create,
    /// Fetching a single element
    Get,
    /// Listing elements
    List,
}

impl fmt::Display for HandlerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Get => write!(f, "get"),
            Self::List => write!(f, "list"),
        }
    }
}

impl HandlerOperation {
    /// Machine-readable code used in error responses
    #[must_use]
    pub fn error_code(&self) -> String {
        format!("{self}_failed").to_uppercase()
    }
}

/// Message-only failure of a [`CrudHandler`](super::CrudHandler) operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    /// The operation that failed
    pub operation: HandlerOperation,
    /// Presentable message naming the element kind
    pub message: String,
}

impl HandlerError {
    /// Create a handler error for `operation`
    pub fn new(operation: HandlerOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerError {}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let body = ErrorResponse::with_code(status, self.operation.error_code(), self.message);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(HandlerOperation::Create.error_code(), "CREATE_FAILED");
        assert_eq!(HandlerOperation::List.error_code(), "LIST_FAILED");
    }

    #[tokio::test]
    async fn test_into_response_is_json_500() {
        let error = HandlerError::new(HandlerOperation::Get, "unexpected error when fetching user");
        assert_eq!(error.to_string(), "unexpected error when fetching user");

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "unexpected error when fetching user");
        assert_eq!(json["code"], "GET_FAILED");
        assert_eq!(json["status"], 500);
    }
}
