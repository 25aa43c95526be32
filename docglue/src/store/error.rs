//! Store error types
//!
//! Two layers of errors meet here:
//!
//! - [`BackendError`] is what a [`DocumentStore`](super::DocumentStore) reports.
//!   It keeps the driver's detail and is only ever logged.
//! - [`StoreError`] is what [`DocumentClient`](super::DocumentClient) returns.
//!   Its `Display` is the terse message alone.
//!
//! ```rust
//! use docglue::store::{StoreError, StoreErrorKind, StoreOperation};
//!
//! let error = StoreError::new(
//!     StoreOperation::Delete,
//!     StoreErrorKind::Driver,
//!     "unexpected error when deleting objects in mongo",
//! );
//! assert_eq!(error.to_string(), "unexpected error when deleting objects in mongo");
//! ```

use std::fmt;

use thiserror::Error;

use crate::context::Interrupted;

/// Operation being performed when the store error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// Inserting one document
    Insert,
    /// Inserting many documents
    InsertMany,
    /// Replacing one document
    Replace,
    /// Finding one document
    Find,
    /// Listing documents
    List,
    /// Running an aggregation pipeline
    Aggregate,
    /// Find-and-update of one document
    Update,
    /// Updating many documents
    UpdateMany,
    /// Deleting documents
    Delete,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::InsertMany => write!(f, "insert_many"),
            Self::Replace => write!(f, "replace"),
            Self::Find => write!(f, "find"),
            Self::List => write!(f, "list"),
            Self::Aggregate => write!(f, "aggregate"),
            Self::Update => write!(f, "update"),
            Self::UpdateMany => write!(f, "update_many"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Category of store error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// The store rejected or failed the call
    Driver,
    /// The element could not be encoded as a document
    Encode,
    /// A stored document could not be decoded as the element type
    Decode,
    /// Fewer documents were acknowledged than were sent
    PartialInsert,
    /// The request context was cancelled
    Cancelled,
    /// The request context's deadline passed
    DeadlineExceeded,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver => write!(f, "driver"),
            Self::Encode => write!(f, "encode"),
            Self::Decode => write!(f, "decode"),
            Self::PartialInsert => write!(f, "partial_insert"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline_exceeded"),
        }
    }
}

impl From<Interrupted> for StoreErrorKind {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => Self::Cancelled,
            Interrupted::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Message-only failure returned by [`DocumentClient`](super::DocumentClient).
///
/// The full cause was logged where it was detected; this value only says which
/// operation failed and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    /// The operation being performed
    pub operation: StoreOperation,
    /// The category of failure
    pub kind: StoreErrorKind,
    /// Human-readable message
    pub message: String,
}

impl StoreError {
    /// Create a new store error
    pub fn new(
        operation: StoreOperation,
        kind: StoreErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
        }
    }

    /// Whether the caller's context stopped the call
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::Cancelled | StoreErrorKind::DeadlineExceeded
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StoreError {}

/// Error reported by a [`DocumentStore`](super::DocumentStore) implementation
#[derive(Debug, Error)]
pub enum BackendError {
    /// MongoDB driver error
    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),

    /// The store could not serve the request
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The request uses something the store does not implement
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Result of a [`DocumentStore`](super::DocumentStore) call
pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_operation_display() {
        assert_eq!(StoreOperation::Insert.to_string(), "insert");
        assert_eq!(StoreOperation::InsertMany.to_string(), "insert_many");
        assert_eq!(StoreOperation::UpdateMany.to_string(), "update_many");
        assert_eq!(StoreOperation::Delete.to_string(), "delete");
    }

    #[test]
    fn test_display_is_message_only() {
        let error = StoreError::new(
            StoreOperation::Find,
            StoreErrorKind::Decode,
            "unexpected error when decoding object found in mongo",
        );
        assert_eq!(
            error.to_string(),
            "unexpected error when decoding object found in mongo"
        );
    }

    #[test]
    fn test_interrupted_kinds() {
        assert_eq!(
            StoreErrorKind::from(Interrupted::Cancelled),
            StoreErrorKind::Cancelled
        );
        let error = StoreError::new(
            StoreOperation::List,
            Interrupted::DeadlineExceeded.into(),
            "timed out",
        );
        assert!(error.is_interrupted());
        assert!(!StoreError::new(StoreOperation::List, StoreErrorKind::Driver, "x").is_interrupted());
    }

    #[test]
    fn test_backend_error_display() {
        assert_eq!(
            BackendError::Unavailable("connection reset".to_string()).to_string(),
            "store unavailable: connection reset"
        );
    }
}
