//! The document-store protocol boundary

use std::fmt;

use async_trait::async_trait;
use bson::Document;
use mongodb::options::{FindOneAndUpdateOptions, UpdateOptions};

use super::error::BackendResult;

/// Database and collection a typed client is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
}

impl Namespace {
    /// Create a namespace
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Counts reported by replace and multi-document update calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    /// Documents matched by the filter
    pub matched: u64,
    /// Documents actually changed
    pub modified: u64,
    /// Whether a new document was inserted because nothing matched
    pub upserted: bool,
}

/// Raw document operations against an external store.
///
/// Filters, updates, sort specifications and pipelines are driver-native
/// documents and are passed through unchanged. Implementations must be safe
/// for concurrent use.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert one document; `Ok(false)` means the store did not acknowledge it.
    async fn insert_one(&self, ns: &Namespace, document: Document) -> BackendResult<bool>;

    /// Insert documents; returns how many the store acknowledged.
    async fn insert_many(&self, ns: &Namespace, documents: Vec<Document>) -> BackendResult<usize>;

    /// Replace the first document matching `filter`.
    async fn replace_one(
        &self,
        ns: &Namespace,
        filter: Document,
        replacement: Document,
        upsert: bool,
    ) -> BackendResult<WriteCounts>;

    /// First document matching `filter`.
    async fn find_one(&self, ns: &Namespace, filter: Document) -> BackendResult<Option<Document>>;

    /// Every document matching `filter`, ordered by `sort` when given.
    async fn find(
        &self,
        ns: &Namespace,
        filter: Document,
        sort: Option<Document>,
    ) -> BackendResult<Vec<Document>>;

    /// Output of an aggregation pipeline.
    async fn aggregate(&self, ns: &Namespace, pipeline: Vec<Document>)
        -> BackendResult<Vec<Document>>;

    /// Atomically find and update the first match; `None` when nothing matched
    /// and nothing was upserted.
    async fn find_one_and_update(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: FindOneAndUpdateOptions,
    ) -> BackendResult<Option<Document>>;

    /// Update every match.
    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> BackendResult<WriteCounts>;

    /// Delete every match; returns the deleted count.
    async fn delete_many(&self, ns: &Namespace, filter: Document) -> BackendResult<u64>;
}
