//! Typed document-store client
//!
//! [`DocumentClient<T>`] binds one element type to one database/collection pair
//! on a shared [`DocumentStore`]. Every method returns one of three outcomes:
//! data, explicit absence (`None`, `false`, `0`), or a [`StoreError`]. Failures
//! are logged once here with the query, payload and collection, and returned
//! message-only.
//!
//! # Example
//!
//! ```rust,ignore
//! use docglue::prelude::*;
//!
//! let store: Arc<dyn DocumentStore> = Arc::new(MongoStore::new(connect(&config.mongodb).await?));
//! let users = DocumentClient::<User>::new(store, "shop", "users");
//!
//! users.insert(&user, &ctx).await?;
//! let found = users.find(doc! { "email": &user.email }, &ctx).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions};
use serde::{de::DeserializeOwned, Serialize};

use super::backend::{DocumentStore, Namespace};
use super::error::{BackendResult, StoreError, StoreErrorKind, StoreOperation};
use super::sort::Sort;
use crate::context::{Interrupted, RequestContext};
use crate::logging::{LogFields, Logger};

const INSERT_FAILED: &str = "unexpected error when inserting object into mongo";
const REPLACE_FAILED: &str = "unexpected error when replacing object in mongo";
const ENCODE_FAILED: &str = "unexpected error when encoding object for mongo";
const FIND_FAILED: &str = "unexpected error when finding object in mongo";
const FIND_DECODE_FAILED: &str = "unexpected error when decoding object found in mongo";
const LIST_FAILED: &str = "unexpected error when finding objects in mongo";
const AGGREGATE_FAILED: &str = "unexpected error when finding objects in mongo using pipeline";
const AGGREGATE_DECODE_FAILED: &str =
    "unexpected error when decoding object found in mongo using pipeline";
const UPDATE_FAILED: &str = "unexpected error when updating object in mongo";
const UPDATE_DECODE_FAILED: &str = "unexpected error when decoding object updated in mongo";
const DELETE_FAILED: &str = "unexpected error when deleting objects in mongo";
const NO_DOCUMENTS: &str = "no documents found for given query";

/// Result of a single-document update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome<T> {
    /// The document the store returned (post-update unless options say otherwise)
    pub document: Option<T>,
    /// Whether an existing document matched, or one was upserted
    pub matched: bool,
}

impl<T> UpdateOutcome<T> {
    fn unmatched() -> Self {
        Self {
            document: None,
            matched: false,
        }
    }
}

/// Result of a multi-document update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateManyOutcome {
    /// Documents actually changed
    pub modified: u64,
    /// Whether anything matched the filter, or a document was upserted
    pub matched: bool,
}

/// Typed client over one collection
pub struct DocumentClient<T> {
    store: Arc<dyn DocumentStore>,
    namespace: Namespace,
    logger: Logger,
    _element: PhantomData<fn() -> T>,
}

impl<T> Clone for DocumentClient<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            namespace: self.namespace.clone(),
            logger: self.logger.clone(),
            _element: PhantomData,
        }
    }
}

impl<T> fmt::Debug for DocumentClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentClient")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl<T> DocumentClient<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Bind `T` to `database.collection` on `store`, logging through `tracing`
    pub fn new(
        store: Arc<dyn DocumentStore>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            namespace: Namespace::new(database, collection),
            logger: Logger::default(),
            _element: PhantomData,
        }
    }

    /// Replace the logger
    #[must_use]
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// The bound database and collection
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The logger failures are reported to
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Insert one element. `Ok(false)` means the store did not acknowledge it.
    pub async fn insert(&self, element: &T, ctx: &RequestContext) -> Result<bool, StoreError> {
        let fields = || self.fields().with("objectToInsert", element);
        let document = self.encode(StoreOperation::Insert, element, &fields, ctx)?;

        self.exec(
            ctx,
            StoreOperation::Insert,
            INSERT_FAILED,
            &fields,
            self.store.insert_one(&self.namespace, document),
        )
        .await
    }

    /// Replace the first element matching `query`. Returns whether one matched;
    /// with `upsert` a missing element is inserted.
    pub async fn replace(
        &self,
        query: Document,
        element: &T,
        upsert: bool,
        ctx: &RequestContext,
    ) -> Result<bool, StoreError> {
        let log_query = query.clone();
        let fields = || {
            self.fields()
                .with("query", &log_query)
                .with("replacement", element)
                .with("upsert", &upsert)
        };
        let document = self.encode(StoreOperation::Replace, element, &fields, ctx)?;

        let counts = self
            .exec(
                ctx,
                StoreOperation::Replace,
                REPLACE_FAILED,
                &fields,
                self.store
                    .replace_one(&self.namespace, query, document, upsert),
            )
            .await?;
        Ok(counts.matched > 0)
    }

    /// Insert every element. Fewer acknowledged insertions than elements is a
    /// failure even though the acknowledged ones were persisted.
    pub async fn insert_many(&self, elements: &[T], ctx: &RequestContext) -> Result<(), StoreError> {
        if elements.is_empty() {
            return Ok(());
        }

        let fields = || self.fields().with("objectsToInsert", elements);
        let documents = elements
            .iter()
            .map(|element| self.encode(StoreOperation::InsertMany, element, &fields, ctx))
            .collect::<Result<Vec<_>, _>>()?;

        let acknowledged = self
            .exec(
                ctx,
                StoreOperation::InsertMany,
                INSERT_FAILED,
                &fields,
                self.store.insert_many(&self.namespace, documents),
            )
            .await?;

        if acknowledged != elements.len() {
            let message = format!(
                "only able to insert {} out of {} objects",
                acknowledged,
                elements.len()
            );
            return Err(self.fail(
                ctx,
                StoreOperation::InsertMany,
                StoreErrorKind::PartialInsert,
                message,
                None,
                fields(),
            ));
        }
        Ok(())
    }

    /// First element matching `query`, or `None`.
    pub async fn find(&self, query: Document, ctx: &RequestContext) -> Result<Option<T>, StoreError> {
        let log_query = query.clone();
        let fields = || self.fields().with("query", &log_query);

        let found = self
            .exec(
                ctx,
                StoreOperation::Find,
                FIND_FAILED,
                &fields,
                self.store.find_one(&self.namespace, query),
            )
            .await?;

        match found {
            Some(document) => self
                .decode(StoreOperation::Find, document, FIND_DECODE_FAILED, &fields, ctx)
                .map(Some),
            None => {
                self.logger.info(NO_DOCUMENTS, fields(), Some(ctx));
                Ok(None)
            }
        }
    }

    /// Every element matching `query`, in the store's natural order.
    pub async fn list(&self, query: Document, ctx: &RequestContext) -> Result<Vec<T>, StoreError> {
        self.list_with_sort(query, &Sort::new(), ctx).await
    }

    /// Every element matching `query`, ordered by `sort` on the store side.
    pub async fn list_with_sort(
        &self,
        query: Document,
        sort: &Sort,
        ctx: &RequestContext,
    ) -> Result<Vec<T>, StoreError> {
        let sort_document = sort.to_document();
        let log_query = query.clone();
        let fields = || {
            self.fields()
                .with("query", &log_query)
                .with("sortOptions", &sort_document)
        };

        let documents = self
            .exec(
                ctx,
                StoreOperation::List,
                LIST_FAILED,
                &fields,
                self.store.find(
                    &self.namespace,
                    query,
                    (!sort.is_empty()).then(|| sort_document.clone()),
                ),
            )
            .await?;

        self.decode_all(StoreOperation::List, documents, FIND_DECODE_FAILED, &fields, ctx)
    }

    /// Run an aggregation pipeline and decode every produced document as `T`.
    pub async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        ctx: &RequestContext,
    ) -> Result<Vec<T>, StoreError> {
        let log_pipeline = pipeline.clone();
        let fields = || self.fields().with("pipeline", &log_pipeline);

        let documents = self
            .exec(
                ctx,
                StoreOperation::Aggregate,
                AGGREGATE_FAILED,
                &fields,
                self.store.aggregate(&self.namespace, pipeline),
            )
            .await?;

        self.decode_all(
            StoreOperation::Aggregate,
            documents,
            AGGREGATE_DECODE_FAILED,
            &fields,
            ctx,
        )
    }

    /// Atomically update the first match and return it as it is after the update.
    pub async fn update(
        &self,
        query: Document,
        update: Document,
        upsert: bool,
        ctx: &RequestContext,
    ) -> Result<UpdateOutcome<T>, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(upsert)
            .return_document(ReturnDocument::After)
            .build();
        self.update_with_options(query, update, options, ctx).await
    }

    /// Like [`update`](Self::update) with caller-chosen driver options.
    pub async fn update_with_options(
        &self,
        query: Document,
        update: Document,
        options: FindOneAndUpdateOptions,
        ctx: &RequestContext,
    ) -> Result<UpdateOutcome<T>, StoreError> {
        let upsert = options.upsert.unwrap_or(false);
        let (log_query, log_update) = (query.clone(), update.clone());
        let fields = || {
            self.fields()
                .with("query", &log_query)
                .with("update", &log_update)
                .with("upsert", &upsert)
        };

        let found = self
            .exec(
                ctx,
                StoreOperation::Update,
                UPDATE_FAILED,
                &fields,
                self.store
                    .find_one_and_update(&self.namespace, query, update, options),
            )
            .await?;

        match found {
            Some(document) => {
                let element =
                    self.decode(StoreOperation::Update, document, UPDATE_DECODE_FAILED, &fields, ctx)?;
                Ok(UpdateOutcome {
                    document: Some(element),
                    matched: true,
                })
            }
            None => {
                self.logger.info(NO_DOCUMENTS, fields(), Some(ctx));
                Ok(UpdateOutcome::unmatched())
            }
        }
    }

    /// Update every match with caller-chosen driver options.
    ///
    /// `Ok(false)` when the filter matched nothing, even if a document was upserted.
    pub async fn update_many_with_options(
        &self,
        query: Document,
        update: Document,
        options: UpdateOptions,
        ctx: &RequestContext,
    ) -> Result<bool, StoreError> {
        self.update_many_inner(query, update, options, false, ctx)
            .await
            .map(|outcome| outcome.matched)
    }

    /// Update every match; reports the modified count and whether anything matched.
    pub async fn update_many(
        &self,
        query: Document,
        update: Document,
        upsert: bool,
        ctx: &RequestContext,
    ) -> Result<UpdateManyOutcome, StoreError> {
        let options = UpdateOptions::builder().upsert(upsert).build();
        self.update_many_inner(query, update, options, true, ctx).await
    }

    /// Delete every match and return how many were deleted.
    pub async fn delete(&self, query: Document, ctx: &RequestContext) -> Result<u64, StoreError> {
        let log_query = query.clone();
        let fields = || self.fields().with("query", &log_query);

        self.exec(
            ctx,
            StoreOperation::Delete,
            DELETE_FAILED,
            &fields,
            self.store.delete_many(&self.namespace, query),
        )
        .await
    }

    async fn update_many_inner(
        &self,
        query: Document,
        update: Document,
        options: UpdateOptions,
        upsert_counts_as_match: bool,
        ctx: &RequestContext,
    ) -> Result<UpdateManyOutcome, StoreError> {
        let upsert = options.upsert.unwrap_or(false);
        let (log_query, log_update) = (query.clone(), update.clone());
        let fields = || {
            self.fields()
                .with("query", &log_query)
                .with("update", &log_update)
                .with("upsert", &upsert)
        };

        let counts = self
            .exec(
                ctx,
                StoreOperation::UpdateMany,
                UPDATE_FAILED,
                &fields,
                self.store
                    .update_many(&self.namespace, query, update, options),
            )
            .await?;

        let matched = counts.matched > 0 || (upsert_counts_as_match && counts.upserted);
        if !matched {
            self.logger.info(NO_DOCUMENTS, fields(), Some(ctx));
        }
        Ok(UpdateManyOutcome {
            modified: counts.modified,
            matched,
        })
    }

    fn fields(&self) -> LogFields {
        LogFields::new().with("collection", &self.namespace.collection)
    }

    /// Log a failure once and turn it into a message-only error
    fn fail(
        &self,
        ctx: &RequestContext,
        operation: StoreOperation,
        kind: StoreErrorKind,
        message: impl Into<String>,
        cause: Option<&dyn std::error::Error>,
        fields: LogFields,
    ) -> StoreError {
        let message = message.into();
        self.logger.error(
            cause,
            message.as_str(),
            fields.with("operation", &operation.to_string()),
            Some(ctx),
        );
        StoreError::new(operation, kind, message)
    }

    /// Await a store call bound to `ctx`
    async fn exec<R, F, L>(
        &self,
        ctx: &RequestContext,
        operation: StoreOperation,
        failure: &'static str,
        fields: &L,
        call: F,
    ) -> Result<R, StoreError>
    where
        F: Future<Output = BackendResult<R>>,
        L: Fn() -> LogFields,
    {
        match ctx.run(call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.fail(
                ctx,
                operation,
                StoreErrorKind::Driver,
                failure,
                Some(&e),
                fields(),
            )),
            Err(interrupted) => {
                let message = match interrupted {
                    Interrupted::Cancelled => "mongo call cancelled by request context",
                    Interrupted::DeadlineExceeded => "mongo call exceeded request deadline",
                };
                Err(self.fail(ctx, operation, interrupted.into(), message, None, fields()))
            }
        }
    }

    fn encode<L>(
        &self,
        operation: StoreOperation,
        element: &T,
        fields: &L,
        ctx: &RequestContext,
    ) -> Result<Document, StoreError>
    where
        L: Fn() -> LogFields,
    {
        bson::to_document(element).map_err(|e| {
            self.fail(
                ctx,
                operation,
                StoreErrorKind::Encode,
                ENCODE_FAILED,
                Some(&e),
                fields(),
            )
        })
    }

    fn decode<L>(
        &self,
        operation: StoreOperation,
        document: Document,
        failure: &'static str,
        fields: &L,
        ctx: &RequestContext,
    ) -> Result<T, StoreError>
    where
        L: Fn() -> LogFields,
    {
        let id = document.get("_id").cloned();
        bson::from_document(document).map_err(|e| {
            let fields = match &id {
                Some(id) => fields().with("documentId", id),
                None => fields(),
            };
            self.fail(ctx, operation, StoreErrorKind::Decode, failure, Some(&e), fields)
        })
    }

    /// Decode every document; the first failure aborts the whole call
    fn decode_all<L>(
        &self,
        operation: StoreOperation,
        documents: Vec<Document>,
        failure: &'static str,
        fields: &L,
        ctx: &RequestContext,
    ) -> Result<Vec<T>, StoreError>
    where
        L: Fn() -> LogFields,
    {
        documents
            .into_iter()
            .map(|document| self.decode(operation, document, failure, fields, ctx))
            .collect()
    }
}

/// Match-all filter
pub fn match_all() -> Document {
    doc! {}
}
