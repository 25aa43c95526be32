//! Entity-oriented CRUD over a [`DocumentClient`]
//!
//! [`CrudHandler`] is the narrow surface call sites use when they do not need
//! raw queries or updates; [`DefaultCrudHandler`] implements it by delegating
//! to the client.
//!
//! ```rust,ignore
//! let users = DefaultCrudHandler::new(DocumentClient::<User>::new(store, "shop", "users"), "user");
//!
//! async fn list_users(
//!     State(users): State<Arc<DefaultCrudHandler<User>>>,
//!     ctx: RequestContext,
//! ) -> Result<Json<Vec<User>>, HandlerError> {
//!     Ok(Json(users.get_all(&ctx).await?))
//! }
//! ```

use std::future::Future;

use bson::Document;
use serde::{de::DeserializeOwned, Serialize};

use super::error::{HandlerError, HandlerOperation};
use crate::context::RequestContext;
use crate::logging::LogFields;
use crate::store::{match_all, DocumentClient};

/// Create, fetch-one, fetch-all and filtered-list for one element type
pub trait CrudHandler<T>: Send + Sync {
    /// Persist `element`; an unacknowledged insert is a failure
    fn create(
        &self,
        element: &T,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send;

    /// First element matching `query`
    fn get_one(
        &self,
        query: Document,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<Option<T>, HandlerError>> + Send;

    /// Every element; empty when the collection is
    fn get_all(
        &self,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<Vec<T>, HandlerError>> + Send;

    /// Every element matching `query`
    fn list(
        &self,
        query: Document,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<Vec<T>, HandlerError>> + Send;
}

/// [`CrudHandler`] backed by a [`DocumentClient`]
#[derive(Debug, Clone)]
pub struct DefaultCrudHandler<T> {
    client: DocumentClient<T>,
    element_name: String,
}

impl<T> DefaultCrudHandler<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// `element_name` labels the element kind in error messages (`"user"`)
    pub fn new(client: DocumentClient<T>, element_name: impl Into<String>) -> Self {
        Self {
            client,
            element_name: element_name.into(),
        }
    }

    /// The typed client every operation delegates to
    pub fn client(&self) -> &DocumentClient<T> {
        &self.client
    }

    /// Label used in error messages
    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    fn list_error(&self) -> HandlerError {
        HandlerError::new(
            HandlerOperation::List,
            format!("unexpected error when fetching list of {}s", self.element_name),
        )
    }
}

impl<T> CrudHandler<T> for DefaultCrudHandler<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn create(&self, element: &T, ctx: &RequestContext) -> Result<(), HandlerError> {
        let message = format!("unexpected error when inserting {}", self.element_name);

        match self.client.insert(element, ctx).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                // Nothing below logged this one
                self.client.logger().error(
                    None,
                    message.as_str(),
                    LogFields::new()
                        .with("collection", &self.client.namespace().collection)
                        .with(self.element_name.as_str(), element),
                    Some(ctx),
                );
                Err(HandlerError::new(HandlerOperation::Create, message))
            }
            Err(_) => Err(HandlerError::new(HandlerOperation::Create, message)),
        }
    }

    async fn get_one(&self, query: Document, ctx: &RequestContext) -> Result<Option<T>, HandlerError> {
        self.client.find(query, ctx).await.map_err(|_| {
            HandlerError::new(
                HandlerOperation::Get,
                format!("unexpected error when fetching {}", self.element_name),
            )
        })
    }

    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<T>, HandlerError> {
        self.list(match_all(), ctx).await
    }

    async fn list(&self, query: Document, ctx: &RequestContext) -> Result<Vec<T>, HandlerError> {
        self.client
            .list(query, ctx)
            .await
            .map_err(|_| self.list_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, Logger, MemorySink};
    use crate::store::MemoryStore;
    use axum::{
        body::Body,
        extract::State,
        http::{Request, StatusCode},
        routing::get,
        Json, Router,
    };
    use bson::doc;
    use serde::Deserialize;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Book {
        isbn: String,
        title: String,
    }

    fn book(isbn: &str) -> Book {
        Book {
            isbn: isbn.to_string(),
            title: format!("Title {isbn}"),
        }
    }

    fn handler() -> (DefaultCrudHandler<Book>, MemoryStore, MemorySink) {
        let store = MemoryStore::new();
        let sink = MemorySink::new();
        let client = DocumentClient::new(Arc::new(store.clone()), "library", "books")
            .with_logger(Logger::new(sink.clone()));
        (DefaultCrudHandler::new(client, "book"), store, sink)
    }

    #[tokio::test]
    async fn test_get_all_on_empty_collection() {
        let (handler, _, _) = handler();
        let books = handler.get_all(&RequestContext::new()).await.unwrap();
        assert!(books.is_empty());
    }

    #[tokio::test]
    async fn test_create_then_get_one_and_list() {
        let (handler, _, _) = handler();
        let ctx = RequestContext::new();
        handler.create(&book("1"), &ctx).await.unwrap();
        handler.create(&book("2"), &ctx).await.unwrap();

        let found = handler.get_one(doc! { "isbn": "2" }, &ctx).await.unwrap();
        assert_eq!(found, Some(book("2")));
        assert!(handler.get_one(doc! { "isbn": "9" }, &ctx).await.unwrap().is_none());

        assert_eq!(handler.get_all(&ctx).await.unwrap().len(), 2);
        let listed = handler.list(doc! { "isbn": "1" }, &ctx).await.unwrap();
        assert_eq!(listed, vec![book("1")]);
    }

    #[tokio::test]
    async fn test_unacknowledged_create_fails_and_logs_once() {
        let (handler, store, sink) = handler();
        store.refuse_inserts(true);
        let ctx = RequestContext::new().with_api_name("createBook");

        let err = handler.create(&book("1"), &ctx).await.unwrap_err();

        assert_eq!(err.operation, HandlerOperation::Create);
        assert_eq!(err.message, "unexpected error when inserting book");
        let errors = sink.events_at(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].fields.get("book").is_some());
        assert_eq!(errors[0].api_name.as_deref(), Some("createBook"));
    }

    #[tokio::test]
    async fn test_store_failure_is_logged_once() {
        let (handler, store, sink) = handler();
        store.fail_next("insert_one", "socket closed");

        let err = handler
            .create(&book("1"), &RequestContext::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "unexpected error when inserting book");
        assert_eq!(sink.events_at(LogLevel::Error).len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_messages() {
        let (handler, store, _) = handler();
        let ctx = RequestContext::new();

        store.fail_next("find_one", "timeout");
        let err = handler.get_one(doc! {}, &ctx).await.unwrap_err();
        assert_eq!(err.operation, HandlerOperation::Get);
        assert_eq!(err.message, "unexpected error when fetching book");

        store.fail_next("find", "timeout");
        let err = handler.get_all(&ctx).await.unwrap_err();
        assert_eq!(err.operation, HandlerOperation::List);
        assert_eq!(err.message, "unexpected error when fetching list of books");
    }

    async fn list_books(
        State(books): State<Arc<DefaultCrudHandler<Book>>>,
        ctx: RequestContext,
    ) -> Result<Json<Vec<Book>>, HandlerError> {
        Ok(Json(books.get_all(&ctx).await?))
    }

    #[tokio::test]
    async fn test_handler_error_surfaces_as_500() {
        let (handler, store, _) = handler();
        store.fail_next("find", "primary unavailable");
        let app = Router::new()
            .route("/books", get(list_books))
            .with_state(Arc::new(handler));

        let response = app
            .oneshot(Request::builder().uri("/books").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
