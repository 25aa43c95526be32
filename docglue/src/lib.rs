//! # docglue
//!
//! Typed MongoDB data access and the HTTP glue services put around it.
//!
//! ## Features
//!
//! - **Typed store client**: [`DocumentClient<T>`](store::DocumentClient) binds an element
//!   type to one collection; every failure is logged once with its query and payload
//! - **Generic CRUD**: [`DefaultCrudHandler<T>`](handlers::DefaultCrudHandler) for
//!   create / get-one / get-all / list endpoints
//! - **Middleware**: fixed-policy CORS layer and route naming for request-scoped logs
//! - **Request context**: cancellation and deadlines bound to every store call
//! - **Helpers**: collection utilities, a set type, prefixed UUIDs
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docglue::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct User {
//!     id: String,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config);
//!
//!     let client = connect(&config.mongodb).await?;
//!     let store: Arc<dyn DocumentStore> = Arc::new(MongoStore::new(client));
//!     let users = DocumentClient::<User>::new(store, config.mongodb.database.clone(), "users");
//!
//!     let ctx = RequestContext::new();
//!     let user = User { id: generate_uuid("user"), name: "Ada".to_string() };
//!     users.insert(&user, &ctx).await.ok();
//!
//!     let names = RouteNames::new().with_route("/users", "listUsers");
//!     let _app: Router = Router::new()
//!         .layer(axum::middleware::from_fn_with_state(names, route_name_middleware))
//!         .layer(CorsLayer::new(&config.cors)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod helpers;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod observability;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, CorsConfig, MongoConfig, ServiceConfig};
    pub use crate::context::{ApiName, Interrupted, RequestContext, UserIdentity};
    pub use crate::error::{Error, ErrorResponse, Result};
    pub use crate::handlers::{CrudHandler, DefaultCrudHandler, HandlerError, HandlerOperation};
    pub use crate::helpers::Set;
    pub use crate::ids::generate_uuid;
    pub use crate::logging::{LogFields, LogLevel, LogSink, Logger, MemorySink, TracingSink};
    pub use crate::middleware::{route_name_middleware, CorsLayer, RouteNames};
    pub use crate::observability::init_tracing;
    pub use crate::store::{
        connect, match_all, DocumentClient, DocumentStore, MongoStore, Namespace, Sort,
        SortDirection, StoreError, StoreErrorKind, StoreOperation, UpdateManyOutcome,
        UpdateOutcome,
    };

    #[cfg(any(test, feature = "testing"))]
    pub use crate::store::MemoryStore;

    pub use axum::{
        extract::State,
        routing::{delete, get, patch, post, put},
        Json, Router,
    };
    pub use bson::{doc, Document};
    pub use tokio_util::sync::CancellationToken;
}
