//! Typed access to a MongoDB-compatible document store
//!
//! Layers, outermost first:
//!
//! - [`DocumentClient<T>`]: typed operations bound to one collection, with
//!   logging and message-only errors
//! - [`DocumentStore`]: the raw document protocol, implemented by
//!   [`MongoStore`] (and [`MemoryStore`] with the `testing` feature)
//! - [`connect`]: builds and verifies the shared driver client from config

pub mod backend;
pub mod client;
pub mod connection;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod mongo;
pub mod sort;

pub use backend::{DocumentStore, Namespace, WriteCounts};
pub use client::{match_all, DocumentClient, UpdateManyOutcome, UpdateOutcome};
pub use connection::connect;
pub use error::{BackendError, BackendResult, StoreError, StoreErrorKind, StoreOperation};
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use sort::{Sort, SortDirection};

// Driver option types used by the update operations
pub use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions};
