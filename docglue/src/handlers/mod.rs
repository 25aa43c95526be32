//! Generic CRUD handler over the typed store client

pub mod crud;
pub mod error;

pub use crud::{CrudHandler, DefaultCrudHandler};
pub use error::{HandlerError, HandlerOperation};
