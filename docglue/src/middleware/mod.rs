//! HTTP middleware: CORS and route naming

pub mod cors;
pub mod route_name;

pub use cors::{CorsLayer, CorsService, ALLOWED_METHODS};
pub use route_name::{route_name_middleware, RouteNames};
