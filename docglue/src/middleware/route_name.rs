//! Route naming stage
//!
//! Records the name of the matched route as an [`ApiName`] request extension
//! so handlers and the [`Logger`](crate::logging::Logger) can tag events with
//! `apiName`. Requests that matched no route pass through untouched.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::context::ApiName;

/// Registered names keyed by route pattern (for example `/users/{id}`)
#[derive(Debug, Clone, Default)]
pub struct RouteNames {
    names: Arc<HashMap<String, String>>,
}

impl RouteNames {
    /// No registered names; every route is named after its pattern
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` for `pattern`
    #[must_use]
    pub fn with_route(mut self, pattern: impl Into<String>, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.names).insert(pattern.into(), name.into());
        self
    }

    /// Name for a matched pattern, falling back to the pattern itself
    pub fn name_for<'a>(&'a self, pattern: &'a str) -> &'a str {
        self.names.get(pattern).map_or(pattern, String::as_str)
    }
}

impl<P, N> FromIterator<(P, N)> for RouteNames
where
    P: Into<String>,
    N: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (P, N)>>(iter: I) -> Self {
        Self {
            names: Arc::new(
                iter.into_iter()
                    .map(|(pattern, name)| (pattern.into(), name.into()))
                    .collect(),
            ),
        }
    }
}

/// Route naming middleware.
///
/// Use with `axum::middleware::from_fn_with_state`, added via `Router::layer`
/// so it runs after routing:
///
/// ```rust,ignore
/// let names = RouteNames::new().with_route("/users/{id}", "getUser");
/// let app = Router::new()
///     .route("/users/{id}", get(get_user))
///     .layer(axum::middleware::from_fn_with_state(names, route_name_middleware));
/// ```
pub async fn route_name_middleware(
    State(names): State<RouteNames>,
    mut request: Request,
    next: Next,
) -> Response {
    let name = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| names.name_for(matched.as_str()).to_string());

    if let Some(name) = name {
        request.extensions_mut().insert(ApiName(name));
    }

    next.run(request).await
}
