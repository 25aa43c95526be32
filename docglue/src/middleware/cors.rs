//! Fixed-policy CORS stage
//!
//! Every response carries `Access-Control-Allow-Origin`,
//! `Access-Control-Allow-Methods` and `Access-Control-Allow-Headers` from
//! [`CorsConfig`]. Preflight (`OPTIONS`) requests are answered here with an
//! empty 200 and never reach the wrapped service.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/users", get(list_users))
//!     .layer(CorsLayer::new(&config.cors)?);
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    response::{IntoResponse, Response},
};
use http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};

use crate::config::CorsConfig;
use crate::error::{Error, Result};

/// Methods advertised in `Access-Control-Allow-Methods`
pub const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";

/// Pre-validated CORS header values
#[derive(Debug, Clone)]
struct CorsHeaders {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
}

impl CorsHeaders {
    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
    }
}

/// Layer adding the CORS stage
#[derive(Debug, Clone)]
pub struct CorsLayer {
    headers: CorsHeaders,
}

impl CorsLayer {
    /// Build the layer, rejecting values that are not valid header values.
    pub fn new(config: &CorsConfig) -> Result<Self> {
        let value = |name: &str, raw: &str| {
            HeaderValue::from_str(raw)
                .map_err(|e| Error::InvalidHeader(format!("{name} {raw:?}: {e}")))
        };

        Ok(Self {
            headers: CorsHeaders {
                allow_origin: value("allow_origin", &config.allow_origin)?,
                allow_methods: HeaderValue::from_static(ALLOWED_METHODS),
                allow_headers: value("allowed_headers", &config.allowed_headers)?,
            },
        })
    }

    /// Layer with the default policy (`http://localhost`, `Content-Type, Authorization`)
    #[must_use]
    pub fn permissive_localhost() -> Self {
        Self {
            headers: CorsHeaders {
                allow_origin: HeaderValue::from_static("http://localhost"),
                allow_methods: HeaderValue::from_static(ALLOWED_METHODS),
                allow_headers: HeaderValue::from_static("Content-Type, Authorization"),
            },
        }
    }
}

impl<S> tower::Layer<S> for CorsLayer {
    type Service = CorsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorsService {
            inner,
            headers: self.headers.clone(),
        }
    }
}

/// Service produced by [`CorsLayer`]
#[derive(Debug, Clone)]
pub struct CorsService<S> {
    inner: S,
    headers: CorsHeaders,
}

impl<S> tower::Service<Request<Body>> for CorsService<S>
where
    S: tower::Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let headers = self.headers.clone();

        if request.method() == Method::OPTIONS {
            return Box::pin(async move {
                let mut response = StatusCode::OK.into_response();
                headers.apply(response.headers_mut());
                Ok(response)
            });
        }

        // Swap in the clone so the service that was polled ready handles this call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(request).await?;
            headers.apply(response.headers_mut());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(calls: Arc<AtomicUsize>, layer: CorsLayer) -> Router {
        Router::new()
            .route(
                "/users",
                get(move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { "users" }
                })
                .options(|| async { "inner preflight" }),
            )
            .layer(layer)
    }

    fn request(method: Method) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri("/users")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_preflight_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let response = app(calls.clone(), CorsLayer::permissive_localhost())
            .oneshot(request(Method::OPTIONS))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOWED_METHODS);
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_headers_on_regular_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = CorsConfig::default()
            .with_allow_origin("https://app.example")
            .with_allowed_headers("X-Api-Key");
        let response = app(calls.clone(), CorsLayer::new(&config).unwrap())
            .oneshot(request(Method::GET))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example"
        );
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS], "X-Api-Key");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_header_value_is_rejected() {
        let config = CorsConfig::default().with_allow_origin("http://bad\norigin");
        let err = CorsLayer::new(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }
}
