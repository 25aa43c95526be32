//! Request-scoped context threaded through every layer
//!
//! [`RequestContext`] carries the route name (set by
//! [`RouteNames`](crate::middleware::RouteNames)), the authenticated user,
//! and the cancellation token / deadline that bound every store call.
//! In axum handlers it is an extractor:
//!
//! ```rust,ignore
//! async fn get_user(ctx: RequestContext, Path(id): Path<String>) -> Result<Json<User>, HandlerError> {
//!     let user = users.get_one(doc! { "id": id }, &ctx).await?;
//!     // ...
//! }
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use axum::{extract::FromRequestParts, http::request::Parts};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Name of the matched route, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiName(pub String);

/// Authenticated user identity, stored in request extensions by auth middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity(pub String);

/// Why a context-bound call stopped before completing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The cancellation token fired
    Cancelled,
    /// The deadline passed
    DeadlineExceeded,
}

/// Execution context for one logical request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    api_name: Option<String>,
    user: Option<String>,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// An empty context: no route name, no user, never cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a route name
    #[must_use]
    pub fn with_api_name(mut self, api_name: impl Into<String>) -> Self {
        self.api_name = Some(api_name.into());
        self
    }

    /// Attach a user identity
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Bind to an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Fail calls that are still running at `deadline`
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fail calls that are still running `timeout` from now
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Route name, if the request matched a route
    pub fn api_name(&self) -> Option<&str> {
        self.api_name.as_deref()
    }

    /// Authenticated user, if any
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Token observed by every store call made with this context
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Deadline, if one was set
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel every in-flight and future call bound to this context
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Drive `fut` until it completes, the token fires, or the deadline passes.
    ///
    /// On interruption `fut` is dropped, which aborts the underlying I/O.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Interrupted::Cancelled),
            _ = deadline => Err(Interrupted::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            api_name: parts.extensions.get::<ApiName>().map(|name| name.0.clone()),
            user: parts.extensions.get::<UserIdentity>().map(|user| user.0.clone()),
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let ctx = RequestContext::new();
        ctx.cancel();
        let result = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(Interrupted::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_deadline_exceeded() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(50));
        let result = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_shared_token_cancels_clones() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new().with_cancellation(token.clone());
        let clone = ctx.clone();
        token.cancel();
        assert_eq!(
            clone.run(std::future::pending::<()>()).await,
            Err(Interrupted::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_extractor_reads_extensions() {
        let mut request = Request::new(());
        request
            .extensions_mut()
            .insert(ApiName("getUser".to_string()));
        request
            .extensions_mut()
            .insert(UserIdentity("usr_1".to_string()));
        let (mut parts, _) = request.into_parts();

        let ctx = RequestContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.api_name(), Some("getUser"));
        assert_eq!(ctx.user(), Some("usr_1"));
    }

    #[tokio::test]
    async fn test_extractor_without_extensions() {
        let (mut parts, _) = Request::new(()).into_parts();
        let ctx = RequestContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(ctx.api_name().is_none());
        assert!(ctx.user().is_none());
    }
}
