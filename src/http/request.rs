//! Per-request context.
//!
//! # Responsibilities
//! - Carry the active request span and its correlation id to the handler
//! - Carry the request's cancellation token and deadline
//! - Expose the request id assigned at the edge
//!
//! # Design Decisions
//! - One context per request; it is moved into the handler, never shared
//! - Cancellation fires when the write deadline passes or when shutdown
//!   reaches its hard cutoff

use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderName;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Header carrying the request id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Header carrying the trace id used to correlate responses with telemetry.
pub const X_TRACE_ID: HeaderName = HeaderName::from_static("x-trace-id");

/// Context handed to a handler for one request.
#[derive(Debug)]
pub struct RequestContext {
    span: tracing::Span,
    trace_id: String,
    request_id: Option<String>,
    route: Arc<str>,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(
        span: tracing::Span,
        trace_id: String,
        request_id: Option<String>,
        route: Arc<str>,
        cancellation: CancellationToken,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            span,
            trace_id,
            request_id,
            route,
            cancellation,
            deadline,
        }
    }

    /// The request span. Record handler attributes here.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Correlation id returned to clients on errors.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Logical route name, e.g. `GetPing`.
    pub fn route_name(&self) -> &str {
        &self.route
    }

    /// Point in time after which the response is abandoned, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves when the request is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancellation_is_observable() {
        let token = CancellationToken::new();
        let cx = RequestContext::new(
            tracing::Span::none(),
            "abc".into(),
            Some("req-1".into()),
            Arc::from("GetPing"),
            token.child_token(),
            Some(Instant::now() + Duration::from_secs(1)),
        );
        assert_eq!(cx.route_name(), "GetPing");
        assert_eq!(cx.request_id(), Some("req-1"));
        assert!(!cx.is_cancelled());

        token.cancel();
        cx.cancelled().await;
        assert!(cx.is_cancelled());
    }
}
