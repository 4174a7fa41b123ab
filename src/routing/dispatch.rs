//! Request instrumentation.
//!
//! Every request, matched or not, passes through [`dispatch`]:
//!
//! ```text
//! request
//!     → span named after the route (remote parent from `traceparent`)
//!     → body capped at max_body_bytes (declared oversize → 413)
//!     → RequestContext (trace id, request id, cancellation, deadline)
//!     → handler, bounded by the write timeout, panics caught
//!     → status recorded on the span
//!     → http_server_requests_total / http_server_request_duration_seconds
//!     → response (+ x-trace-id)
//! ```
//!
//! The span ends and the counter moves exactly once per request, whatever
//! the outcome.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::Request;
use axum::response::Response;
use futures_util::FutureExt;
use http_body_util::Limited;
use opentelemetry::trace::Status;
use tokio_util::sync::CancellationToken;
use tracing::field::Empty;
use tracing::{Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

use crate::http::request::{RequestContext, X_REQUEST_ID};
use crate::http::response::{error_response, internal_error, not_found, set_trace_header, timed_out};
use crate::observability::tracing as otel;
use crate::observability::TelemetryHandles;
use crate::routing::handler::HandlerError;
use crate::routing::router::{DispatchOptions, RouteRegistration};

/// Route label used for requests that matched no route.
pub const UNMATCHED: &str = "unmatched";

/// Shared state for the dispatcher.
#[derive(Clone)]
pub(crate) struct Instrumentation {
    telemetry: TelemetryHandles,
    write_timeout: Option<Duration>,
    max_body_bytes: usize,
    abort: CancellationToken,
}

impl Instrumentation {
    pub(crate) fn new(telemetry: TelemetryHandles, options: &DispatchOptions) -> Self {
        Self {
            telemetry,
            write_timeout: options.write_timeout,
            max_body_bytes: options.max_body_bytes,
            abort: options.abort.clone(),
        }
    }
}

enum Outcome {
    Completed(Response),
    Failed(HandlerError),
    Panicked(String),
    TimedOut(Duration),
}

pub(crate) async fn dispatch(
    instrumentation: Instrumentation,
    route: Option<Arc<RouteRegistration>>,
    req: Request<Body>,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let name: Arc<str> = match &route {
        Some(route) => Arc::clone(&route.name),
        None => Arc::from(UNMATCHED),
    };
    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let span = tracing::info_span!(
        "request",
        otel.name = %name,
        otel.kind = "server",
        http.request.method = %method,
        http.route = Empty,
        http.response.status_code = Empty,
        url.path = %req.uri().path(),
        route = %name,
        request_id = Empty,
        trace_id = Empty,
    );
    if let Some(route) = &route {
        span.record("http.route", route.pattern.as_str());
    }
    if let Some(id) = &request_id {
        span.record("request_id", id.as_str());
    }

    otel::attach_remote_parent(&span, req.headers());
    let trace_id = otel::trace_id(&span).unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    span.record("trace_id", trace_id.as_str());

    let outcome = match &route {
        Some(route) => {
            run_handler(&instrumentation, route, &span, &trace_id, request_id, req)
                .instrument(span.clone())
                .await
        }
        None => {
            span.in_scope(|| tracing::debug!("No route matched"));
            Outcome::Completed(not_found(&trace_id))
        }
    };

    let mut response = span.in_scope(|| finish(outcome, &span, &trace_id));
    set_trace_header(&mut response, &trace_id);

    instrumentation.telemetry.meter().record_request(
        &name,
        method.as_str(),
        response.status().as_u16(),
        start,
    );
    response
}

async fn run_handler(
    instrumentation: &Instrumentation,
    route: &RouteRegistration,
    span: &Span,
    trace_id: &str,
    request_id: Option<String>,
    req: Request<Body>,
) -> Outcome {
    let limit = instrumentation.max_body_bytes;
    if declared_length(&req).is_some_and(|length| length > limit as u64) {
        return Outcome::Failed(HandlerError::PayloadTooLarge { limit });
    }
    let req = req.map(|body| Body::new(Limited::new(body, limit)));

    let cancellation = instrumentation.abort.child_token();
    let _cancel_on_exit = cancellation.clone().drop_guard();
    let deadline = instrumentation.write_timeout.map(|limit| Instant::now() + limit);

    let cx = RequestContext::new(
        span.clone(),
        trace_id.to_string(),
        request_id,
        Arc::clone(&route.name),
        cancellation.clone(),
        deadline,
    );
    let handler = Arc::clone(&route.handler);
    let call = AssertUnwindSafe(async move { handler.call(cx, req).await }).catch_unwind();

    let result = match instrumentation.write_timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                cancellation.cancel();
                return Outcome::TimedOut(limit);
            }
        },
        None => call.await,
    };

    match result {
        Ok(Ok(response)) => Outcome::Completed(response),
        Ok(Err(e)) => Outcome::Failed(e),
        Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
    }
}

fn finish(outcome: Outcome, span: &Span, trace_id: &str) -> Response {
    let (response, failure) = match outcome {
        Outcome::Completed(response) => (response, None),
        Outcome::Failed(e) => {
            let status = e.status();
            if status.is_server_error() {
                tracing::error!(error = %e, "Handler failed");
                (internal_error(trace_id), Some(e.to_string()))
            } else {
                tracing::warn!(error = %e, "Handler rejected request");
                (error_response(status, &e.to_string(), trace_id), None)
            }
        }
        Outcome::Panicked(message) => {
            tracing::error!(panic = %message, "Handler panicked");
            (internal_error(trace_id), Some(format!("panic: {}", message)))
        }
        Outcome::TimedOut(limit) => {
            tracing::error!(timeout = ?limit, "Handler exceeded write timeout");
            (timed_out(trace_id), Some("write timeout exceeded".to_string()))
        }
    };

    let status = response.status();
    span.record("http.response.status_code", status.as_u16());
    if status.is_server_error() {
        let message = failure.unwrap_or_else(|| status.to_string());
        span.set_status(Status::error(message));
    }
    response
}

fn declared_length(req: &Request<Body>) -> Option<u64> {
    req.headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
