//! Error responses.
//!
//! # Responsibilities
//! - Map routing and handler failures to client responses
//! - Attach the correlation id to every error body
//!
//! # Design Decisions
//! - Server errors get a generic body; details stay in logs and spans
//! - Bodies are JSON: `{"error": "...", "trace_id": "..."}`

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::http::request::X_TRACE_ID;

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    trace_id: &'a str,
}

/// Build a JSON error response.
pub fn error_response(status: StatusCode, message: &str, trace_id: &str) -> Response {
    let body = ErrorBody {
        error: message,
        trace_id,
    };
    (status, Json(body)).into_response()
}

/// Generic 500 for failed or panicked handlers.
pub fn internal_error(trace_id: &str) -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error", trace_id)
}

/// 503 for handlers that exceeded the write timeout.
pub fn timed_out(trace_id: &str) -> Response {
    error_response(StatusCode::SERVICE_UNAVAILABLE, "request timed out", trace_id)
}

/// 404 for requests no route matched.
pub fn not_found(trace_id: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, "not found", trace_id)
}

/// Set the `x-trace-id` header.
pub fn set_trace_header(response: &mut Response, trace_id: &str) {
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert(X_TRACE_ID, value);
    }
}
