//! Liveness probe.

use axum::body::Body;
use axum::http::Request;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::http::request::RequestContext;
use crate::routing::HandlerResult;

#[derive(Debug, Serialize)]
struct Pong {
    ping: &'static str,
}

/// `GET /ping` → `{"ping":"pong"}`
pub async fn get_ping(_cx: RequestContext, _req: Request<Body>) -> HandlerResult {
    Ok(Json(Pong { ping: "pong" }).into_response())
}
