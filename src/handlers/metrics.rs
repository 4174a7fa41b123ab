//! Prometheus exposition endpoint.

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::IntoResponse;
use futures_util::future::BoxFuture;

use crate::http::request::RequestContext;
use crate::observability::Meter;
use crate::routing::{Handler, HandlerResult};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// `GET /metrics`
#[derive(Clone, Debug)]
pub struct MetricsExport {
    meter: Meter,
}

impl MetricsExport {
    pub fn new(meter: Meter) -> Self {
        Self { meter }
    }
}

impl Handler for MetricsExport {
    fn call(&self, _cx: RequestContext, _req: Request<Body>) -> BoxFuture<'static, HandlerResult> {
        let meter = self.meter.clone();
        Box::pin(async move {
            meter.run_upkeep();
            Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], meter.render()).into_response())
        })
    }
}
