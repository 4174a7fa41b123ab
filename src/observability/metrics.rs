//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Own the Prometheus recorder for the process
//! - Record per-route request counts and latency
//! - Render the Prometheus text exposition
//!
//! # Metrics
//! - `http_server_requests_total` (counter): requests by route, method, status
//! - `http_server_request_duration_seconds` (histogram): latency by route, method
//! - `http_server_active_connections` (gauge): current connection count
//!
//! # Design Decisions
//! - The recorder is never installed globally; instruments are resolved
//!   against the [`Meter`] that was handed to the component
//! - Labels use the route name, never the raw path, to bound cardinality

use std::sync::Arc;
use std::time::Instant;

use metrics::{Counter, Gauge, Histogram, Label};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::observability::TelemetryError;

pub const REQUESTS_TOTAL: &str = "http_server_requests_total";
pub const REQUEST_DURATION: &str = "http_server_request_duration_seconds";
pub const ACTIVE_CONNECTIONS: &str = "http_server_active_connections";

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Handle to the process meter.
///
/// Cloning is cheap; all clones record into the same registry.
#[derive(Clone)]
pub struct Meter {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl Meter {
    /// Build a meter backed by a fresh Prometheus registry.
    pub fn new() -> Result<Self, TelemetryError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets(LATENCY_BUCKETS)
            .map_err(|e| TelemetryError::Initialization(format!("prometheus recorder: {}", e)))?
            .build_recorder();
        let handle = recorder.handle();

        let meter = Self {
            recorder: Arc::new(recorder),
            handle,
        };
        meter.describe();
        Ok(meter)
    }

    fn describe(&self) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::describe_counter!(REQUESTS_TOTAL, "Requests handled, by route and status");
            metrics::describe_histogram!(
                REQUEST_DURATION,
                metrics::Unit::Seconds,
                "Time spent dispatching a request"
            );
            metrics::describe_gauge!(ACTIVE_CONNECTIONS, "Open client connections");
        });
    }

    /// Resolve a counter in this meter's registry.
    pub fn counter(&self, name: &'static str, labels: Vec<Label>) -> Counter {
        metrics::with_local_recorder(self.recorder.as_ref(), || metrics::counter!(name, labels))
    }

    /// Resolve a histogram in this meter's registry.
    pub fn histogram(&self, name: &'static str, labels: Vec<Label>) -> Histogram {
        metrics::with_local_recorder(self.recorder.as_ref(), || metrics::histogram!(name, labels))
    }

    /// Resolve a gauge in this meter's registry.
    pub fn gauge(&self, name: &'static str) -> Gauge {
        metrics::with_local_recorder(self.recorder.as_ref(), || metrics::gauge!(name))
    }

    /// Record one finished request.
    pub fn record_request(&self, route: &str, method: &str, status: u16, start: Instant) {
        let elapsed = start.elapsed().as_secs_f64();
        self.counter(
            REQUESTS_TOTAL,
            vec![
                Label::new("route", route.to_string()),
                Label::new("method", method.to_string()),
                Label::new("status", status.to_string()),
            ],
        )
        .increment(1);
        self.histogram(
            REQUEST_DURATION,
            vec![
                Label::new("route", route.to_string()),
                Label::new("method", method.to_string()),
            ],
        )
        .record(elapsed);
    }

    /// Render all instruments in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Drain histogram buffers. Called periodically by the exposition path.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meter").finish_non_exhaustive()
    }
}

/// Find a sample value in rendered Prometheus text.
///
/// Matches the first sample of `name` whose label set contains every
/// `key="value"` pair in `labels`.
pub fn sample_value(rendered: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    rendered
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
        })
        .find(|line| {
            labels
                .iter()
                .all(|(k, v)| line.contains(&format!("{}=\"{}\"", k, v)))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request_counts_once() {
        let meter = Meter::new().unwrap();
        meter.record_request("GetPing", "GET", 200, Instant::now());
        meter.record_request("GetPing", "GET", 200, Instant::now());
        meter.record_request("unmatched", "GET", 404, Instant::now());

        let rendered = meter.render();
        assert_eq!(
            sample_value(&rendered, REQUESTS_TOTAL, &[("route", "GetPing"), ("status", "200")]),
            Some(2.0)
        );
        assert_eq!(
            sample_value(&rendered, REQUESTS_TOTAL, &[("route", "unmatched")]),
            Some(1.0)
        );
    }

    #[test]
    fn test_meters_are_isolated() {
        let a = Meter::new().unwrap();
        let b = Meter::new().unwrap();
        a.record_request("r", "GET", 200, Instant::now());
        assert!(sample_value(&b.render(), REQUESTS_TOTAL, &[("route", "r")]).is_none());
    }

    #[test]
    fn test_gauge() {
        let meter = Meter::new().unwrap();
        meter.gauge(ACTIVE_CONNECTIONS).set(3.0);
        assert_eq!(sample_value(&meter.render(), ACTIVE_CONNECTIONS, &[]), Some(3.0));
    }
}
