//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;

use rest_api::config::ServiceConfig;
use rest_api::lifecycle::{RunningService, ServiceRunner, ShutdownSignal};
use rest_api::observability::{Meter, TelemetryHandles};
use rest_api::routing::RouteTable;

/// Fresh telemetry handles with their own metrics registry.
pub fn telemetry() -> TelemetryHandles {
    TelemetryHandles::new("rest-api-test", Meter::new().unwrap())
}

/// Loopback config on an ephemeral port.
pub fn local_config(grace: Duration) -> ServiceConfig {
    ServiceConfig {
        host: "127.0.0.1".into(),
        port: 0,
        shutdown_grace: grace,
        ..ServiceConfig::default()
    }
}

/// A loopback port that was free a moment ago.
pub fn free_port() -> u16 {
    let socket = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

/// Start a runner and return it with its base URL.
pub async fn start(
    routes: RouteTable,
    config: ServiceConfig,
    telemetry: &TelemetryHandles,
) -> (RunningService, String) {
    let runner = ServiceRunner::new(config, telemetry.clone(), ShutdownSignal::new());
    let running = runner.start(routes).await.unwrap();
    let base = format!("http://{}", running.local_addr());
    (running, base)
}

/// Captures finished spans for the current thread.
///
/// Tests using it must run on a current-thread runtime so every task sees
/// the thread-local subscriber.
pub struct SpanCapture {
    exporter: InMemorySpanExporter,
    provider: SdkTracerProvider,
    _guard: DefaultGuard,
}

impl SpanCapture {
    pub fn install() -> Self {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("test")));
        let guard = tracing::subscriber::set_default(subscriber);
        Self {
            exporter,
            provider,
            _guard: guard,
        }
    }

    pub fn spans(&self) -> Vec<SpanData> {
        let _ = self.provider.force_flush();
        self.exporter.get_finished_spans().unwrap()
    }

    pub fn spans_named(&self, name: &str) -> Vec<SpanData> {
        self.spans().into_iter().filter(|s| s.name == name).collect()
    }

    pub fn reset(&self) {
        self.exporter.reset();
    }
}

/// String value of a span attribute.
pub fn attribute(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.to_string())
}
