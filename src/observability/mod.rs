//! Observability subsystem: the telemetry provider.
//!
//! # Data Flow
//! ```text
//! init(TelemetryConfig)
//!     → tracing.rs (tracer provider, OTLP exporter)
//!     → logging.rs (subscriber: fmt layer + OpenTelemetry bridge)
//!     → metrics.rs (Prometheus-backed Meter)
//!     → (TelemetryHandles, TelemetryGuard)
//!
//! Consumers:
//!     → routing (request spans, per-route counters)
//!     → handlers (span attributes, domain counters)
//!     → lifecycle (guard.shutdown() after the listener has drained)
//! ```
//!
//! # Design Decisions
//! - Handles are built once and passed explicitly; the tracing dispatcher is
//!   the only process-global piece
//! - The guard is consumed by `shutdown`, so teardown happens at most once
//! - An exporter that cannot be configured is fatal

pub mod logging;
pub mod metrics;
pub mod tracing;

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;

use crate::config::TelemetryConfig;

pub use self::metrics::Meter;

/// Errors raised while setting up or tearing down telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("telemetry initialization failed: {0}")]
    Initialization(String),

    #[error("invalid OTLP endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("telemetry shutdown failed: {0}")]
    Shutdown(String),

    #[error("telemetry shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}

/// Shared, read-only telemetry handles.
///
/// Cheap to clone. Spans and log records go through the `tracing` macros;
/// metrics go through [`TelemetryHandles::meter`].
#[derive(Clone, Debug)]
pub struct TelemetryHandles {
    service_name: Arc<str>,
    meter: Meter,
}

impl TelemetryHandles {
    pub fn new(service_name: impl Into<Arc<str>>, meter: Meter) -> Self {
        Self {
            service_name: service_name.into(),
            meter,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn meter(&self) -> &Meter {
        &self.meter
    }
}

/// Owns the exporters. Call [`TelemetryGuard::shutdown`] exactly once, after
/// the listener has stopped.
#[must_use = "telemetry must be shut down to flush buffered spans"]
pub struct TelemetryGuard {
    tracer_provider: SdkTracerProvider,
    meter: Meter,
}

impl TelemetryGuard {
    /// Flush buffered telemetry and release exporter resources.
    ///
    /// The flush runs on the blocking pool; if it does not finish within
    /// `timeout` this returns [`TelemetryError::ShutdownTimeout`] and the
    /// flush is abandoned.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), TelemetryError> {
        self.meter.run_upkeep();

        let provider = self.tracer_provider;
        let flush = tokio::task::spawn_blocking(move || provider.shutdown());

        match tokio::time::timeout(timeout, flush).await {
            Ok(Ok(Ok(()))) => {
                ::tracing::debug!("Telemetry exporters flushed");
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(TelemetryError::Shutdown(e.to_string())),
            Ok(Err(e)) => Err(TelemetryError::Shutdown(format!("flush task failed: {}", e))),
            Err(_) => Err(TelemetryError::ShutdownTimeout(timeout)),
        }
    }
}

/// Initialize logging, tracing and metrics for the process.
pub fn init(
    config: &TelemetryConfig,
) -> Result<(TelemetryHandles, TelemetryGuard), TelemetryError> {
    let tracer_provider = tracing::build_tracer_provider(config)?;
    let meter = Meter::new()?;

    let tracer = tracer_provider.tracer(config.service_name.clone());
    if !logging::init_subscriber(config.log_format, tracer) {
        ::tracing::warn!("A tracing subscriber is already installed; keeping it");
    }

    ::tracing::info!(
        service = %config.service_name,
        log_format = %config.log_format,
        otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("disabled"),
        "Telemetry initialized"
    );

    let handles = TelemetryHandles::new(config.service_name.as_str(), meter.clone());
    let guard = TelemetryGuard {
        tracer_provider,
        meter,
    };
    Ok((handles, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_endpoint_is_fatal() {
        let config = TelemetryConfig {
            otlp_endpoint: Some("collector:4317".into()),
            ..TelemetryConfig::default()
        };
        let err = init(&config).err().expect("init must fail");
        assert!(matches!(err, TelemetryError::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_init_and_shutdown() {
        let (handles, guard) = init(&TelemetryConfig::default()).unwrap();
        assert_eq!(handles.service_name(), "rest-api");
        guard.shutdown(Duration::from_secs(5)).await.unwrap();
    }

    #[test]
    fn test_error_display() {
        let err = TelemetryError::ShutdownTimeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "telemetry shutdown did not finish within 5s");
    }
}
