//! Distributed tracing support.
//!
//! # Responsibilities
//! - Build the OpenTelemetry tracer provider (OTLP export when configured)
//! - Extract W3C trace context from incoming requests
//! - Expose the trace id of a request span for log and response correlation

use axum::http::HeaderMap;
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::TraceContextExt;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::TelemetryConfig;
use crate::observability::TelemetryError;

/// Build the tracer provider for this process.
///
/// Without an endpoint the provider still assigns trace and span ids, so
/// correlation works even when nothing is exported.
pub fn build_tracer_provider(
    config: &TelemetryConfig,
) -> Result<SdkTracerProvider, TelemetryError> {
    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();
    let mut builder = SdkTracerProvider::builder().with_resource(resource);

    if let Some(endpoint) = &config.otlp_endpoint {
        validate_endpoint(endpoint)?;
        let exporter = SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint.clone())
            .build()
            .map_err(|e| TelemetryError::Initialization(format!("OTLP span exporter: {}", e)))?;
        builder = builder.with_batch_exporter(exporter);
        tracing::debug!(endpoint = %endpoint, "OTLP span export enabled");
    }

    Ok(builder.build())
}

fn validate_endpoint(endpoint: &str) -> Result<(), TelemetryError> {
    let invalid = |reason: &str| TelemetryError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };
    let url = url::Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(())
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Parent `span` on the caller's trace when the request carries a valid
/// `traceparent` header. Must run before the span is first entered.
pub fn attach_remote_parent(span: &tracing::Span, headers: &HeaderMap) {
    let parent = TraceContextPropagator::new().extract(&HeaderExtractor(headers));
    if parent.span().span_context().is_valid() {
        if let Err(e) = span.set_parent(parent) {
            tracing::debug!(error = %e, "Could not attach remote parent to request span");
        }
    }
}

/// Hex trace id of `span`, if an OpenTelemetry layer is recording it.
pub fn trace_id(span: &tracing::Span) -> Option<String> {
    let cx = span.context();
    let otel_span = cx.span();
    let span_context = otel_span.span_context();
    span_context
        .is_valid()
        .then(|| span_context.trace_id().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_endpoint_validation() {
        assert!(validate_endpoint("http://localhost:4317").is_ok());
        assert!(validate_endpoint("https://collector.example:443").is_ok());
        assert!(validate_endpoint("localhost:4317").is_err());
        assert!(validate_endpoint("ftp://collector").is_err());
        assert!(validate_endpoint("not a url").is_err());
    }

    #[test]
    fn test_trace_id_without_otel_layer() {
        let subscriber = tracing_subscriber::registry();
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("request");
            assert_eq!(trace_id(&span), None);
        });
    }

    #[test]
    fn test_remote_parent_is_honoured() {
        let provider = SdkTracerProvider::builder().build();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("test")));

        tracing::subscriber::with_default(subscriber, || {
            let mut headers = HeaderMap::new();
            headers.insert(
                "traceparent",
                "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
                    .parse()
                    .unwrap(),
            );
            let span = tracing::info_span!("request");
            attach_remote_parent(&span, &headers);
            assert_eq!(
                trace_id(&span).as_deref(),
                Some("4bf92f3577b34da6a3ce929d0e0e4736")
            );

            let fresh = tracing::info_span!("request");
            let id = trace_id(&fresh).expect("otel layer assigns ids");
            assert_eq!(id.len(), 32);
        });
    }
}
