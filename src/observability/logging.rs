//! Structured logging.
//!
//! # Responsibilities
//! - Install the process `tracing` subscriber
//! - Bridge spans into OpenTelemetry
//! - Configure log level at runtime via `RUST_LOG`
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - Records inside a request carry the request span's fields (trace_id, route)

use opentelemetry_sdk::trace::SdkTracer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "rest_api=info,info";

/// Build the env filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber: env filter, fmt layer and OpenTelemetry bridge.
///
/// Returns `false` when a subscriber was already installed; the existing one
/// is kept.
pub fn init_subscriber(format: LogFormat, tracer: SdkTracer) -> bool {
    let (json, pretty) = match format {
        LogFormat::Json => (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            ),
            None,
        ),
        LogFormat::Pretty => (None, Some(tracing_subscriber::fmt::layer().with_target(true))),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(json)
        .with(pretty)
        .try_init()
        .is_ok()
}
