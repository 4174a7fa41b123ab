//! Configuration schema definitions.
//!
//! Plain value types produced by the loader. Nothing here is mutated after
//! startup; the runner owns its [`ServiceConfig`] and the telemetry provider
//! owns its [`TelemetryConfig`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration for the service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// Listener, timeout and shutdown settings.
    pub service: ServiceConfig,

    /// Logging, tracing and metrics settings.
    pub telemetry: TelemetryConfig,
}

/// Listener and lifecycle configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Bind host. Empty binds every interface.
    pub host: String,

    /// Bind port. `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// Time allowed to read a request's headers. Zero disables the limit.
    pub read_timeout: Duration,

    /// Time allowed for a handler to produce its response. Zero disables the limit.
    pub write_timeout: Duration,

    /// How long shutdown waits for in-flight requests before closing them.
    pub shutdown_grace: Duration,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl ServiceConfig {
    /// Address string handed to the resolver, e.g. `0.0.0.0:8888` or `[::1]:80`.
    pub fn bind_address(&self) -> String {
        let host = match self.host.as_str() {
            "" => "0.0.0.0",
            h => h,
        };
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8888,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(10),
            max_connections: 10_000,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per record.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Telemetry provider configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Service name attached to spans and logs.
    pub service_name: String,

    /// OTLP gRPC collector endpoint. `None` keeps spans in-process only.
    pub otlp_endpoint: Option<String>,

    /// Log output format.
    pub log_format: LogFormat,

    /// Deadline for flushing exporters at shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "rest-api".to_string(),
            otlp_endpoint: None,
            log_format: LogFormat::Pretty,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}
