//! Configuration loading from the environment.

use std::collections::HashMap;

use envconfig::Envconfig;

use crate::config::schema::{AppConfig, LogFormat, ServiceConfig, TelemetryConfig};
use crate::config::validation::{parse_port, parse_seconds, validate_service, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Env(envconfig::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Env(e) => write!(f, "Environment error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<Vec<ValidationError>> for ConfigError {
    fn from(errors: Vec<ValidationError>) -> Self {
        ConfigError::Validation(errors)
    }
}

/// Raw environment settings. Values stay strings so every problem can be
/// reported at once instead of failing on the first bad variable.
#[derive(Envconfig, Debug, Clone)]
pub struct EnvSettings {
    #[envconfig(from = "REST_API_HOST", default = "")]
    pub host: String,

    #[envconfig(from = "REST_API_PORT", default = "8888")]
    pub port: String,

    #[envconfig(from = "REST_API_READ_TIMEOUT_SECS", default = "5")]
    pub read_timeout_secs: String,

    #[envconfig(from = "REST_API_WRITE_TIMEOUT_SECS", default = "10")]
    pub write_timeout_secs: String,

    #[envconfig(from = "REST_API_SHUTDOWN_GRACE_SECS", default = "10")]
    pub shutdown_grace_secs: String,

    #[envconfig(from = "REST_API_MAX_CONNECTIONS", default = "10000")]
    pub max_connections: String,

    #[envconfig(from = "REST_API_MAX_BODY_BYTES", default = "2097152")]
    pub max_body_bytes: String,

    #[envconfig(from = "REST_API_LOG_FORMAT", default = "pretty")]
    pub log_format: String,

    #[envconfig(from = "OTEL_SERVICE_NAME", default = "rest-api")]
    pub service_name: String,

    #[envconfig(from = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[envconfig(from = "REST_API_TELEMETRY_SHUTDOWN_TIMEOUT_SECS", default = "5")]
    pub telemetry_shutdown_timeout_secs: String,
}

impl EnvSettings {
    /// Convert raw settings into a validated [`AppConfig`].
    pub fn into_config(self) -> Result<AppConfig, ConfigError> {
        let mut errors = Vec::new();

        let port = keep(&mut errors, parse_port(&self.port));
        let read_timeout = keep(
            &mut errors,
            parse_seconds("read_timeout", &self.read_timeout_secs),
        );
        let write_timeout = keep(
            &mut errors,
            parse_seconds("write_timeout", &self.write_timeout_secs),
        );
        let shutdown_grace = keep(
            &mut errors,
            parse_seconds("shutdown_grace", &self.shutdown_grace_secs),
        );
        let shutdown_timeout = keep(
            &mut errors,
            parse_seconds(
                "telemetry_shutdown_timeout",
                &self.telemetry_shutdown_timeout_secs,
            ),
        );
        let max_connections = keep(
            &mut errors,
            parse_count("max_connections", &self.max_connections),
        );
        let max_body_bytes = keep(
            &mut errors,
            parse_count("max_body_bytes", &self.max_body_bytes),
        );
        let log_format = keep(
            &mut errors,
            self.log_format
                .parse::<LogFormat>()
                .map_err(|reason| ValidationError::Invalid {
                    field: "log_format",
                    reason,
                }),
        );

        let (
            Some(port),
            Some(read_timeout),
            Some(write_timeout),
            Some(shutdown_grace),
            Some(shutdown_timeout),
            Some(max_connections),
            Some(max_body_bytes),
            Some(log_format),
        ) = (
            port,
            read_timeout,
            write_timeout,
            shutdown_grace,
            shutdown_timeout,
            max_connections,
            max_body_bytes,
            log_format,
        )
        else {
            return Err(ConfigError::Validation(errors));
        };

        let service = ServiceConfig {
            host: self.host.trim().to_string(),
            port,
            read_timeout,
            write_timeout,
            shutdown_grace,
            max_connections,
            max_body_bytes,
        };
        validate_service(&service)?;

        let service_name = match self.service_name.trim() {
            "" => TelemetryConfig::default().service_name,
            name => name.to_string(),
        };

        Ok(AppConfig {
            service,
            telemetry: TelemetryConfig {
                service_name,
                otlp_endpoint: self
                    .otlp_endpoint
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty()),
                log_format,
                shutdown_timeout,
            },
        })
    }
}

fn keep<T>(errors: &mut Vec<ValidationError>, result: Result<T, ValidationError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

fn parse_count(field: &'static str, raw: &str) -> Result<usize, ValidationError> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| ValidationError::Invalid {
            field,
            reason: e.to_string(),
        })
}

/// Load and validate configuration from the process environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    EnvSettings::init_from_env()
        .map_err(ConfigError::Env)?
        .into_config()
}

/// Load and validate configuration from an explicit variable map.
pub fn load_config_from(vars: &HashMap<String, String>) -> Result<AppConfig, ConfigError> {
    EnvSettings::init_from_hashmap(vars)
        .map_err(ConfigError::Env)?
        .into_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = load_config_from(&HashMap::new()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.telemetry.otlp_endpoint, None);
    }

    #[test]
    fn test_overrides() {
        let config = load_config_from(&vars(&[
            ("REST_API_HOST", "127.0.0.1"),
            ("REST_API_PORT", "9090"),
            ("REST_API_SHUTDOWN_GRACE_SECS", "2"),
            ("REST_API_READ_TIMEOUT_SECS", "0.5"),
            ("REST_API_LOG_FORMAT", "json"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317"),
        ]))
        .unwrap();

        assert_eq!(config.service.bind_address(), "127.0.0.1:9090");
        assert_eq!(config.service.shutdown_grace, Duration::from_secs(2));
        assert_eq!(config.service.read_timeout, Duration::from_millis(500));
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
        assert_eq!(
            config.telemetry.otlp_endpoint.as_deref(),
            Some("http://collector:4317")
        );
    }

    #[test]
    fn test_reports_every_bad_value() {
        let err = load_config_from(&vars(&[
            ("REST_API_PORT", "http"),
            ("REST_API_WRITE_TIMEOUT_SECS", "-3"),
            ("REST_API_LOG_FORMAT", "xml"),
        ]))
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_blank_endpoint_is_disabled() {
        let config = load_config_from(&vars(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "  ")])).unwrap();
        assert_eq!(config.telemetry.otlp_endpoint, None);
    }
}
