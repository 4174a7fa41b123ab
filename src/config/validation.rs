//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of values the loader already parsed
//! - Validate value ranges (timeouts non-negative, connection cap > 0)
//! - Check the bind host is something the resolver can use
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs again in the runner before the listener is bound

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use crate::config::schema::ServiceConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Host is neither empty, an IP address, nor a valid hostname.
    InvalidHost(String),
    /// Port is not a number in 0..=65535.
    InvalidPort(String),
    /// A duration was negative, not a number, or out of range.
    InvalidDuration { field: &'static str, value: String },
    /// A value that must be positive was zero.
    Zero(&'static str),
    /// Any other unparseable value.
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidHost(h) => write!(f, "invalid host '{}'", h),
            ValidationError::InvalidPort(p) => write!(f, "invalid port '{}'", p),
            ValidationError::InvalidDuration { field, value } => {
                write!(f, "{} must be a non-negative number of seconds, got '{}'", field, value)
            }
            ValidationError::Zero(field) => write!(f, "{} must be greater than zero", field),
            ValidationError::Invalid { field, reason } => write!(f, "{}: {}", field, reason),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a service configuration.
pub fn validate_service(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !is_valid_host(&config.host) {
        errors.push(ValidationError::InvalidHost(config.host.clone()));
    }
    if config.max_connections == 0 {
        errors.push(ValidationError::Zero("max_connections"));
    }
    if config.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("max_body_bytes"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse a seconds value such as `5`, `0.25` or `10s` into a [`Duration`].
pub fn parse_seconds(field: &'static str, raw: &str) -> Result<Duration, ValidationError> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix('s').unwrap_or(trimmed);
    number
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ValidationError::InvalidDuration {
            field,
            value: raw.to_string(),
        })
}

/// Parse a port number.
pub fn parse_port(raw: &str) -> Result<u16, ValidationError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| ValidationError::InvalidPort(raw.to_string()))
}

fn is_valid_host(host: &str) -> bool {
    if host.is_empty() {
        return true;
    }
    let unbracketed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if unbracketed.parse::<IpAddr>().is_ok() {
        return true;
    }
    // RFC 1123 hostname
    host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
