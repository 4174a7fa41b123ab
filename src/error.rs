//! Process-level errors.

use std::time::Duration;

use crate::config::ConfigError;
use crate::observability::TelemetryError;
use crate::routing::RouteError;

/// Everything that can end a service run.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error(transparent)]
    Initialization(TelemetryError),

    #[error("route table error: {0}")]
    Route(#[from] RouteError),

    #[error("listener failed while serving: {0}")]
    Serve(#[source] std::io::Error),

    #[error("shutdown grace period of {grace:?} expired; {forced} connection(s) force-closed")]
    ShutdownTimeout { grace: Duration, forced: u64 },

    #[error(transparent)]
    TelemetryShutdown(TelemetryError),
}

impl ServiceError {
    /// Whether this error should make the process exit non-zero.
    ///
    /// A drain that hit its deadline still stopped the service cleanly.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ServiceError::ShutdownTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        let timeout = ServiceError::ShutdownTimeout {
            grace: Duration::from_secs(2),
            forced: 3,
        };
        assert!(!timeout.is_fatal());
        assert_eq!(
            timeout.to_string(),
            "shutdown grace period of 2s expired; 3 connection(s) force-closed"
        );

        let bind = ServiceError::Bind {
            addr: "0.0.0.0:8888".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(bind.is_fatal());
        assert!(bind.to_string().starts_with("failed to bind 0.0.0.0:8888"));
    }
}
