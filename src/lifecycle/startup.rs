//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the OS signal listener before anything else, so a signal during
//!   startup still ends in an orderly teardown
//! - Initialize telemetry
//! - Build the route table and start the service runner
//! - Tear telemetry down on every exit path after it was initialized
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener starts last (traffic only when ready)
//! - The first error wins; telemetry shutdown errors only surface when
//!   nothing else failed

use crate::config::{AppConfig, ServiceConfig};
use crate::error::ServiceError;
use crate::handlers;
use crate::lifecycle::runner::ServiceRunner;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::observability::{self, TelemetryError, TelemetryHandles};
use crate::routing::{RouteError, RouteTable};

/// Run the service until it is shut down.
///
/// `shutdown` is triggered by SIGINT/SIGTERM; callers may also trigger it
/// themselves.
pub async fn run(config: AppConfig, shutdown: ShutdownSignal) -> Result<(), ServiceError> {
    run_with(config, shutdown, handlers::routes).await
}

/// [`run`] with a custom route table.
pub async fn run_with<F>(
    config: AppConfig,
    shutdown: ShutdownSignal,
    routes: F,
) -> Result<(), ServiceError>
where
    F: FnOnce(&TelemetryHandles) -> Result<RouteTable, RouteError>,
{
    let signals = spawn_signal_listener(shutdown.clone()).map_err(ServiceError::Signals)?;
    let result = run_instrumented(config, shutdown, routes).await;
    signals.abort();
    result
}

async fn run_instrumented<F>(
    config: AppConfig,
    shutdown: ShutdownSignal,
    routes: F,
) -> Result<(), ServiceError>
where
    F: FnOnce(&TelemetryHandles) -> Result<RouteTable, RouteError>,
{
    let (telemetry, guard) =
        observability::init(&config.telemetry).map_err(ServiceError::Initialization)?;

    tracing::info!(
        bind_address = %config.service.bind_address(),
        read_timeout = ?config.service.read_timeout,
        write_timeout = ?config.service.write_timeout,
        shutdown_grace = ?config.service.shutdown_grace,
        max_connections = config.service.max_connections,
        "Configuration loaded"
    );

    let served = serve(config.service, &telemetry, shutdown, routes).await;
    let teardown = guard.shutdown(config.telemetry.shutdown_timeout).await;
    merge(served, teardown)
}

async fn serve<F>(
    config: ServiceConfig,
    telemetry: &TelemetryHandles,
    shutdown: ShutdownSignal,
    routes: F,
) -> Result<(), ServiceError>
where
    F: FnOnce(&TelemetryHandles) -> Result<RouteTable, RouteError>,
{
    let routes = routes(telemetry)?;
    tracing::info!(routes = routes.len(), "Route table built");

    if shutdown.is_triggered() {
        tracing::info!("Shutdown requested during startup; not starting the listener");
        return Ok(());
    }

    let runner = ServiceRunner::new(config, telemetry.clone(), shutdown);
    let running = runner.start(routes).await?;
    running.wait().await
}

fn merge(
    served: Result<(), ServiceError>,
    teardown: Result<(), TelemetryError>,
) -> Result<(), ServiceError> {
    let served = match served {
        Err(e) if !e.is_fatal() => {
            tracing::warn!(error = %e, "Shutdown did not complete cleanly");
            Ok(())
        }
        other => other,
    };

    match (served, teardown) {
        (Err(e), Err(teardown)) => {
            tracing::error!(error = %teardown, "Telemetry shutdown failed");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), Err(teardown)) => Err(ServiceError::TelemetryShutdown(teardown)),
        (Ok(()), Ok(())) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_merge_precedence() {
        let timeout = || ServiceError::ShutdownTimeout {
            grace: Duration::from_secs(1),
            forced: 1,
        };
        let serve_error = || ServiceError::Serve(std::io::Error::other("accept"));
        let teardown_error = || TelemetryError::Shutdown("exporter".into());

        assert!(merge(Err(timeout()), Ok(())).is_ok());
        assert!(matches!(
            merge(Err(timeout()), Err(teardown_error())),
            Err(ServiceError::TelemetryShutdown(_))
        ));
        assert!(matches!(
            merge(Err(serve_error()), Err(teardown_error())),
            Err(ServiceError::Serve(_))
        ));
        assert!(matches!(
            merge(Ok(()), Err(teardown_error())),
            Err(ServiceError::TelemetryShutdown(_))
        ));
    }
}
