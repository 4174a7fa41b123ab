//! Service runner.
//!
//! # Responsibilities
//! - Validate the service configuration and bind the listener
//! - Launch the accept loop on a background task
//! - Wait for a shutdown trigger or an accept loop failure
//! - Drain connections on a second task, bounded by the grace period
//! - Publish every state transition on a watch channel
//!
//! # Data Flow
//! ```text
//! ServiceRunner::start(routes)  (or start_with(listener, routes))
//!     Idle → Starting: validate config, bind listener
//!     Starting → Serving: spawn accept loop
//!
//! RunningService::wait()
//!     trigger or accept failure → ShuttingDown
//!     accept loop returns the connection tracker
//!     drain task (grace period, then force-close) → Stopped
//! ```

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::validation::validate_service;
use crate::config::{ConfigError, ServiceConfig};
use crate::error::ServiceError;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::lifecycle::state::RunnerState;
use crate::net::connection::{ConnectionTracker, DrainOutcome};
use crate::net::listener::{Accept, Listener, ListenerError};
use crate::observability::metrics::ACTIVE_CONNECTIONS;
use crate::observability::TelemetryHandles;
use crate::routing::{DispatchOptions, RouteTable};

type AcceptLoop = JoinHandle<(ConnectionTracker, Result<(), ListenerError>)>;

/// Owns the service configuration until the listener is started.
pub struct ServiceRunner {
    config: ServiceConfig,
    telemetry: TelemetryHandles,
    shutdown: ShutdownSignal,
    state: watch::Sender<RunnerState>,
}

impl ServiceRunner {
    pub fn new(
        config: ServiceConfig,
        telemetry: TelemetryHandles,
        shutdown: ShutdownSignal,
    ) -> Self {
        let (state, _) = watch::channel(RunnerState::Idle);
        Self {
            config,
            telemetry,
            shutdown,
            state,
        }
    }

    pub fn state(&self) -> RunnerState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RunnerState> {
        self.state.subscribe()
    }

    /// Bind the listener and start accepting in the background.
    ///
    /// The route table is frozen at this point; nothing can be registered
    /// once the service is running.
    pub async fn start(self, routes: RouteTable) -> Result<RunningService, ServiceError> {
        self.prepare()?;

        let addr = self.config.bind_address();
        match Listener::bind(&addr, self.config.max_connections).await {
            Ok(listener) => self.launch(listener, routes),
            Err(e) => {
                transition(&self.state, RunnerState::Failed);
                Err(match e {
                    ListenerError::Bind { addr, source } => ServiceError::Bind { addr, source },
                    other => ServiceError::Bind {
                        addr,
                        source: io::Error::other(other.to_string()),
                    },
                })
            }
        }
    }

    /// Start accepting from an already bound connection source.
    pub fn start_with<L: Accept>(
        self,
        listener: L,
        routes: RouteTable,
    ) -> Result<RunningService, ServiceError> {
        self.prepare()?;
        self.launch(listener, routes)
    }

    fn prepare(&self) -> Result<(), ServiceError> {
        transition(&self.state, RunnerState::Starting);
        if let Err(errors) = validate_service(&self.config) {
            transition(&self.state, RunnerState::Failed);
            return Err(ConfigError::from(errors).into());
        }
        Ok(())
    }

    fn launch<L: Accept>(
        self,
        listener: L,
        routes: RouteTable,
    ) -> Result<RunningService, ServiceError> {
        let ServiceRunner {
            config,
            telemetry,
            shutdown,
            state,
        } = self;

        let local_addr = match listener.local_addr() {
            Ok(local_addr) => local_addr,
            Err(source) => {
                transition(&state, RunnerState::Failed);
                return Err(ServiceError::Bind {
                    addr: config.bind_address(),
                    source,
                });
            }
        };

        let options = DispatchOptions::new(&config, shutdown.abort_token());
        let app = routes.into_router(&telemetry, options);
        let tracker = ConnectionTracker::new(telemetry.meter().gauge(ACTIVE_CONNECTIONS));
        let read_timeout = (!config.read_timeout.is_zero()).then_some(config.read_timeout);
        let server = HttpServer::new(listener, app, tracker, read_timeout);

        let accept = tokio::spawn(server.serve(shutdown.token()));
        transition(&state, RunnerState::Serving);
        tracing::info!(address = %local_addr, "Service is serving");

        Ok(RunningService {
            local_addr,
            grace: config.shutdown_grace,
            shutdown,
            state,
            accept,
        })
    }
}

/// A started service. Call [`RunningService::wait`] to run it to completion.
pub struct RunningService {
    local_addr: SocketAddr,
    grace: Duration,
    shutdown: ShutdownSignal,
    state: watch::Sender<RunnerState>,
    accept: AcceptLoop,
}

impl RunningService {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub fn state(&self) -> RunnerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunnerState> {
        self.state.subscribe()
    }

    /// Serve until shutdown is triggered or the accept loop fails, then drain.
    ///
    /// A drain that hits the grace deadline yields
    /// [`ServiceError::ShutdownTimeout`]; a listener failure yields
    /// [`ServiceError::Serve`] after the drain has run.
    pub async fn wait(self) -> Result<(), ServiceError> {
        let RunningService {
            grace,
            shutdown,
            state,
            mut accept,
            ..
        } = self;

        let finished = tokio::select! {
            _ = shutdown.triggered() => None,
            joined = &mut accept => Some(joined),
        };

        // Stops the accept loop when it is still running; no-op otherwise.
        shutdown.trigger();
        transition(&state, RunnerState::ShuttingDown);

        let joined = match finished {
            Some(joined) => joined,
            None => accept.await,
        };
        let (tracker, served) = match joined {
            Ok(joined) => joined,
            Err(e) => {
                tracing::error!(error = %e, "Accept loop task failed");
                transition(&state, RunnerState::Failed);
                return Err(ServiceError::Serve(io::Error::other(format!(
                    "accept loop task failed: {}",
                    e
                ))));
            }
        };

        let abort = shutdown.abort_token();
        let drain = tokio::spawn(async move { tracker.drain(grace, &abort).await });
        let drained = match drain.await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(ServiceError::Serve(io::Error::other(format!(
                "drain task failed: {}",
                e
            )))),
        };

        let served = served.map_err(|e| match e {
            ListenerError::Accept(source) => ServiceError::Serve(source),
            other => ServiceError::Serve(io::Error::other(other.to_string())),
        });

        match (served, drained) {
            (Err(e), _) | (Ok(()), Err(e)) => {
                transition(&state, RunnerState::Failed);
                Err(e)
            }
            (Ok(()), Ok(DrainOutcome::Drained)) => {
                transition(&state, RunnerState::Stopped);
                tracing::info!("Service stopped");
                Ok(())
            }
            (Ok(()), Ok(DrainOutcome::Forced { remaining })) => {
                transition(&state, RunnerState::Stopped);
                tracing::info!("Service stopped");
                Err(ServiceError::ShutdownTimeout {
                    grace,
                    forced: remaining,
                })
            }
        }
    }
}

fn transition(state: &watch::Sender<RunnerState>, next: RunnerState) {
    let previous = state.send_replace(next);
    if previous.can_transition_to(next) {
        tracing::debug!(from = %previous, to = %next, "Runner state changed");
    } else {
        tracing::warn!(from = %previous, to = %next, "Unexpected runner state transition");
    }
}
