//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT (and SIGTERM on unix)
//! - Translate them into a [`ShutdownSignal`] trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are registered with the OS when [`Signals::install`] returns,
//!   not when the listener task is first polled
//! - Repeated signals keep being consumed but only the first one triggers

use std::io;

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::ShutdownSignal;

/// Registered termination signal streams.
pub struct Signals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Signals {
    /// Register the handlers. Must be called from within a Tokio runtime.
    pub fn install() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next signal. Returns its name, or `None` once no more
    /// signals can be received.
    pub async fn recv(&mut self) -> Option<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                received = self.interrupt.recv() => received.map(|_| "SIGINT"),
                received = self.terminate.recv() => received.map(|_| "SIGTERM"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok().map(|_| "SIGINT")
        }
    }
}

/// Install the signal handlers and spawn a task that triggers `shutdown` on
/// every termination signal.
///
/// The task ends once shutdown has been requested by any means.
pub fn spawn_signal_listener(shutdown: ShutdownSignal) -> io::Result<JoinHandle<()>> {
    let mut signals = Signals::install()?;
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.triggered() => return,
                received = signals.recv() => match received {
                    Some(name) => {
                        tracing::info!(signal = name, "Termination signal received");
                        shutdown.trigger();
                    }
                    None => {
                        tracing::warn!("Signal stream closed");
                        return;
                    }
                },
            }
        }
    }))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_ends_on_trigger() {
        let shutdown = ShutdownSignal::new();
        let listener = spawn_signal_listener(shutdown.clone()).unwrap();
        assert!(!listener.is_finished());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .unwrap()
            .unwrap();
    }
}
