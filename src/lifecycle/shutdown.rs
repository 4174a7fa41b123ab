//! Shutdown coordination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// One-shot shutdown trigger shared by the accept loop, every request and the
/// drain.
///
/// Two tokens are carried: the graceful trigger, and the abort token that is
/// cancelled only when the drain hits its deadline. Triggering more than once
/// has no further effect.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    trigger: CancellationToken,
    abort: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request graceful shutdown. Returns `true` for the call that actually
    /// raised the signal and `false` for every later one.
    pub fn trigger(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            tracing::debug!("Shutdown already requested; ignoring trigger");
            return false;
        }
        tracing::info!("Shutdown requested");
        self.trigger.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.trigger.is_cancelled()
    }

    /// Resolves once shutdown has been requested.
    pub fn triggered(&self) -> WaitForCancellationFuture<'_> {
        self.trigger.cancelled()
    }

    /// Token cancelled on graceful shutdown.
    pub fn token(&self) -> CancellationToken {
        self.trigger.clone()
    }

    /// Token cancelled when in-flight work must be abandoned.
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }
}
