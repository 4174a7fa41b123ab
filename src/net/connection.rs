//! Connection lifecycle tracking.
//!
//! # Responsibilities
//! - Own every connection task and its graceful-shutdown watcher
//! - Generate unique connection IDs for tracing
//! - Keep the active-connection count and gauge current
//! - Drain connections within a grace period, then force-close
//!
//! # Design Decisions
//! - Connection tasks live in a `JoinSet` so a forced shutdown can abort them
//! - The count is decremented by a guard, so panicking tasks are still counted out

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper_util::server::graceful::{GracefulConnection, GracefulShutdown};
use metrics::Gauge;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::net::listener::ConnectionPermit;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How a drain finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every connection closed within the grace period.
    Drained,
    /// The grace period expired; `remaining` connections were force-closed.
    Forced { remaining: u64 },
}

/// Tracks open connections for graceful shutdown.
pub struct ConnectionTracker {
    graceful: GracefulShutdown,
    tasks: JoinSet<()>,
    active_count: Arc<AtomicU64>,
    gauge: Gauge,
}

impl ConnectionTracker {
    pub fn new(gauge: Gauge) -> Self {
        Self {
            graceful: GracefulShutdown::new(),
            tasks: JoinSet::new(),
            active_count: Arc::new(AtomicU64::new(0)),
            gauge,
        }
    }

    /// Record a new connection. The returned guard counts it out on drop.
    pub fn track(&self, peer_addr: SocketAddr, permit: ConnectionPermit) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        self.gauge.increment(1.0);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            gauge: self.gauge.clone(),
            id: ConnectionId::new(),
            peer_addr,
            _permit: permit,
        }
    }

    /// Serve `conn` on its own task, watched for graceful shutdown.
    pub fn spawn<C>(&mut self, conn: C, guard: ConnectionGuard)
    where
        C: GracefulConnection + Send + 'static,
        C::Error: std::fmt::Display + Send,
    {
        let conn = self.graceful.watch(conn);
        self.tasks.spawn(serve(conn, guard));
    }

    /// Collect finished connection tasks without waiting.
    pub fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            log_join_error(result);
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Ask every connection to finish its in-flight request and close, then
    /// wait up to `grace`. On expiry `abort` is cancelled and the remaining
    /// connection tasks are aborted.
    pub async fn drain(self, grace: Duration, abort: &CancellationToken) -> DrainOutcome {
        let ConnectionTracker {
            graceful,
            mut tasks,
            active_count,
            ..
        } = self;

        tracing::info!(
            active_connections = active_count.load(Ordering::SeqCst),
            grace = ?grace,
            "Draining connections"
        );

        let drained = tokio::time::timeout(grace, async {
            graceful.shutdown().await;
            while let Some(result) = tasks.join_next().await {
                log_join_error(result);
            }
        })
        .await;

        if drained.is_ok() {
            return DrainOutcome::Drained;
        }

        let remaining = active_count.load(Ordering::SeqCst);
        tracing::warn!(remaining, "Grace period expired; force-closing connections");
        abort.cancel();
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        DrainOutcome::Forced { remaining }
    }
}

async fn serve<F, E>(conn: F, guard: ConnectionGuard)
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    tracing::trace!(
        connection_id = %guard.id(),
        peer_addr = %guard.peer_addr(),
        "Connection opened"
    );
    if let Err(e) = conn.await {
        tracing::debug!(connection_id = %guard.id(), error = %e, "Connection closed with error");
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "Connection task panicked");
        }
    }
}

/// Guard that tracks a connection's lifetime and holds its listener slot.
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    gauge: Gauge,
    id: ConnectionId,
    peer_addr: SocketAddr,
    _permit: ConnectionPermit,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .finish_non_exhaustive()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        self.gauge.decrement(1.0);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
