//! HTTP server accept loop.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Serve HTTP/1.1 and HTTP/2 (auto-detected) through the axum router
//! - Bound request header reads with the read timeout
//! - Stop accepting as soon as shutdown is requested
//!
//! # Design Decisions
//! - Connections are served manually with hyper-util so every one of them is
//!   registered for graceful shutdown and can be force-closed at the deadline
//! - Transient accept errors are logged and retried; anything else ends the
//!   loop and is reported to the caller
//! - The listener is dropped when the loop ends, so new connections are refused
//!   while existing ones drain

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use tokio_util::sync::CancellationToken;
use tower::Service;

use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Accept, Listener, ListenerError};

/// Pause after a transient accept failure before accepting again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// HTTP server bound to a listener.
pub struct HttpServer<L = Listener> {
    listener: L,
    app: Router,
    tracker: ConnectionTracker,
    read_timeout: Option<Duration>,
}

impl<L: Accept> HttpServer<L> {
    /// `read_timeout` of `None` disables the header read limit.
    pub fn new(
        listener: L,
        app: Router,
        tracker: ConnectionTracker,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            listener,
            app,
            tracker,
            read_timeout,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled or the listener fails.
    ///
    /// Returns the connection tracker so the caller can drain what is still
    /// open, along with the fatal listener error, if any.
    pub async fn serve(
        self,
        shutdown: CancellationToken,
    ) -> (ConnectionTracker, Result<(), ListenerError>) {
        let HttpServer {
            listener,
            app,
            mut tracker,
            read_timeout,
        } = self;

        let mut builder = AutoBuilder::new(TokioExecutor::new());
        if let Some(timeout) = read_timeout {
            builder
                .http1()
                .timer(TokioTimer::new())
                .header_read_timeout(timeout);
        }

        tracing::info!(
            address = %listener.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            read_timeout = ?read_timeout,
            "HTTP server accepting connections"
        );

        let result = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested; no longer accepting connections");
                    break Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer_addr, permit) = match accepted {
                        Ok(conn) => conn,
                        Err(e) if e.is_transient() => {
                            tracing::warn!(error = %e, "Transient accept error");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Listener failed");
                            break Err(e);
                        }
                    };

                    let app = app.clone();
                    let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let mut app = app.clone();
                        let mut req = req.map(Body::new);
                        req.extensions_mut().insert(ConnectInfo(peer_addr));
                        async move { app.call(req).await }
                    });

                    let conn = builder
                        .serve_connection_with_upgrades(TokioIo::new(stream), service)
                        .into_owned();
                    let guard = tracker.track(peer_addr, permit);
                    tracker.spawn(conn, guard);
                    tracker.reap();
                }
            }
        };

        drop(listener);
        tracing::info!(
            active_connections = tracker.active_count(),
            "HTTP server stopped accepting"
        );
        (tracker, result)
    }
}
