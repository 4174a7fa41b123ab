//! TCP listener with a connection cap.
//!
//! # Responsibilities
//! - Bind the configured address
//! - Accept incoming TCP connections
//! - Enforce `max_connections` via semaphore
//! - Classify accept errors as transient or fatal

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind { addr: String, source: io::Error },
    /// Failed to accept connection.
    Accept(io::Error),
    /// The connection limit was closed; no more connections will be accepted.
    Closed,
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind { addr, source } => {
                write!(f, "Failed to bind {}: {}", addr, source)
            }
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
            ListenerError::Closed => write!(f, "Listener closed"),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind { source, .. } => Some(source),
            ListenerError::Accept(e) => Some(e),
            ListenerError::Closed => None,
        }
    }
}

impl ListenerError {
    /// Whether the accept loop should keep going after this error.
    pub fn is_transient(&self) -> bool {
        match self {
            ListenerError::Accept(e) => is_transient(e),
            _ => false,
        }
    }
}

/// Per-connection accept failures that leave the listening socket usable.
///
/// Descriptor exhaustion is included: the socket recovers once connections
/// close, so the loop backs off instead of exiting.
pub fn is_transient(error: &io::Error) -> bool {
    if matches!(
        error.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) {
        return true;
    }
    // EMFILE / ENFILE
    matches!(error.raw_os_error(), Some(23) | Some(24))
}

/// An accepted connection, with the slot it occupies.
pub type Accepted = (TcpStream, SocketAddr, ConnectionPermit);

/// Source of connections for the accept loop.
pub trait Accept: Send + Sync + 'static {
    fn accept(&self) -> impl Future<Output = Result<Accepted, ListenerError>> + Send;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// A bounded TCP listener that limits concurrent connections.
///
/// When the limit is reached, `accept` waits until a slot frees up.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind to `addr` (e.g. `0.0.0.0:8888`).
    pub async fn bind(addr: &str, max_connections: usize) -> Result<Self, ListenerError> {
        let bind_error = |source: io::Error| ListenerError::Bind {
            addr: addr.to_string(),
            source,
        };

        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        tracing::info!(
            address = %local_addr,
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// The returned permit must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<Accepted, ListenerError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        tracing::trace!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.inner.local_addr()
    }

    /// Currently free connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

impl Accept for Listener {
    fn accept(&self) -> impl Future<Output = Result<Accepted, ListenerError>> + Send {
        Listener::accept(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Listener::local_addr(self)
    }
}

/// A connection slot. Released back to the listener on drop, including when
/// the connection task panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_conflict_reports_address() {
        let first = Listener::bind("127.0.0.1:0", 4).await.unwrap();
        let addr = first.local_addr().unwrap().to_string();

        let err = Listener::bind(&addr, 4).await.err().expect("second bind must fail");
        match &err {
            ListenerError::Bind { addr: reported, source } => {
                assert_eq!(reported, &addr);
                assert_eq!(source.kind(), io::ErrorKind::AddrInUse);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let listener = Listener::bind("127.0.0.1:0", 1).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _peer, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 0);

        drop(permit);
        assert_eq!(listener.available_permits(), 1);
        assert_eq!(listener.max_connections(), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(is_transient(&io::Error::from_raw_os_error(24)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!ListenerError::Closed.is_transient());
    }
}
