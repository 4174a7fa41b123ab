//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper-util auto builder, header read timeout)
//!     → axum router (routing::dispatch instrumentation)
//!     → request.rs (RequestContext handed to the handler)
//!     → response.rs (error bodies, x-trace-id)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID, X_TRACE_ID};
pub use server::HttpServer;
