//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route registration (at startup):
//!     RouteTableBuilder::register(method, pattern, name, handler)
//!     → matcher.rs (validate pattern, detect duplicates)
//!     → build() freezes the table
//!     → into_router() wraps every route in dispatch.rs instrumentation
//!
//! Incoming Request (method, path)
//!     → path router lookup (static segments before captures)
//!     → dispatch.rs (span named after the route, handler, counters)
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Spans and metrics are labelled by route name, never by raw path
//! - Misses are observable: they get an `unmatched` span and counter

pub mod dispatch;
pub mod handler;
pub mod matcher;
pub mod router;

use axum::http::Method;

pub use handler::{Handler, HandlerError, HandlerResult};
pub use router::{DispatchOptions, RouteRegistration, RouteTable, RouteTableBuilder};

/// Errors raised while building the route table.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("route {method} {pattern} is already registered as '{existing}'")]
    DuplicateRoute {
        method: Method,
        pattern: String,
        existing: String,
    },

    #[error("route pattern '{pattern}' conflicts with '{existing}': parameter names differ")]
    ConflictingPattern { pattern: String, existing: String },

    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("unsupported method {0}")]
    UnsupportedMethod(Method),

    #[error("invalid route name '{0}'")]
    InvalidName(String),
}
