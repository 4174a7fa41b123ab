//! Instrumented REST API service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ net::listener ─▶ http::server ─▶ routing::dispatch ─▶ handlers
//!                                                           │
//!                                                           ▼
//!                                                 observability (spans, meter)
//!
//!     lifecycle: startup → runner (Idle → Starting → Serving → ShuttingDown → Stopped)
//!     config:    environment → AppConfig
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::AppConfig;
pub use error::ServiceError;
pub use lifecycle::{RunnerState, ServiceRunner, ShutdownSignal};
