//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → loader.rs (read variables, parse values)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → ServiceConfig to the runner, TelemetryConfig to the provider
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - Every variable has a default so an empty environment is valid
//! - Validation separates parsing from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AppConfig, LogFormat, ServiceConfig, TelemetryConfig};
