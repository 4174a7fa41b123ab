//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Telemetry → Route table → Runner start (validate, bind, accept loop)
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → ShutdownSignal::trigger
//!
//! Shutdown (runner.rs, shutdown.rs):
//!     Trigger → Stop accepting → Drain connections (grace) → Force-close
//!     → Telemetry teardown → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: telemetry first, listener last
//! - Ordered shutdown: stop accept, drain, close, flush telemetry
//! - Shutdown has a deadline: remaining connections are aborted after it

pub mod runner;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use runner::{RunningService, ServiceRunner};
pub use shutdown::ShutdownSignal;
pub use state::RunnerState;
