//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection cap)
//!     → connection.rs (tracking, graceful-shutdown watcher)
//!     → Hand off to HTTP layer
//!
//! Connection States:
//!     Accepted → Active → Draining → Closed (or force-closed)
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;
