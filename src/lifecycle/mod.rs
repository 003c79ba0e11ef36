//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Provisioner → Dispatcher (routes, listen) → Supervisor (tunnel)
//!
//! Shutdown (signals.rs → startup.rs):
//!     SIGTERM/SIGINT → stop tunnel → stop listener → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: the listener must own its port before the tunnel points at it
//! - Tunnel failure is logged, never fatal; local access keeps working
//! - Ordered shutdown: tunnel first, so no public request hits a closing listener

pub mod signals;
pub mod startup;
