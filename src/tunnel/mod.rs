//! Public tunnel subsystem.
//!
//! # Data Flow
//! ```text
//! start(prefer_managed_only)
//!     → provision::Provisioner::resolve (verified binary path)
//!     → spawn `<binary> tunnel --url http://localhost:<port>` (no shell)
//!     → output.rs (bounded tail, hostname scan on every chunk)
//!     → supervisor.rs (race: hostname / exit / timer / stop)
//!     → Active { public_url } or TunnelError
//! ```
//!
//! # Design Decisions
//! - One session per supervisor; a second start() is rejected, never queued
//! - Acquisition state lives per call, not on the supervisor
//! - Failures here never touch the dispatcher; local access keeps working

pub mod error;
pub mod output;
pub mod supervisor;

pub use error::TunnelError;
pub use supervisor::{SessionInfo, StartOptions, TunnelSupervisor};
