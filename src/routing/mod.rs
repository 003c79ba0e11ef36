//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (before start):
//!     (method, "/pages/:slug", handler)
//!     → pattern.rs (compile template into segments)
//!     → table.rs (append in registration order)
//!
//! Incoming Request (method, path)
//!     → table.rs (scan routes with matching method)
//!     → pattern.rs (segment match, capture params)
//!     → Return: matched Route + Params, or NoMatch
//! ```
//!
//! # Design Decisions
//! - Patterns compiled at registration, table frozen while listening
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod pattern;
pub mod table;

pub use pattern::{Method, Params, PatternError, RoutePattern};
pub use table::{Handler, Route, RouteTable};
