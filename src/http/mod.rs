//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (127.0.0.1 only)
//!     → server.rs (Axum setup, preflight short-circuit)
//!     → [routing table picks handler] (first match)
//!     → handler writes response via response.rs
//!     → cors.rs (uniform headers on every response)
//!     → Send to client
//! ```

pub mod cors;
pub mod response;
pub mod server;

pub use response::{send_error, send_html, send_json};
pub use server::{Dispatcher, ServerError};
