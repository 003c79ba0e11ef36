//! Local share server library.
//!
//! Serves host-application content on a loopback-only HTTP dispatcher and
//! publishes it through a supervised quick tunnel.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod provision;
pub mod routing;
pub mod tunnel;

pub use config::schema::ShareConfig;
pub use http::Dispatcher;
pub use provision::Provisioner;
pub use tunnel::TunnelSupervisor;
