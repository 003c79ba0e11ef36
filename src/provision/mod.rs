//! Tunnel binary provisioning subsystem.
//!
//! # Data Flow
//! ```text
//! resolve(prefer_managed_only)
//!     → provisioner.rs (resolution order, per-path lock)
//!     → verify.rs (bounded `--version` probe per candidate)
//!     → platform.rs (OS/arch → DownloadDescriptor)      on full miss
//!     → download.rs (manual redirects, progress)
//!     → install.rs (bare rename or tar.gz extraction, chmod)
//!     → verify.rs (final probe)
//!     → BinaryLocation { path, origin }
//! ```
//!
//! # Design Decisions
//! - Unsupported platforms fail before any directory is created or request sent
//! - A verified managed copy short-circuits every later resolve (no network)
//! - Extraction is a strategy keyed by `needs_extraction`, not by OS

pub mod download;
pub mod error;
pub mod install;
pub mod platform;
pub mod provisioner;
pub mod verify;

pub use error::{ProvisionError, ProvisionResult};
pub use platform::{DownloadDescriptor, Platform};
pub use provisioner::{BinaryLocation, BinaryOrigin, Provisioner};
