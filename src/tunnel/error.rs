//! Tunnel supervisor error definitions.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::provision::ProvisionError;

/// Errors that settle a `start()` call.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// A session is already starting or active.
    #[error("tunnel is already running")]
    AlreadyRunning,

    /// No usable binary could be resolved.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// The resolved binary vanished or lost its execute bit before spawn.
    #[error("tunnel binary {} is not executable: {}", .path.display(), .source)]
    BinaryNotExecutable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Spawning failed for a reason other than the binary itself.
    #[error("failed to spawn tunnel process: {0}")]
    ProcessSpawn(#[source] std::io::Error),

    /// The process ended before a public hostname appeared.
    #[error("tunnel process exited (code {code:?}) before a public URL appeared; output: {output}")]
    ProcessExitedPrematurely { code: Option<i32>, output: String },

    /// No public hostname within the acquisition window.
    #[error("no public URL within {timeout:?}; output: {output}")]
    AcquisitionTimeout { timeout: Duration, output: String },

    /// `stop()` was called while the acquisition was still pending.
    #[error("tunnel start cancelled by stop()")]
    Cancelled,
}

impl TunnelError {
    /// Captured subprocess output attached to this error, if any.
    pub fn diagnostic_output(&self) -> Option<&str> {
        match self {
            TunnelError::ProcessExitedPrematurely { output, .. }
            | TunnelError::AcquisitionTimeout { output, .. } => Some(output),
            _ => None,
        }
    }
}
