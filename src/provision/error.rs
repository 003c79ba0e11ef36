//! Provisioning error definitions.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while locating or installing the tunnel binary.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// No release asset exists for this OS/architecture pair.
    #[error("no tunnel binary published for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// Fetching the release asset failed.
    #[error("download failed: {0}")]
    DownloadFailed(String),

    /// Unpacking the release archive failed.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// The binary did not answer the version probe.
    #[error("verification of {} failed: {}", .path.display(), .output)]
    VerificationFailed { path: PathBuf, output: String },

    /// Filesystem error outside the download and install steps: creating the
    /// managed directory or setting the executable bit.
    #[error("I/O error at {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProvisionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for provisioning operations.
pub type ProvisionResult<T> = Result<T, ProvisionError>;
