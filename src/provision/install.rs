//! Turning a downloaded asset into the managed executable.
//!
//! # Strategies
//! - `BareExecutable`: the asset is the binary; move it into place
//! - `TarGzArchive`: the asset is a gzip'd tarball; extract the binary entry
//!
//! The strategy is picked from `DownloadDescriptor::needs_extraction`, so the
//! download/verify flow never branches on the OS name.

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::Path;

use crate::provision::error::{ProvisionError, ProvisionResult};
use crate::provision::platform::DownloadDescriptor;

/// Installs a downloaded asset as the executable at `target`.
pub trait AssetInstaller: Send + Sync {
    fn install(&self, asset: &Path, target: &Path) -> ProvisionResult<()>;
}

/// Pick the installation strategy for a descriptor.
pub fn installer_for(descriptor: &DownloadDescriptor) -> Box<dyn AssetInstaller> {
    if descriptor.needs_extraction {
        Box::new(TarGzArchive)
    } else {
        Box::new(BareExecutable)
    }
}

/// The asset is already the executable.
#[derive(Debug, Clone, Copy)]
pub struct BareExecutable;

impl AssetInstaller for BareExecutable {
    fn install(&self, asset: &Path, target: &Path) -> ProvisionResult<()> {
        fs::rename(asset, target).map_err(|e| {
            ProvisionError::ExtractionFailed(format!(
                "cannot move {} to {}: {}",
                asset.display(),
                target.display(),
                e
            ))
        })
    }
}

/// The asset is a `.tgz` holding an entry named like `target`.
#[derive(Debug, Clone, Copy)]
pub struct TarGzArchive;

impl AssetInstaller for TarGzArchive {
    fn install(&self, asset: &Path, target: &Path) -> ProvisionResult<()> {
        let wanted = target
            .file_name()
            .ok_or_else(|| ProvisionError::ExtractionFailed(format!("{} has no file name", target.display())))?
            .to_owned();

        let file = File::open(asset).map_err(|e| ProvisionError::ExtractionFailed(e.to_string()))?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        let entries = archive
            .entries()
            .map_err(|e| ProvisionError::ExtractionFailed(e.to_string()))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| ProvisionError::ExtractionFailed(e.to_string()))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let matches = entry
                .path()
                .map_err(|e| ProvisionError::ExtractionFailed(e.to_string()))?
                .file_name()
                .is_some_and(|name| name == wanted.as_os_str());

            if matches {
                entry
                    .unpack(target)
                    .map_err(|e| ProvisionError::ExtractionFailed(e.to_string()))?;
                if let Err(e) = fs::remove_file(asset) {
                    tracing::warn!(path = %asset.display(), error = %e, "Failed to remove archive");
                }
                return Ok(());
            }
        }

        Err(ProvisionError::ExtractionFailed(format!(
            "{} contains no '{}' entry",
            asset.display(),
            wanted.to_string_lossy()
        )))
    }
}

/// rwxr-xr-x on POSIX; a no-op elsewhere.
pub fn mark_executable(path: &Path) -> ProvisionResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(|e| ProvisionError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
