//! Tunnel binary resolution.
//!
//! # Resolution Order
//! ```text
//! 1. managed copy     <data_dir>/bin/cloudflared
//! 2. search path      PATH lookup              (skipped when managed-only)
//! 3. well-known dirs  per-OS install locations (skipped when managed-only)
//! 4. provision        descriptor → download → install → chmod → verify
//! ```
//!
//! Every candidate must pass the `--version` probe before it is returned.
//!
//! # Design Decisions
//! - Provisioning holds a process-wide lock keyed by destination path and
//!   re-checks the managed copy once the lock is held
//! - Downloads land in a temporary sibling and are installed by rename or
//!   extraction, so a torn download is never mistaken for a managed copy
//! - A freshly installed binary that fails the probe is deleted

use dashmap::DashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;

use crate::config::ProvisionerConfig;
use crate::observability::metrics;
use crate::provision::download::{Downloader, ProgressFn};
use crate::provision::error::{ProvisionError, ProvisionResult};
use crate::provision::install::{installer_for, mark_executable};
use crate::provision::platform::{DownloadDescriptor, Platform};
use crate::provision::verify::verify_binary;

static PROVISION_LOCKS: OnceLock<DashMap<PathBuf, Arc<Mutex<()>>>> = OnceLock::new();

fn provision_lock(path: &Path) -> Arc<Mutex<()>> {
    PROVISION_LOCKS
        .get_or_init(DashMap::new)
        .entry(path.to_path_buf())
        .or_default()
        .clone()
}

/// Where a resolved binary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOrigin {
    Cached,
    SystemPath,
    WellKnownPath,
    FreshlyDownloaded,
}

/// A verified, runnable tunnel executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLocation {
    pub path: PathBuf,
    pub origin: BinaryOrigin,
}

/// Locates or installs the tunnel executable.
pub struct Provisioner {
    config: ProvisionerConfig,
    platform: Platform,
    downloader: Downloader,
    search_path: Option<OsString>,
    well_known: Vec<PathBuf>,
    progress: Option<ProgressFn>,
}

impl Provisioner {
    pub fn new(config: ProvisionerConfig) -> ProvisionResult<Self> {
        Self::for_platform(config, Platform::current())
    }

    pub fn for_platform(config: ProvisionerConfig, platform: Platform) -> ProvisionResult<Self> {
        let downloader = Downloader::new(config.max_redirects)?;
        let well_known = platform.well_known_paths();
        Ok(Self {
            config,
            platform,
            downloader,
            search_path: None,
            well_known,
            progress: None,
        })
    }

    /// Search these directories instead of the process `PATH`.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// Replace the per-OS list of well-known install locations.
    pub fn with_well_known_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.well_known = paths;
        self
    }

    /// Receive whole-percent download progress.
    pub fn with_progress(mut self, progress: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Durable location of the managed copy.
    pub fn managed_binary_path(&self) -> PathBuf {
        self.config
            .data_dir
            .join("bin")
            .join(self.platform.executable_name())
    }

    /// Produce a verified executable path, downloading one if nothing usable exists.
    pub async fn resolve(&self, prefer_managed_only: bool) -> ProvisionResult<BinaryLocation> {
        let managed = self.managed_binary_path();

        if let Some(location) = self.check(&managed, BinaryOrigin::Cached).await {
            return Ok(location);
        }

        if !prefer_managed_only {
            if let Some(found) = self.lookup_search_path() {
                if let Some(location) = self.check(&found, BinaryOrigin::SystemPath).await {
                    return Ok(location);
                }
            }

            for candidate in &self.well_known {
                if let Some(location) = self.check(candidate, BinaryOrigin::WellKnownPath).await {
                    return Ok(location);
                }
            }
        }

        self.provision(&managed).await
    }

    async fn check(&self, path: &Path, origin: BinaryOrigin) -> Option<BinaryLocation> {
        if !path.is_file() {
            return None;
        }
        match verify_binary(path, self.config.verify_timeout()).await {
            Ok(version) => {
                tracing::info!(path = %path.display(), origin = ?origin, version = %version, "Tunnel binary resolved");
                Some(BinaryLocation {
                    path: path.to_path_buf(),
                    origin,
                })
            }
            Err(e) => {
                tracing::warn!(origin = ?origin, error = %e, "Skipping unusable tunnel binary");
                None
            }
        }
    }

    fn lookup_search_path(&self) -> Option<PathBuf> {
        let name = self.platform.executable_name();
        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().ok()?;
                which::which_in(&name, Some(paths), cwd)
            }
            None => which::which(&name),
        };
        found.ok()
    }

    async fn provision(&self, managed: &Path) -> ProvisionResult<BinaryLocation> {
        let descriptor = DownloadDescriptor::for_platform(&self.platform, &self.config.release_base_url)?;

        let lock = provision_lock(managed);
        let _guard = lock.lock().await;

        // Another caller may have finished provisioning while we waited.
        if let Some(location) = self.check(managed, BinaryOrigin::Cached).await {
            return Ok(location);
        }

        let bin_dir = managed
            .parent()
            .ok_or_else(|| ProvisionError::io(managed, std::io::ErrorKind::InvalidInput.into()))?;
        tokio::fs::create_dir_all(bin_dir)
            .await
            .map_err(|e| ProvisionError::io(bin_dir, e))?;

        let staging = bin_dir.join(format!(".{}.partial", descriptor.asset_name));
        tracing::info!(
            url = %descriptor.asset_url,
            platform = %self.platform,
            "Downloading tunnel binary"
        );

        let result = self.download_and_install(&descriptor, &staging, managed).await;
        if staging.exists() {
            let _ = tokio::fs::remove_file(&staging).await;
        }
        if let Err(e) = result {
            metrics::record_download("failed");
            return Err(e);
        }

        if let Err(e) = verify_binary(managed, self.config.verify_timeout()).await {
            metrics::record_download("unverified");
            let _ = tokio::fs::remove_file(managed).await;
            return Err(e);
        }

        metrics::record_download("installed");
        tracing::info!(path = %managed.display(), "Tunnel binary installed");
        Ok(BinaryLocation {
            path: managed.to_path_buf(),
            origin: BinaryOrigin::FreshlyDownloaded,
        })
    }

    async fn download_and_install(
        &self,
        descriptor: &DownloadDescriptor,
        staging: &Path,
        managed: &Path,
    ) -> ProvisionResult<()> {
        let bytes = self
            .downloader
            .download(&descriptor.asset_url, staging, self.progress.as_ref())
            .await?;
        tracing::debug!(bytes, path = %staging.display(), "Download complete");

        let installer = installer_for(descriptor);
        let (asset, target) = (staging.to_path_buf(), managed.to_path_buf());
        tokio::task::spawn_blocking(move || installer.install(&asset, &target))
            .await
            .map_err(|e| ProvisionError::ExtractionFailed(e.to_string()))??;

        mark_executable(managed)
    }
}
