//! Platform → release asset mapping and well-known install locations.
//!
//! # Asset Table
//! ```text
//! macos   aarch64 → cloudflared-darwin-arm64.tgz    (archive)
//! macos   x86_64  → cloudflared-darwin-amd64.tgz    (archive)
//! windows x86_64  → cloudflared-windows-amd64.exe
//! windows x86     → cloudflared-windows-386.exe
//! linux   aarch64 → cloudflared-linux-arm64
//! linux   x86_64  → cloudflared-linux-amd64
//! linux   x86     → cloudflared-linux-386
//! ```
//!
//! Anything else is `UnsupportedPlatform`.

use std::fmt;
use std::path::PathBuf;

use crate::provision::error::ProvisionError;

/// Name of the tunnel executable without extension.
pub const BINARY_NAME: &str = "cloudflared";

const ASSETS: &[(&str, &str, &str, bool)] = &[
    ("macos", "aarch64", "cloudflared-darwin-arm64.tgz", true),
    ("macos", "x86_64", "cloudflared-darwin-amd64.tgz", true),
    ("windows", "x86_64", "cloudflared-windows-amd64.exe", false),
    ("windows", "x86", "cloudflared-windows-386.exe", false),
    ("linux", "aarch64", "cloudflared-linux-arm64", false),
    ("linux", "x86_64", "cloudflared-linux-amd64", false),
    ("linux", "x86", "cloudflared-linux-386", false),
];

/// Operating system and CPU architecture, spelled like `std::env::consts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this process runs on.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// File name of the tunnel executable on this platform.
    pub fn executable_name(&self) -> String {
        if self.os == "windows" {
            format!("{}.exe", BINARY_NAME)
        } else {
            BINARY_NAME.to_string()
        }
    }

    /// Well-known install locations checked after the search path.
    pub fn well_known_paths(&self) -> Vec<PathBuf> {
        let paths: &[&str] = match self.os.as_str() {
            "macos" => &[
                "/opt/homebrew/bin/cloudflared",
                "/usr/local/bin/cloudflared",
            ],
            "windows" => &[
                r"C:\Program Files (x86)\cloudflared\cloudflared.exe",
                r"C:\Program Files\cloudflared\cloudflared.exe",
            ],
            "linux" => &["/usr/local/bin/cloudflared", "/usr/bin/cloudflared"],
            _ => &[],
        };
        paths.iter().map(PathBuf::from).collect()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Where to fetch the binary for one platform and how to unpack it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDescriptor {
    pub asset_name: &'static str,
    pub asset_url: String,
    pub needs_extraction: bool,
}

impl DownloadDescriptor {
    pub fn for_platform(platform: &Platform, base_url: &str) -> Result<Self, ProvisionError> {
        let &(_, _, asset_name, needs_extraction) = ASSETS
            .iter()
            .find(|(os, arch, _, _)| *os == platform.os && *arch == platform.arch)
            .ok_or_else(|| ProvisionError::UnsupportedPlatform {
                os: platform.os.clone(),
                arch: platform.arch.clone(),
            })?;

        Ok(Self {
            asset_name,
            asset_url: format!("{}/{}", base_url.trim_end_matches('/'), asset_name),
            needs_extraction,
        })
    }
}
