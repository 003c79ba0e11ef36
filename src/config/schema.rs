//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the share server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ShareConfig {
    /// Local HTTP dispatcher settings.
    pub server: ServerConfig,

    /// Tunnel supervisor settings.
    pub tunnel: TunnelConfig,

    /// Tunnel binary provisioning settings.
    pub provisioner: ProvisionerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Local dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Loopback port to listen on. 0 picks a free port.
    pub port: u16,

    /// Total time a handler may take before the request is abandoned.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 27123,
            request_timeout_secs: 30,
        }
    }
}

/// Tunnel supervisor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// How long to wait for the public hostname before giving up.
    pub acquisition_timeout_secs: u64,

    /// Characters of combined subprocess output kept for error reports.
    pub diagnostic_buffer_chars: usize,

    /// Domain the tunnel service assigns quick-tunnel hostnames under.
    pub hostname_suffix: String,

    /// Host name the tunnel forwards to (`http://<local_host>:<port>`).
    pub local_host: String,

    /// Skip system-wide installations and only use the managed copy.
    pub prefer_managed_only: bool,
}

impl TunnelConfig {
    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition_timeout_secs)
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            acquisition_timeout_secs: 30,
            diagnostic_buffer_chars: 500,
            hostname_suffix: "trycloudflare.com".to_string(),
            local_host: "localhost".to_string(),
            prefer_managed_only: false,
        }
    }
}

/// Binary provisioning configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Directory holding managed data. The managed binary lives in `<data_dir>/bin`.
    pub data_dir: PathBuf,

    /// Release download base; the asset file name is appended.
    pub release_base_url: String,

    /// Upper bound for a single `--version` probe.
    pub verify_timeout_secs: u64,

    /// Redirect hops followed before a download is abandoned.
    pub max_redirects: usize,
}

impl ProvisionerConfig {
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            release_base_url: "https://github.com/cloudflare/cloudflared/releases/latest/download"
                .to_string(),
            verify_timeout_secs: 5,
            max_redirects: 10,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("local-share")
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Prometheus exporter bind address. Disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ShareConfig = toml::from_str(
            r#"
            [tunnel]
            acquisition_timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.tunnel.acquisition_timeout(), Duration::from_secs(10));
        assert_eq!(config.tunnel.diagnostic_buffer_chars, 500);
        assert_eq!(config.tunnel.hostname_suffix, "trycloudflare.com");
        assert_eq!(config.server.port, 27123);
        assert!(config.provisioner.data_dir.ends_with("local-share"));
    }
}
