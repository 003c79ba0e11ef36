//! local-share
//!
//! Serves host-application content on a loopback-only HTTP dispatcher and,
//! optionally, publishes it to the internet through a cloudflared quick tunnel.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser / remote client
//!            │
//!            ▼
//!     https://<label>.trycloudflare.com ──── cloudflared (tunnel supervisor)
//!                                                  │
//!                                                  ▼
//!     http://127.0.0.1:<port> ──▶ dispatcher ──▶ route table ──▶ handler
//!                                     │
//!                                     └── CORS + private-network headers on every response
//!
//!     provisioner: managed copy → PATH → well-known dirs → download + verify
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use local_share::config::{load_config, ShareConfig};
use local_share::lifecycle::startup::{self, RunOptions};
use local_share::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "local-share")]
#[command(about = "Share a local HTTP server through a quick tunnel", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the local server and publish it
    Serve {
        /// Override `server.port`
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve on loopback only; do not start a tunnel
        #[arg(long)]
        no_tunnel: bool,

        /// Only use (or download) the managed tunnel binary
        #[arg(long)]
        managed_only: bool,
    },
    /// Locate or download the tunnel binary and print its path
    Provision {
        /// Only use (or download) the managed tunnel binary
        #[arg(long)]
        managed_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ShareConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "local-share starting");

    if let Some(addr) = &config.observability.metrics_address {
        match addr.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(metrics_address = %addr, "Failed to parse metrics address"),
        }
    }

    match cli.command {
        Commands::Serve {
            port,
            no_tunnel,
            managed_only,
        } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            config.tunnel.prefer_managed_only |= managed_only;

            tracing::info!(
                port = config.server.port,
                tunnel = !no_tunnel,
                request_timeout_secs = config.server.request_timeout_secs,
                "Configuration loaded"
            );
            startup::run(config, RunOptions { tunnel: !no_tunnel }).await?;
        }
        Commands::Provision { managed_only } => {
            let provisioner = startup::build_provisioner(&config)?;
            let location = provisioner
                .resolve(managed_only || config.tunnel.prefer_managed_only)
                .await?;
            println!("{} ({:?})", location.path.display(), location.origin);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
