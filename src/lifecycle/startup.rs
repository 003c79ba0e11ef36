//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the provisioner, dispatcher and supervisor from config
//! - Register the built-in status route
//! - Bind the listener, then publish it through the tunnel
//! - Wait for a shutdown signal and tear down in order
//!
//! # Design Decisions
//! - Fail fast on local errors (bad config, port taken)
//! - Tunnel errors are logged with their diagnostics and the server keeps running

use axum::http::StatusCode;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::config::ShareConfig;
use crate::http::{send_json, Dispatcher, ServerError};
use crate::lifecycle::signals::shutdown_signal;
use crate::provision::{ProvisionError, Provisioner};
use crate::routing::{Method, PatternError};
use crate::tunnel::{StartOptions, TunnelSupervisor};

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("invalid route: {0}")]
    Route(#[from] PatternError),

    #[error("invalid tunnel hostname suffix: {0}")]
    HostnamePattern(#[from] regex::Error),
}

/// Options for `run`.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Publish the dispatcher through a quick tunnel.
    pub tunnel: bool,
}

#[derive(Serialize)]
struct StatusBody {
    version: &'static str,
    tunnel_active: bool,
    public_url: Option<String>,
}

/// Build a provisioner that logs download progress every 10%.
pub fn build_provisioner(config: &ShareConfig) -> Result<Provisioner, ProvisionError> {
    Ok(Provisioner::new(config.provisioner.clone())?.with_progress(|percent| {
        if percent % 10 == 0 {
            tracing::info!(percent, "Downloading tunnel binary");
        }
    }))
}

/// Run until a shutdown signal arrives.
pub async fn run(config: ShareConfig, options: RunOptions) -> Result<(), StartupError> {
    let provisioner = Arc::new(build_provisioner(&config)?);
    let supervisor_slot: Arc<OnceLock<Arc<TunnelSupervisor>>> = Arc::new(OnceLock::new());

    let mut dispatcher = Dispatcher::new(config.server.clone());
    let slot = supervisor_slot.clone();
    dispatcher.register_route(Method::Get, "/status", move |_req, _params| {
        let supervisor = slot.get().cloned();
        async move {
            let body = StatusBody {
                version: env!("CARGO_PKG_VERSION"),
                tunnel_active: supervisor.as_ref().is_some_and(|s| s.is_active()),
                public_url: supervisor.as_ref().and_then(|s| s.public_url()),
            };
            send_json(&body, StatusCode::OK)
        }
    })?;

    let addr = dispatcher.start(config.server.port).await?;
    tracing::info!(address = %addr, "Local server ready");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    if options.tunnel {
        let supervisor = Arc::new(TunnelSupervisor::new(
            config.tunnel.clone(),
            provisioner,
            addr.port(),
        )?);
        let _ = supervisor_slot.set(supervisor.clone());

        let start = StartOptions {
            prefer_managed_only: config.tunnel.prefer_managed_only,
        };
        tokio::select! {
            result = supervisor.start(start) => match result {
                Ok(url) => tracing::info!(url = %url, "Public URL ready"),
                Err(e) => tracing::error!(error = %e, "Tunnel unavailable; serving locally only"),
            },
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested during tunnel start");
                supervisor.stop();
                dispatcher.stop().await;
                return Ok(());
            }
        }
    }

    shutdown.await;

    if let Some(supervisor) = supervisor_slot.get() {
        supervisor.stop();
    }
    dispatcher.stop().await;
    Ok(())
}
