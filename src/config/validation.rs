//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, buffer cap > 0)
//! - Check the hostname suffix and release URL are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ShareConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::ShareConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ShareConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.tunnel.acquisition_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "tunnel.acquisition_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.tunnel.diagnostic_buffer_chars == 0 {
        errors.push(ValidationError::new(
            "tunnel.diagnostic_buffer_chars",
            "must be greater than 0",
        ));
    }

    let suffix = &config.tunnel.hostname_suffix;
    if suffix.is_empty() || suffix.contains('/') || suffix.starts_with('.') {
        errors.push(ValidationError::new(
            "tunnel.hostname_suffix",
            format!("'{}' is not a bare domain", suffix),
        ));
    }

    if config.tunnel.local_host.is_empty() {
        errors.push(ValidationError::new("tunnel.local_host", "must not be empty"));
    }

    match url::Url::parse(&config.provisioner.release_base_url) {
        Ok(u) if u.scheme() == "https" || u.scheme() == "http" => {}
        Ok(u) => errors.push(ValidationError::new(
            "provisioner.release_base_url",
            format!("unsupported scheme '{}'", u.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "provisioner.release_base_url",
            e.to_string(),
        )),
    }

    if config.provisioner.verify_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "provisioner.verify_timeout_secs",
            "must be greater than 0",
        ));
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("'{}' is not a socket address", addr),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
