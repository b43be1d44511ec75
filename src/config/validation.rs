//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port, weights, probe timings, thresholds)
//! - Parse backend URLs up front so later stages never see a bad one
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LbConfig → Result<(), Vec<ValidationError>>
//! - Runs before any component is constructed

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::LbConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid port {0}: must be 1-65535")]
    InvalidPort(i64),

    #[error("needs to have at least one backend server")]
    NoBackends,

    #[error("backend #{0} has an empty url")]
    EmptyUrl(usize),

    #[error("backend #{index} has an invalid url '{url}': {reason}")]
    InvalidUrl {
        index: usize,
        url: String,
        reason: String,
    },

    #[error("backend #{index} has non-positive weight {weight}")]
    InvalidWeight { index: usize, weight: i64 },

    #[error("health check interval must be greater than zero")]
    ZeroProbeInterval,

    #[error("health check timeout ({timeout_secs}s) must be less than interval ({interval_secs}s)")]
    ProbeTimeoutTooLong { timeout_secs: u64, interval_secs: u64 },

    #[error("health check path must start with '/': '{0}'")]
    InvalidProbePath(String),

    #[error("circuit breaker failure threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("circuit breaker open duration must be greater than zero")]
    ZeroOpenDuration,

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

/// Check every semantic constraint and report all violations.
pub fn validate_config(config: &LbConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !(1..=65535).contains(&config.server.port) {
        errors.push(ValidationError::InvalidPort(config.server.port));
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    for (index, backend) in config.backends.iter().enumerate() {
        if backend.url.trim().is_empty() {
            errors.push(ValidationError::EmptyUrl(index));
        } else if let Err(reason) = check_backend_url(&backend.url) {
            errors.push(ValidationError::InvalidUrl {
                index,
                url: backend.url.clone(),
                reason,
            });
        }

        if backend.weight <= 0 {
            errors.push(ValidationError::InvalidWeight {
                index,
                weight: backend.weight,
            });
        }
    }

    let health = &config.health_check;
    if health.interval_secs == 0 {
        errors.push(ValidationError::ZeroProbeInterval);
    } else if health.timeout_secs >= health.interval_secs {
        errors.push(ValidationError::ProbeTimeoutTooLong {
            timeout_secs: health.timeout_secs,
            interval_secs: health.interval_secs,
        });
    }
    if !health.path.starts_with('/') {
        errors.push(ValidationError::InvalidProbePath(health.path.clone()));
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }
    if config.circuit_breaker.open_duration_secs == 0 {
        errors.push(ValidationError::ZeroOpenDuration);
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            obs.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Backends must be absolute plain-http URLs with a host (no upstream TLS).
fn check_backend_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}
