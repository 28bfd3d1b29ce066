//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, ports valid)
//! - Check that every backend has a reachable-looking address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::BridgeConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: String },

    #[error("{field} must be greater than zero")]
    Zero { field: String },

    #[error("{field} is invalid: {reason}")]
    Invalid { field: String, reason: String },
}

fn require_host(errors: &mut Vec<ValidationError>, field: &str, host: &str) {
    if host.trim().is_empty() {
        errors.push(ValidationError::Empty { field: field.to_string() });
    }
}

fn require_port(errors: &mut Vec<ValidationError>, field: &str, port: u16) {
    if port == 0 {
        errors.push(ValidationError::Zero { field: field.to_string() });
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    require_host(&mut errors, "server.host", &config.server.host);
    if config.server.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "server.max_connections".into() });
    }

    let descriptors = config.storage.descriptors();
    if descriptors.is_empty() {
        errors.push(ValidationError::Empty { field: "storage".into() });
    }
    for (i, descriptor) in descriptors.iter().enumerate() {
        require_host(&mut errors, &format!("storage[{i}].host"), &descriptor.host);
        require_port(&mut errors, &format!("storage[{i}].port"), descriptor.port);
        if descriptor.name.trim().is_empty() {
            errors.push(ValidationError::Empty { field: format!("storage[{i}].name") });
        }
    }

    require_host(&mut errors, "mailer.host", &config.mailer.host);
    require_port(&mut errors, "mailer.port", config.mailer.port);
    if !config.mailer.from.contains('@') {
        errors.push(ValidationError::Invalid {
            field: "mailer.from".into(),
            reason: "expected an email address".into(),
        });
    }

    require_host(&mut errors, "redis.host", &config.redis.host);
    require_port(&mut errors, "redis.port", config.redis.port);

    if config.health.report_interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "health.report_interval_secs".into() });
    }
    if config.health.sweep_interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "health.sweep_interval_secs".into() });
    }
    if config.rate_limit.total == 0 {
        errors.push(ValidationError::Zero { field: "rate_limit.total".into() });
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::Zero { field: "rate_limit.window_secs".into() });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::Invalid {
            field: "observability.metrics_address".into(),
            reason: "expected host:port".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
