//! Configuration validation.
//!
//! Semantic checks that serde cannot express. Returns every violation, not just
//! the first, and runs before a config is accepted (at startup and on reload).

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ResilienceConfig;

/// A single semantic violation.
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a parsed configuration.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let backoff = &config.backoff;
    if backoff.base_delay_ms == 0 {
        errors.push(ValidationError::new("backoff.base_delay_ms", "must be > 0"));
    }
    if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
        errors.push(ValidationError::new(
            "backoff.multiplier",
            format!("must be a finite number >= 1.0, got {}", backoff.multiplier),
        ));
    }
    if backoff.max_delay_ms < backoff.base_delay_ms {
        errors.push(ValidationError::new(
            "backoff.max_delay_ms",
            format!("must be >= base_delay_ms ({})", backoff.base_delay_ms),
        ));
    }

    if config.reconnect.handshake_timeout_ms == 0 {
        errors.push(ValidationError::new("reconnect.handshake_timeout_ms", "must be > 0"));
    }

    let polling = &config.polling;
    if polling.channel_interval_ms == 0 {
        errors.push(ValidationError::new("polling.channel_interval_ms", "must be > 0"));
    }
    if polling.chatter_interval_ms == 0 {
        errors.push(ValidationError::new("polling.chatter_interval_ms", "must be > 0"));
    }
    if polling.fetch_timeout_ms == 0 {
        errors.push(ValidationError::new("polling.fetch_timeout_ms", "must be > 0"));
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", observability.log_level),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    let simulation = &config.simulation;
    for (field, rate) in [
        ("simulation.connect_failure_rate", simulation.connect_failure_rate),
        ("simulation.fetch_failure_rate", simulation.fetch_failure_rate),
        ("simulation.connectivity_loss_ratio", simulation.connectivity_loss_ratio),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            errors.push(ValidationError::new(field, format!("must be within [0, 1], got {}", rate)));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
