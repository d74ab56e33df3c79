//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//! - Validate the collector endpoint
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::telemetry::provider::parse_collector_url;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
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

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let telemetry = &config.telemetry;
    if telemetry.service_name.trim().is_empty() {
        errors.push(ValidationError::new("telemetry.service_name", "must not be empty"));
    }
    if let Err(e) = parse_collector_url(&telemetry.collector_url) {
        errors.push(ValidationError::new("telemetry.collector_url", e.to_string()));
    }

    let positive: [(&'static str, u64); 7] = [
        ("telemetry.export_concurrency_limit", telemetry.export_concurrency_limit as u64),
        ("telemetry.sample_interval_ms", telemetry.sample_interval_ms),
        ("telemetry.batch_max_size", telemetry.batch_max_size as u64),
        ("telemetry.batch_max_hold_ms", telemetry.batch_max_hold_ms),
        ("telemetry.max_queue_size", telemetry.max_queue_size as u64),
        ("telemetry.export_timeout_ms", telemetry.export_timeout_ms),
        ("telemetry.export_retry.max_attempts", telemetry.export_retry.max_attempts as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if telemetry.max_queue_size < telemetry.batch_max_size {
        errors.push(ValidationError::new(
            "telemetry.max_queue_size",
            "must not be less than batch_max_size",
        ));
    }

    let retry = &telemetry.export_retry;
    if retry.max_delay_ms < retry.base_delay_ms {
        errors.push(ValidationError::new(
            "telemetry.export_retry.max_delay_ms",
            "must not be less than base_delay_ms",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut config = AppConfig::default();
        config.telemetry.collector_url = "ftp://collector/traces".to_string();
        config.telemetry.batch_max_size = 0;
        config.telemetry.export_concurrency_limit = 0;
        config.listener.bind_address = "nowhere".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(errors.len(), 4);
        assert!(fields.contains(&"telemetry.collector_url"));
        assert!(fields.contains(&"telemetry.batch_max_size"));
        assert!(fields.contains(&"telemetry.export_concurrency_limit"));
        assert!(fields.contains(&"listener.bind_address"));
    }

    #[test]
    fn test_queue_must_hold_a_full_batch() {
        let mut config = AppConfig::default();
        config.telemetry.batch_max_size = 100;
        config.telemetry.max_queue_size = 50;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "telemetry.max_queue_size");

        config.telemetry.max_queue_size = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = AppConfig::default();
        config.observability.metrics_address = "bad".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
