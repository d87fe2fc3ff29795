//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check addresses parse (bind, metrics, load balancers)
//! - Validate value ranges (timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::observability::logging::LOG_FORMATS;
use crate::trust::store::{parse_ipv4_literal, TRUST_ALL};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("real_ip.load_balancer_ips: invalid IP address '{0}'")]
    LoadBalancerIp(String),

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("observability.log_format '{0}' is not one of pretty, json")]
    LogFormat(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    for entry in &config.real_ip.load_balancer_ips {
        let entry = entry.trim();
        if entry != TRUST_ALL && parse_ipv4_literal(entry).is_none() {
            errors.push(ValidationError::LoadBalancerIp(entry.to_string()));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if !LOG_FORMATS.contains(&config.observability.log_format.as_str()) {
        errors.push(ValidationError::LogFormat(config.observability.log_format.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
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
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn wildcard_is_valid() {
        let mut config = ServerConfig::default();
        config.real_ip.enabled = true;
        config.real_ip.load_balancer_ips = vec!["*".into(), "10.0.0.1".into()];
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "localhost".into();
        config.real_ip.load_balancer_ips = vec!["10.0.0.1".into(), "10.0.0".into(), "lb".into()];
        config.timeouts.request_secs = 0;
        config.observability.log_format = "xml".into();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "9090".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("localhost".into()),
                ValidationError::LoadBalancerIp("10.0.0".into()),
                ValidationError::LoadBalancerIp("lb".into()),
                ValidationError::ZeroRequestTimeout,
                ValidationError::LogFormat("xml".into()),
                ValidationError::MetricsAddress("9090".into()),
            ]
        );
    }

    #[test]
    fn metrics_address_ignored_when_disabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nope".into();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
