//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, weights >= 1)
//! - Detect duplicate backend identities
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("max_connections must be positive")]
    ZeroMaxConnections,

    #[error("no backend servers configured")]
    NoBackends,

    #[error("every backend server is disabled")]
    NoEnabledBackends,

    #[error("backend #{0}: host cannot be empty")]
    EmptyHost(usize),

    #[error("backend #{index}: invalid port {port}")]
    InvalidPort { index: usize, port: u16 },

    #[error("backend #{index}: weight must be positive, got {weight}")]
    InvalidWeight { index: usize, weight: u32 },

    #[error("backend #{index}: duplicate backend {host}:{port}")]
    DuplicateBackend { index: usize, host: String, port: u16 },

    #[error("health check {0} must be positive")]
    InvalidHealthCheck(&'static str),

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.server.bind_address.clone(),
        ));
    }
    if config.server.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    let backends = &config.load_balancer.backends;
    if backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    } else if backends.iter().all(|b| !b.enabled) {
        errors.push(ValidationError::NoEnabledBackends);
    }

    let mut seen = HashSet::new();
    for (i, backend) in backends.iter().enumerate() {
        let index = i + 1;
        if backend.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost(index));
        }
        if backend.port == 0 {
            errors.push(ValidationError::InvalidPort {
                index,
                port: backend.port,
            });
        }
        if backend.weight == 0 {
            errors.push(ValidationError::InvalidWeight {
                index,
                weight: backend.weight,
            });
        }
        if !seen.insert((backend.host.as_str(), backend.port)) {
            errors.push(ValidationError::DuplicateBackend {
                index,
                host: backend.host.clone(),
                port: backend.port,
            });
        }
    }

    let health = &config.health_check;
    if health.enabled {
        if health.interval_secs == 0 {
            errors.push(ValidationError::InvalidHealthCheck("interval"));
        }
        if health.timeout_secs == 0 {
            errors.push(ValidationError::InvalidHealthCheck("timeout"));
        }
        if health.healthy_threshold == 0 {
            errors.push(ValidationError::InvalidHealthCheck("healthy_threshold"));
        }
        if health.unhealthy_threshold == 0 {
            errors.push(ValidationError::InvalidHealthCheck("unhealthy_threshold"));
        }
    }

    if config.metrics.enabled && config.metrics.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.metrics.bind_address.clone(),
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
    use crate::config::schema::BackendConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.server.bind_address = "not-an-address".into();
        config.load_balancer.backends = vec![
            BackendConfig {
                host: "".into(),
                port: 0,
                weight: 0,
                enabled: true,
            },
            BackendConfig::new("10.0.0.1", 80),
            BackendConfig::new("10.0.0.1", 80),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidBindAddress("not-an-address".into()),
                ValidationError::EmptyHost(1),
                ValidationError::InvalidPort { index: 1, port: 0 },
                ValidationError::InvalidWeight { index: 1, weight: 0 },
                ValidationError::DuplicateBackend {
                    index: 3,
                    host: "10.0.0.1".into(),
                    port: 80
                },
            ]
        );
    }

    #[test]
    fn test_empty_backends() {
        let mut config = ProxyConfig::default();
        config.load_balancer.backends.clear();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::NoBackends])
        );
    }

    #[test]
    fn test_all_disabled_backends() {
        let mut config = ProxyConfig::default();
        for backend in &mut config.load_balancer.backends {
            backend.enabled = false;
        }
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::NoEnabledBackends])
        );

        config.load_balancer.backends[1].enabled = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_health_check_only_validated_when_enabled() {
        let mut config = ProxyConfig::default();
        config.health_check.interval_secs = 0;
        assert!(validate_config(&config).is_ok());

        config.health_check.enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidHealthCheck("interval")])
        );
    }
}
