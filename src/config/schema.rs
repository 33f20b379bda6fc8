//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::load_balancer::{Algorithm, BackendSpec};

/// Root configuration for the load-balancing proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration.
    pub server: ServerConfig,

    /// Logging sink settings.
    pub logging: LoggingConfig,

    /// Algorithm and backend pool.
    pub load_balancer: LoadBalancerConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Prometheus exporter settings.
    pub metrics: MetricsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8888").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,

    /// Per-request timeout in seconds.
    pub connection_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8888".to_string(),
            max_connections: 100,
            connection_timeout_secs: 30,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (DEBUG, INFO, WARNING, ERROR).
    pub level: String,

    /// Append-mode log file; empty disables file output.
    pub file: String,

    /// Also log to stdout.
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "reverse_proxy.log".to_string(),
            console: true,
        }
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Algorithm token; unknown values fall back to ROUND_ROBIN.
    pub algorithm: String,

    /// Interval between status reports in seconds, 0 disables.
    pub status_interval_secs: u64,

    /// Backend server definitions, in selection order.
    pub backends: Vec<BackendConfig>,
}

impl LoadBalancerConfig {
    pub fn algorithm(&self) -> Algorithm {
        Algorithm::parse_lenient(&self.algorithm)
    }

    pub fn backend_specs(&self) -> Vec<BackendSpec> {
        self.backends.iter().map(BackendSpec::from).collect()
    }
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::RoundRobin.to_string(),
            status_interval_secs: 0,
            backends: vec![
                BackendConfig::new("127.0.0.1", 3000),
                BackendConfig::new("127.0.0.1", 8000),
                BackendConfig::new("127.0.0.1", 8080),
            ],
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BackendConfig {
    pub host: String,

    pub port: u16,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Disabled backends are not admitted to the table.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl BackendConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            weight: default_weight(),
            enabled: default_enabled(),
        }
    }
}

impl From<&BackendConfig> for BackendSpec {
    fn from(config: &BackendConfig) -> Self {
        BackendSpec {
            host: config.host.clone(),
            port: config.port,
            weight: config.weight,
            enabled: config.enabled,
        }
    }
}

fn default_weight() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 30,
            timeout_secs: 5,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus scrape endpoint.
    pub enabled: bool,

    /// Metrics endpoint bind address.
    pub bind_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "0.0.0.0:9090".to_string(),
        }
    }
}
