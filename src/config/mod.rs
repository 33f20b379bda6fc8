//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated)
//!     → LoadBalancer::configure
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads and validates
//!     → valid configs are sent to the reload loop
//!     → LoadBalancer::configure swaps the backend table
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - A missing or invalid file at startup falls back to the defaults
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    BackendConfig, HealthCheckConfig, LoadBalancerConfig, LoggingConfig, MetricsConfig,
    ProxyConfig, ServerConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
