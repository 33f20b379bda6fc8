//! Load balancer error types.

use thiserror::Error;

use crate::load_balancer::backend::BackendId;

/// Errors raised by the backend table and the selection engine.
///
/// "No healthy backend" is not an error: `select` reports it as `Ok(None)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadBalancerError {
    /// A backend was admitted with a weight below 1.
    #[error("invalid weight {weight} for backend {backend}: weight must be at least 1")]
    InvalidWeight { backend: BackendId, weight: u32 },

    /// The backend specifications cannot form a usable table.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The same `(host, port)` was added twice.
    #[error("duplicate backend {0}")]
    DuplicateBackend(BackendId),

    /// No backend with this identity exists in the table.
    #[error("backend {0} not found")]
    NotFound(BackendId),

    /// `select` was called before the first successful `configure`.
    #[error("load balancer has not been configured")]
    NotConfigured,
}

/// Result type for load balancer operations.
pub type Result<T> = std::result::Result<T, LoadBalancerError>;
