//! Multi-algorithm HTTP load balancer.
//!
//! The core is [`load_balancer::LoadBalancer`], a thread-safe engine that
//! picks a backend per request using round robin, smooth weighted round
//! robin, least connections or client-IP hashing. The remaining modules
//! wrap it into a runnable proxy.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Algorithm, BackendId, BackendSpec, LoadBalancer, LoadBalancerError};
