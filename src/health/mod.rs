//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each backend in the current snapshot
//!     → Update state.rs
//!     → LoadBalancer::mark_healthy / mark_unhealthy on transition
//!
//! State machine (state.rs):
//!     Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - State transitions require consecutive successes/failures
//! - Health is also settable directly through the engine API

pub mod active;
pub mod state;

pub use active::HealthMonitor;
pub use state::{HealthTracker, ProbeOutcome, Transition};
