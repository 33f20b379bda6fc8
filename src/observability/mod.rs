//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, status reports)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout and an append-mode log file
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Metric calls are no-ops until a recorder is installed
//! - Request ID flows through the HTTP layer into every request span

use thiserror::Error;

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, report_status};
pub use metrics::init_metrics;

/// Errors raised while installing log sinks or the metrics exporter.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("failed to open log file '{path}': {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install log subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}
