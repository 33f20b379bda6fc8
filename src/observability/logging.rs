//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (console and file sinks)
//! - Map configured level names onto tracing levels
//! - Emit status reports of the load balancer
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level when set
//! - The file sink appends and never emits ANSI colour codes

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::load_balancer::Snapshot;
use crate::observability::ObservabilityError;

/// Translate a configured level name into an `EnvFilter` directive.
///
/// Unknown names map to `info`.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ObservabilityError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&config.level)));

    let console = config.console.then(fmt::layer);

    let file = if config.file.is_empty() {
        None
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.file)
            .map_err(|source| ObservabilityError::LogFile {
                path: config.file.clone(),
                source,
            })?;
        Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    Ok(())
}

/// Log the current status of the load balancer.
///
/// One summary event, then one event per backend in table order.
pub fn report_status(snapshot: &Snapshot) {
    if !snapshot.configured {
        tracing::info!(algorithm = %snapshot.algorithm, "Load balancer not configured");
        return;
    }

    tracing::info!(
        algorithm = %snapshot.algorithm,
        total = snapshot.total,
        healthy = snapshot.healthy,
        total_weight = snapshot.total_weight,
        "Load balancer status"
    );
    for backend in &snapshot.backends {
        tracing::info!(
            backend = %format_args!("{}:{}", backend.host, backend.port),
            weight = backend.weight,
            connections = backend.active_connections,
            healthy = backend.healthy,
            "  {backend}"
        );
    }

    crate::observability::metrics::record_snapshot(snapshot);
}
