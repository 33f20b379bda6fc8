//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration (falling back to defaults)
//! - Initialize subsystems in dependency order
//! - Start background tasks (status reports, health checks, config reload)
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Logging comes up first so every later step is recorded
//! - A missing or invalid config file is not fatal; a failed bind is
//! - Listener starts last (traffic only when ready)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time;

use crate::config::{load_or_default, ConfigWatcher, LoadBalancerConfig, ProxyConfig};
use crate::health::HealthMonitor;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::load_balancer::{LoadBalancer, LoadBalancerError};
use crate::observability::{self, report_status, ObservabilityError};

/// Fatal errors while bringing the proxy up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Observability(#[from] ObservabilityError),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("failed to configure load balancer: {0}")]
    LoadBalancer(#[from] LoadBalancerError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Apply the load balancer section of a configuration to the engine.
pub fn apply_config(
    engine: &LoadBalancer,
    config: &LoadBalancerConfig,
) -> Result<(), LoadBalancerError> {
    engine.configure(config.algorithm(), &config.backend_specs())?;
    report_status(&engine.snapshot());
    Ok(())
}

/// Load the configuration at `config_path` and run the proxy until a
/// termination signal arrives.
pub async fn run(config_path: &Path) -> Result<(), StartupError> {
    let (config, load_error) = load_or_default(config_path);

    observability::init_logging(&config.logging)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "lb-proxy starting"
    );
    let from_file = match load_error {
        Some(e) => {
            tracing::warn!(
                path = %config_path.display(),
                error = %e,
                "Could not load config file, using default configuration"
            );
            false
        }
        None => true,
    };

    if config.metrics.enabled {
        let addr: SocketAddr = config
            .metrics
            .bind_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.metrics.bind_address.clone()))?;
        observability::init_metrics(addr)?;
    }

    let algorithm = config.load_balancer.algorithm();
    let engine = Arc::new(LoadBalancer::new(algorithm));
    apply_config(&engine, &config.load_balancer)?;

    let shutdown = Shutdown::new();
    spawn_background_tasks(&config, &engine, &shutdown);

    // Keep the watcher handle alive for the lifetime of the server.
    let _watcher = if from_file {
        start_config_reload(config_path.to_path_buf(), engine.clone(), shutdown.subscribe())
    } else {
        None
    };

    let address = config.server.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    tracing::info!(
        address = %address,
        algorithm = %algorithm,
        max_connections = config.server.max_connections,
        "Listening for connections"
    );

    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(&config.server, engine.clone());
    let result = server
        .run(listener, shutdown.subscribe())
        .await
        .map_err(StartupError::Server);

    shutdown.trigger();
    report_status(&engine.snapshot());
    tracing::info!("Shutdown complete");
    result
}

fn spawn_background_tasks(config: &ProxyConfig, engine: &Arc<LoadBalancer>, shutdown: &Shutdown) {
    if config.load_balancer.status_interval_secs > 0 {
        tokio::spawn(report_periodically(
            engine.clone(),
            Duration::from_secs(config.load_balancer.status_interval_secs),
            shutdown.subscribe(),
        ));
    }

    let monitor = HealthMonitor::new(engine.clone(), config.health_check.clone());
    tokio::spawn(monitor.run(shutdown.subscribe()));
}

async fn report_periodically(
    engine: Arc<LoadBalancer>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = time::interval(period);
    // The first tick completes immediately; startup already reported.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => report_status(&engine.snapshot()),
            _ = shutdown.recv() => break,
        }
    }
}

fn start_config_reload(
    path: PathBuf,
    engine: Arc<LoadBalancer>,
    shutdown: broadcast::Receiver<()>,
) -> Option<notify::RecommendedWatcher> {
    let (watcher, updates) = ConfigWatcher::new(&path);
    match watcher.run() {
        Ok(handle) => {
            tokio::spawn(reload_loop(engine, updates, shutdown));
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Config hot reload disabled");
            None
        }
    }
}

async fn reload_loop(
    engine: Arc<LoadBalancer>,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                match apply_config(&engine, &config.load_balancer) {
                    Ok(()) => tracing::info!(
                        "Configuration reloaded; server and logging changes apply on restart"
                    ),
                    Err(e) => tracing::error!(
                        error = %e,
                        "Reloaded configuration rejected, keeping current backends"
                    ),
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::load_balancer::{Algorithm, BackendId};

    #[test]
    fn test_apply_config_configures_engine() {
        let engine = LoadBalancer::default();
        let config = LoadBalancerConfig {
            algorithm: "least_connections".into(),
            status_interval_secs: 0,
            backends: vec![BackendConfig::new("10.0.0.1", 80)],
        };

        apply_config(&engine, &config).unwrap();
        assert_eq!(engine.algorithm(), Algorithm::LeastConnections);
        assert_eq!(
            engine.select("c").unwrap(),
            Some(BackendId::new("10.0.0.1", 80))
        );
    }

    #[test]
    fn test_disabled_only_file_starts_with_defaults() {
        let path = std::env::temp_dir().join(format!(
            "lb-proxy-startup-disabled-{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "[[load_balancer.backends]]\nhost = \"10.0.0.1\"\nport = 9000\nenabled = false\n",
        )
        .unwrap();

        let (config, error) = load_or_default(&path);
        assert!(error.is_some());

        let engine = LoadBalancer::default();
        apply_config(&engine, &config.load_balancer).unwrap();
        assert_eq!(engine.snapshot().total, 3);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_apply_config_rejects_all_disabled() {
        let engine = LoadBalancer::default();
        let mut backend = BackendConfig::new("10.0.0.1", 80);
        backend.enabled = false;
        let config = LoadBalancerConfig {
            backends: vec![backend],
            ..Default::default()
        };

        assert!(matches!(
            apply_config(&engine, &config),
            Err(LoadBalancerError::InvalidConfiguration(_))
        ));
        assert!(!engine.is_configured());
    }

    #[tokio::test]
    async fn test_reload_loop_applies_updates() {
        let engine = Arc::new(LoadBalancer::default());
        apply_config(&engine, &LoadBalancerConfig::default()).unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(reload_loop(engine.clone(), rx, shutdown.subscribe()));

        let mut config = ProxyConfig::default();
        config.load_balancer.algorithm = "IP_HASH".into();
        config.load_balancer.backends = vec![BackendConfig::new("10.0.0.9", 9000)];
        tx.send(config).unwrap();
        drop(tx);

        task.await.unwrap();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.algorithm, Algorithm::IpHash);
        assert_eq!(snapshot.total, 1);
    }
}
