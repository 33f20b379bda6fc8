//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend in the active table
//! - Feed results through the hysteresis tracker
//! - Apply transitions with `mark_healthy` / `mark_unhealthy`

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::state::{HealthTracker, ProbeOutcome, Transition};
use crate::load_balancer::{BackendId, LoadBalancer};

pub struct HealthMonitor {
    engine: Arc<LoadBalancer>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
    tracker: HealthTracker,
}

impl HealthMonitor {
    pub fn new(engine: Arc<LoadBalancer>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let tracker = HealthTracker::new(config.healthy_threshold, config.unhealthy_threshold);

        Self {
            engine,
            config,
            client,
            tracker,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_all(&mut self) {
        let snapshot = self.engine.snapshot();
        let ids: Vec<BackendId> = snapshot
            .backends
            .iter()
            .map(|b| BackendId::new(b.host.clone(), b.port))
            .collect();
        self.tracker.retain(&ids);

        for (id, status) in ids.iter().zip(&snapshot.backends) {
            let outcome = self.probe(id).await;

            match self.tracker.observe(id, status.healthy, outcome) {
                Some(Transition::BecameHealthy) => self.engine.mark_healthy(&id.host, id.port),
                Some(Transition::BecameUnhealthy) => {
                    self.engine.mark_unhealthy(&id.host, id.port)
                }
                None => {}
            }
        }
    }

    async fn probe(&self, id: &BackendId) -> ProbeOutcome {
        let uri = format!("http://{}{}", id, self.config.path);

        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "lb-proxy-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(backend = %id, error = %e, "Failed to build health check request");
                return ProbeOutcome::Failure;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => ProbeOutcome::Success,
            Ok(Ok(response)) => {
                tracing::warn!(backend = %id, status = %response.status(), "Health check failed: non-success status");
                ProbeOutcome::Failure
            }
            Ok(Err(e)) => {
                tracing::warn!(backend = %id, error = %e, "Health check failed: connection error");
                ProbeOutcome::Failure
            }
            Err(_) => {
                tracing::warn!(backend = %id, "Health check failed: timeout");
                ProbeOutcome::Failure
            }
        }
    }
}
