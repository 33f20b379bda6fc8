//! Load balancing engine.
//!
//! # Responsibilities
//! - Own the active backend table and the active algorithm
//! - Rebuild the table from configuration and swap it in atomically
//! - Dispatch `select` to the active strategy
//! - Apply health signals and connection tracking by backend identity
//! - Produce read-only snapshots for status reporting
//!
//! # Design Decisions
//! - The table, algorithm and scratch state travel together in one `Pool`
//!   behind an `ArcSwapOption`; readers never see a half-built table
//! - Writers (`configure`, `set_algorithm`) are serialised by a mutex so a
//!   switch cannot resurrect a table replaced by a concurrent `configure`
//! - `select` is lock-free except for the weighted strategy's short
//!   critical section

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwapOption;

use crate::load_balancer::backend::{Backend, BackendId, ConnectionGuard};
use crate::load_balancer::error::{LoadBalancerError, Result};
use crate::load_balancer::table::{BackendTable, SelectionState};
use crate::load_balancer::Algorithm;
use crate::observability::metrics;

/// A backend entry as delivered by the configuration collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub host: String,
    pub port: u16,
    pub weight: u32,
    pub enabled: bool,
}

impl BackendSpec {
    /// An enabled backend entry.
    pub fn new(host: impl Into<String>, port: u16, weight: u32) -> Self {
        Self {
            host: host.into(),
            port,
            weight,
            enabled: true,
        }
    }

    /// Mark the entry as disabled (not admitted by `configure`).
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Active table plus the scratch state of the active algorithm.
#[derive(Debug)]
struct Pool {
    table: Arc<BackendTable>,
    algorithm: Algorithm,
    state: SelectionState,
}

impl Pool {
    fn new(table: Arc<BackendTable>, algorithm: Algorithm) -> Self {
        let state = SelectionState::new(table.len());
        Self {
            table,
            algorithm,
            state,
        }
    }

    fn select(&self, client_id: &str) -> Option<usize> {
        let selected = self
            .algorithm
            .strategy()
            .next_server(&self.table, &self.state, client_id);
        metrics::record_selection(self.algorithm, selected.is_some());

        if selected.is_none() {
            tracing::warn!(
                algorithm = %self.algorithm,
                backend_count = self.table.len(),
                "No healthy backend available"
            );
        }
        selected
    }
}

/// Multi-algorithm backend selection engine.
///
/// Safe to share across request-handling tasks behind an `Arc`.
#[derive(Debug)]
pub struct LoadBalancer {
    active: ArcSwapOption<Pool>,
    /// Algorithm for the next pool; held while a writer replaces the pool.
    algorithm: Mutex<Algorithm>,
}

impl LoadBalancer {
    /// Create an unconfigured engine.
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            active: ArcSwapOption::empty(),
            algorithm: Mutex::new(algorithm),
        }
    }

    fn writer(&self) -> MutexGuard<'_, Algorithm> {
        self.algorithm.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the backend table wholesale.
    ///
    /// Only enabled entries are admitted. Health flags, connection counters,
    /// the cursor and the weighted accumulators all start from scratch. On
    /// error the previous table stays active.
    pub fn configure(&self, algorithm: Algorithm, specs: &[BackendSpec]) -> Result<()> {
        let table = Arc::new(build_table(specs)?);

        let mut current = self.writer();
        *current = algorithm;
        self.active.store(Some(Arc::new(Pool::new(table.clone(), algorithm))));
        drop(current);

        for backend in table.backends() {
            metrics::record_backend_health(backend.id(), true);
        }
        tracing::info!(
            algorithm = %algorithm,
            backends = table.len(),
            total_weight = table.total_weight(),
            skipped = specs.len() - table.len(),
            "Load balancer configured"
        );
        Ok(())
    }

    /// Switch the active algorithm, resetting the cursor and accumulators.
    ///
    /// Health flags and connection counters are kept. Before the first
    /// `configure` this only records the algorithm to use.
    pub fn set_algorithm(&self, algorithm: Algorithm) {
        let mut current = self.writer();
        let previous = std::mem::replace(&mut *current, algorithm);

        if let Some(pool) = self.active.load_full() {
            self.active
                .store(Some(Arc::new(Pool::new(pool.table.clone(), algorithm))));
        }
        drop(current);

        tracing::info!(from = %previous, to = %algorithm, "Load balancing algorithm switched");
    }

    pub fn algorithm(&self) -> Algorithm {
        *self.writer()
    }

    pub fn is_configured(&self) -> bool {
        self.active.load().is_some()
    }

    /// Pick a backend for a client.
    ///
    /// `Ok(None)` means no backend is healthy; callers should answer with a
    /// service-unavailable response rather than treat it as a fault.
    pub fn select(&self, client_id: &str) -> Result<Option<BackendId>> {
        let guard = self.active.load();
        let pool = guard.as_deref().ok_or(LoadBalancerError::NotConfigured)?;

        Ok(pool
            .select(client_id)
            .map(|index| pool.table.backends()[index].id().clone()))
    }

    /// Pick a backend and start tracking a connection on it.
    ///
    /// Selection and the counter increment use the same table, so a
    /// concurrent `configure` cannot split them.
    pub fn select_tracked(&self, client_id: &str) -> Result<Option<ConnectionGuard>> {
        let guard = self.active.load();
        let pool = guard.as_deref().ok_or(LoadBalancerError::NotConfigured)?;

        Ok(pool
            .select(client_id)
            .map(|index| ConnectionGuard::start(pool.table.clone(), index, pool.algorithm)))
    }

    /// Start tracking a connection on a specific backend.
    pub fn acquire(&self, id: &BackendId) -> Option<ConnectionGuard> {
        let guard = self.active.load();
        let pool = guard.as_deref()?;
        match pool.table.position(id) {
            Some(index) => Some(ConnectionGuard::start(
                pool.table.clone(),
                index,
                pool.algorithm,
            )),
            None => {
                tracing::warn!(backend = %id, "Connection start for unknown backend ignored");
                None
            }
        }
    }

    pub fn mark_healthy(&self, host: &str, port: u16) {
        self.set_health(host, port, true);
    }

    pub fn mark_unhealthy(&self, host: &str, port: u16) {
        self.set_health(host, port, false);
    }

    fn set_health(&self, host: &str, port: u16, healthy: bool) {
        let guard = self.active.load();
        let Some(pool) = guard.as_deref() else {
            tracing::warn!(host, port, healthy, "Health update before configuration ignored");
            return;
        };

        match pool.table.find(host, port) {
            Ok(backend) => {
                let was_healthy = backend.set_healthy(healthy);
                metrics::record_backend_health(backend.id(), healthy);
                if was_healthy != healthy {
                    let state = if healthy { "healthy" } else { "unhealthy" };
                    tracing::info!(
                        backend = %backend.id(),
                        healthy_backends = pool.table.healthy_count(),
                        "Backend marked as {state}"
                    );
                } else {
                    tracing::debug!(backend = %backend.id(), healthy, "Backend health unchanged");
                }
            }
            Err(e) => tracing::warn!(error = %e, healthy, "Health update ignored"),
        }
    }

    /// Count a request dispatched to a backend.
    pub fn track_start(&self, host: &str, port: u16) {
        self.with_backend(host, port, "start", |backend| {
            backend.inc_connections();
        });
    }

    /// Count a request completed on a backend.
    ///
    /// The counter stops at zero. Extra calls are absorbed so one caller's
    /// bracketing mistake cannot skew least-connections for everyone, but
    /// they remain a caller bug.
    pub fn track_end(&self, host: &str, port: u16) {
        self.with_backend(host, port, "end", |backend| {
            backend.dec_connections();
        });
    }

    fn with_backend(
        &self,
        host: &str,
        port: u16,
        action: &str,
        f: impl FnOnce(&Backend),
    ) {
        let guard = self.active.load();
        let Some(pool) = guard.as_deref() else {
            tracing::warn!(host, port, action, "Connection tracking before configuration ignored");
            return;
        };
        match pool.table.find(host, port) {
            Ok(backend) => f(backend),
            Err(e) => tracing::warn!(error = %e, action, "Connection tracking ignored"),
        }
    }

    /// Read-only view of the engine for status reporting.
    pub fn snapshot(&self) -> Snapshot {
        let guard = self.active.load();
        let Some(pool) = guard.as_deref() else {
            return Snapshot {
                algorithm: self.algorithm(),
                configured: false,
                total: 0,
                healthy: 0,
                total_weight: 0,
                cursor: 0,
                backends: Vec::new(),
            };
        };

        let current_weights = pool.state.current_weights().clone();
        let backends: Vec<BackendStatus> = pool
            .table
            .backends()
            .iter()
            .zip(current_weights)
            .map(|(b, current_weight)| BackendStatus {
                host: b.id().host.clone(),
                port: b.id().port,
                weight: b.weight(),
                active_connections: b.active_connections(),
                healthy: b.is_healthy(),
                current_weight,
            })
            .collect();

        Snapshot {
            algorithm: pool.algorithm,
            configured: true,
            total: backends.len(),
            healthy: backends.iter().filter(|b| b.healthy).count(),
            total_weight: pool.table.total_weight(),
            cursor: pool.state.cursor(),
            backends,
        }
    }
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new(Algorithm::default())
    }
}

fn build_table(specs: &[BackendSpec]) -> Result<BackendTable> {
    let mut table = BackendTable::new();
    for spec in specs.iter().filter(|s| s.enabled) {
        if spec.port == 0 {
            return Err(LoadBalancerError::InvalidConfiguration(format!(
                "backend {}:{} has port 0",
                spec.host, spec.port
            )));
        }
        table
            .add(spec.host.clone(), spec.port, spec.weight)
            .map_err(|e| LoadBalancerError::InvalidConfiguration(e.to_string()))?;
    }

    if table.is_empty() {
        return Err(LoadBalancerError::InvalidConfiguration(
            "no enabled backends".to_string(),
        ));
    }
    Ok(table)
}

/// Point-in-time status of one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub host: String,
    pub port: u16,
    pub weight: u32,
    pub active_connections: usize,
    pub healthy: bool,
    /// Weighted round-robin accumulator.
    pub current_weight: i64,
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} (weight: {}, connections: {}, {})",
            self.host,
            self.port,
            self.weight,
            self.active_connections,
            if self.healthy { "healthy" } else { "unhealthy" }
        )
    }
}

/// Point-in-time status of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub algorithm: Algorithm,
    pub configured: bool,
    pub total: usize,
    pub healthy: usize,
    pub total_weight: u64,
    pub cursor: usize,
    pub backends: Vec<BackendStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<BackendSpec> {
        vec![
            BackendSpec::new("127.0.0.1", 3000, 2),
            BackendSpec::new("127.0.0.1", 8000, 1),
            BackendSpec::new("127.0.0.1", 8080, 1),
        ]
    }

    #[test]
    fn test_select_before_configure() {
        let lb = LoadBalancer::default();
        assert!(!lb.is_configured());
        assert_eq!(lb.select("10.0.0.1"), Err(LoadBalancerError::NotConfigured));
        assert!(matches!(
            lb.select_tracked("10.0.0.1"),
            Err(LoadBalancerError::NotConfigured)
        ));
    }

    #[test]
    fn test_configure_skips_disabled() {
        let lb = LoadBalancer::default();
        let mut entries = specs();
        entries.push(BackendSpec::new("127.0.0.1", 9000, 0).disabled());
        lb.configure(Algorithm::RoundRobin, &entries).unwrap();

        let snapshot = lb.snapshot();
        assert!(snapshot.configured);
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.total_weight, 4);
    }

    #[test]
    fn test_configure_rejects_invalid() {
        let lb = LoadBalancer::default();

        let err = lb.configure(Algorithm::RoundRobin, &[]).unwrap_err();
        assert!(matches!(err, LoadBalancerError::InvalidConfiguration(_)));

        let only_disabled = [BackendSpec::new("127.0.0.1", 3000, 1).disabled()];
        assert!(lb.configure(Algorithm::RoundRobin, &only_disabled).is_err());

        let zero_weight = [BackendSpec::new("127.0.0.1", 3000, 0)];
        assert!(lb.configure(Algorithm::RoundRobin, &zero_weight).is_err());

        let zero_port = [BackendSpec::new("127.0.0.1", 0, 1)];
        assert!(lb.configure(Algorithm::RoundRobin, &zero_port).is_err());

        let duplicate = [
            BackendSpec::new("127.0.0.1", 3000, 1),
            BackendSpec::new("127.0.0.1", 3000, 1),
        ];
        assert!(lb.configure(Algorithm::RoundRobin, &duplicate).is_err());

        assert!(!lb.is_configured());
    }

    #[test]
    fn test_failed_configure_keeps_previous_table() {
        let lb = LoadBalancer::default();
        lb.configure(Algorithm::RoundRobin, &specs()).unwrap();
        assert!(lb.configure(Algorithm::IpHash, &[]).is_err());

        let snapshot = lb.snapshot();
        assert_eq!(snapshot.algorithm, Algorithm::RoundRobin);
        assert_eq!(snapshot.total, 3);
    }

    #[test]
    fn test_health_toggle_and_unknown_identity() {
        let lb = LoadBalancer::default();
        lb.configure(Algorithm::RoundRobin, &specs()).unwrap();

        lb.mark_unhealthy("127.0.0.1", 8000);
        assert_eq!(lb.snapshot().healthy, 2);

        // Unknown identities are a logged no-op.
        lb.mark_unhealthy("10.9.9.9", 1);
        lb.track_start("10.9.9.9", 1);
        lb.track_end("10.9.9.9", 1);
        assert_eq!(lb.snapshot().healthy, 2);

        lb.mark_healthy("127.0.0.1", 8000);
        assert_eq!(lb.snapshot().healthy, 3);
    }

    #[test]
    fn test_set_algorithm_resets_scratch_state() {
        let lb = LoadBalancer::default();
        lb.configure(Algorithm::WeightedRoundRobin, &specs()).unwrap();
        lb.select("a").unwrap();
        lb.select("b").unwrap();
        lb.track_start("127.0.0.1", 3000);
        lb.mark_unhealthy("127.0.0.1", 8080);

        let before = lb.snapshot();
        assert!(before.backends.iter().any(|b| b.current_weight != 0));

        lb.set_algorithm(Algorithm::RoundRobin);
        lb.set_algorithm(Algorithm::WeightedRoundRobin);

        let after = lb.snapshot();
        assert_eq!(after.algorithm, Algorithm::WeightedRoundRobin);
        assert_eq!(after.cursor, 0);
        assert!(after.backends.iter().all(|b| b.current_weight == 0));
        // Runtime state survives an algorithm switch.
        assert_eq!(after.backends[0].active_connections, 1);
        assert!(!after.backends[2].healthy);
    }

    #[test]
    fn test_set_algorithm_before_configure() {
        let lb = LoadBalancer::default();
        lb.set_algorithm(Algorithm::LeastConnections);
        assert_eq!(lb.algorithm(), Algorithm::LeastConnections);
        assert!(!lb.snapshot().configured);
        assert_eq!(lb.select("x"), Err(LoadBalancerError::NotConfigured));
    }

    #[test]
    fn test_select_tracked_brackets_connection() {
        let lb = LoadBalancer::default();
        lb.configure(Algorithm::LeastConnections, &specs()).unwrap();

        let g1 = lb.select_tracked("c").unwrap().unwrap();
        assert_eq!(g1.id(), &BackendId::new("127.0.0.1", 3000));
        let g2 = lb.select_tracked("c").unwrap().unwrap();
        assert_eq!(g2.id(), &BackendId::new("127.0.0.1", 8000));
        assert_eq!(lb.snapshot().backends[0].active_connections, 1);

        assert_eq!(g1.algorithm(), Algorithm::LeastConnections);

        drop(g1);
        drop(g2);
        assert!(lb.snapshot().backends.iter().all(|b| b.active_connections == 0));
    }

    #[test]
    fn test_guard_outlives_reconfigure() {
        let lb = LoadBalancer::default();
        lb.configure(Algorithm::RoundRobin, &specs()).unwrap();
        let guard = lb.acquire(&BackendId::new("127.0.0.1", 3000)).unwrap();

        lb.configure(Algorithm::RoundRobin, &specs()).unwrap();
        assert_eq!(lb.snapshot().backends[0].active_connections, 0);

        // Releasing the old guard must not touch the new table.
        drop(guard);
        assert_eq!(lb.snapshot().backends[0].active_connections, 0);
        assert!(lb.acquire(&BackendId::new("10.0.0.1", 1)).is_none());
    }

    #[test]
    fn test_backend_status_display() {
        let status = BackendStatus {
            host: "127.0.0.1".into(),
            port: 3000,
            weight: 2,
            active_connections: 5,
            healthy: false,
            current_weight: 0,
        };
        assert_eq!(
            status.to_string(),
            "127.0.0.1:3000 (weight: 2, connections: 5, unhealthy)"
        );
    }
}
