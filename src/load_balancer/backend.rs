//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server by its immutable identity
//! - Track active connections (for Least Connections LB)
//! - Track health state (healthy/unhealthy)
//!
//! Identity and runtime state are split: [`BackendId`] is a plain value that
//! can be copied around freely, while [`Backend`] owns the atomics and lives
//! inside a [`BackendTable`](crate::load_balancer::table::BackendTable).

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::table::BackendTable;
use crate::load_balancer::Algorithm;

/// Identity of a backend server, unique within a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId {
    pub host: String,
    pub port: u16,
}

impl BackendId {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A single backend server and its mutable runtime state.
#[derive(Debug)]
pub struct Backend {
    id: BackendId,
    /// Proportional selection share, always >= 1.
    weight: u32,
    /// Toggled by external health signals.
    healthy: AtomicBool,
    /// Number of requests currently dispatched to this backend.
    active_connections: AtomicUsize,
}

impl Backend {
    /// Create a healthy backend with no active connections.
    pub(crate) fn new(id: BackendId, weight: u32) -> Self {
        Self {
            id,
            weight,
            healthy: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> &BackendId {
        &self.id
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Set the health flag, returning the previous value.
    pub(crate) fn set_healthy(&self, healthy: bool) -> bool {
        self.healthy.swap(healthy, Ordering::AcqRel)
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Increment active connection count.
    pub(crate) fn inc_connections(&self) -> usize {
        self.active_connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement active connection count, stopping at zero.
    ///
    /// An unmatched decrement is absorbed rather than wrapping the counter;
    /// it still indicates a bracketing bug in the caller.
    pub(crate) fn dec_connections(&self) -> usize {
        match self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        {
            Ok(prev) => prev - 1,
            Err(_) => {
                tracing::debug!(backend = %self.id, "Connection release without matching start");
                0
            }
        }
    }
}

/// A RAII guard that holds one active connection on a backend.
///
/// The guard keeps the table it was issued from alive, so a release after a
/// reconfiguration decrements the counter it incremented. It also records the
/// algorithm of the pool that issued it.
#[derive(Debug)]
pub struct ConnectionGuard {
    table: Arc<BackendTable>,
    index: usize,
    algorithm: Algorithm,
}

impl ConnectionGuard {
    /// Increment the backend's counter and wrap it in a guard.
    pub(crate) fn start(table: Arc<BackendTable>, index: usize, algorithm: Algorithm) -> Self {
        table.backends()[index].inc_connections();
        Self {
            table,
            index,
            algorithm,
        }
    }

    /// Algorithm that picked this backend.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

impl Deref for ConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.table.backends()[self.index]
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.table.backends()[self.index].dec_connections();
    }
}
