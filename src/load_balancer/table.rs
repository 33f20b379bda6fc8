//! Backend table and per-table selection scratch state.
//!
//! # Responsibilities
//! - Hold the ordered set of backends (order is the tie-break order)
//! - Index backends by identity for health and connection updates
//! - Keep `total_weight` equal to the sum of admitted weights
//! - Carry the round-robin cursor and weighted round-robin accumulators
//!
//! # Design Decisions
//! - A table is built single-threaded, then frozen behind an `Arc`; the only
//!   mutation afterwards goes through per-backend atomics
//! - Scratch state is separate from the table so an algorithm switch can
//!   reset it without touching health flags or connection counters

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::load_balancer::backend::{Backend, BackendId};
use crate::load_balancer::error::{LoadBalancerError, Result};

/// Ordered set of backends with an identity index.
#[derive(Debug, Default)]
pub struct BackendTable {
    backends: Vec<Backend>,
    index: HashMap<BackendId, usize>,
    total_weight: u64,
}

impl BackendTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a healthy backend with no connections.
    pub fn add(&mut self, host: impl Into<String>, port: u16, weight: u32) -> Result<()> {
        let id = BackendId::new(host, port);
        if weight < 1 {
            return Err(LoadBalancerError::InvalidWeight {
                backend: id,
                weight,
            });
        }
        if self.index.contains_key(&id) {
            return Err(LoadBalancerError::DuplicateBackend(id));
        }

        self.index.insert(id.clone(), self.backends.len());
        self.backends.push(Backend::new(id, weight));
        self.total_weight += u64::from(weight);
        Ok(())
    }

    /// Look up a backend by identity.
    pub fn find(&self, host: &str, port: u16) -> Result<&Backend> {
        let id = BackendId::new(host, port);
        match self.index.get(&id) {
            Some(&i) => Ok(&self.backends[i]),
            None => Err(LoadBalancerError::NotFound(id)),
        }
    }

    /// Table position of a backend.
    pub fn position(&self, id: &BackendId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Healthy backends with their table index, in table order.
    ///
    /// The iterator is lazy and `Clone`, so it can be restarted; each pass
    /// re-reads the health flags.
    pub fn healthy(&self) -> impl Iterator<Item = (usize, &Backend)> + Clone + '_ {
        self.backends
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_healthy())
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn healthy_count(&self) -> usize {
        self.healthy().count()
    }

    /// Sum of weights over every backend in the table.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }
}

/// Mutable selection state tied to one table and one active algorithm.
///
/// A fresh instance starts with the cursor and every accumulator at zero.
#[derive(Debug)]
pub struct SelectionState {
    cursor: AtomicUsize,
    current_weights: Mutex<Vec<i64>>,
}

impl SelectionState {
    pub fn new(len: usize) -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            current_weights: Mutex::new(vec![0; len]),
        }
    }

    /// Return the cursor value and advance it by one.
    pub fn next_cursor(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed)
    }

    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Exclusive access to the weighted round-robin accumulators.
    ///
    /// The accumulators are plain integers, so a poisoned lock is still
    /// consistent enough to keep serving.
    pub fn current_weights(&self) -> MutexGuard<'_, Vec<i64>> {
        self.current_weights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
