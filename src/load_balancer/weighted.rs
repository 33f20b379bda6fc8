//! Smooth weighted round-robin load balancing strategy.
//!
//! Each call adds every healthy backend's weight to its accumulator, picks
//! the largest accumulator (lowest index on ties) and subtracts the healthy
//! set's total weight from the winner. Over any `Σweight` consecutive calls
//! each backend is chosen `weight` times, spread out rather than in bursts.
//!
//! The healthy total is recomputed on every call; the table-wide total would
//! overcharge the winner while some backends are excluded.

use crate::load_balancer::{BackendTable, SelectionState, Strategy};

/// Smooth weighted round-robin selector.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedRoundRobin;

impl Strategy for WeightedRoundRobin {
    fn next_server(
        &self,
        table: &BackendTable,
        state: &SelectionState,
        _client_id: &str,
    ) -> Option<usize> {
        // The whole read-increment-compare-subtract sequence runs under one lock.
        let mut current = state.current_weights();

        let mut healthy_total: i64 = 0;
        let mut selected: Option<usize> = None;

        for (index, backend) in table.healthy() {
            let weight = i64::from(backend.weight());
            current[index] += weight;
            healthy_total += weight;

            if selected.map_or(true, |best| current[index] > current[best]) {
                selected = Some(index);
            }
        }

        let winner = selected?;
        current[winner] -= healthy_total;
        Some(winner)
    }

    fn name(&self) -> &'static str {
        "weighted-round-robin"
    }
}
