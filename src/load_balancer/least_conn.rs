//! Least Connections load balancing strategy.

use crate::load_balancer::{BackendTable, SelectionState, Strategy};

/// Least connections selector.
/// Selects the healthy backend with the minimum number of active connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastConnections;

impl Strategy for LeastConnections {
    fn next_server(
        &self,
        table: &BackendTable,
        _state: &SelectionState,
        _client_id: &str,
    ) -> Option<usize> {
        let mut selected: Option<(usize, usize)> = None;

        // Strict comparison: on a tie the earliest backend in table order wins.
        for (index, backend) in table.healthy() {
            let connections = backend.active_connections();
            if selected.map_or(true, |(_, min)| connections < min) {
                selected = Some((index, connections));
            }
        }

        selected.map(|(index, _)| index)
    }

    fn name(&self) -> &'static str {
        "least-connections"
    }
}
