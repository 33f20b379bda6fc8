//! Round-robin load balancing strategy.

use crate::load_balancer::{BackendTable, SelectionState, Strategy};

/// Round-robin selector.
///
/// Takes `cursor mod N` as the starting index and probes forward at most
/// `N - 1` further positions for a healthy backend, so no index is tried
/// twice in one call.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin;

impl Strategy for RoundRobin {
    fn next_server(
        &self,
        table: &BackendTable,
        state: &SelectionState,
        _client_id: &str,
    ) -> Option<usize> {
        let backends = table.backends();
        if backends.is_empty() {
            return None;
        }

        let len = backends.len();
        let start = state.next_cursor() % len;

        (0..len)
            .map(|i| (start + i) % len)
            .find(|&index| backends[index].is_healthy())
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}
