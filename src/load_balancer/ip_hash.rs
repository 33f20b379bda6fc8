//! Client-hash load balancing strategy.
//!
//! The client id is hashed and reduced modulo the size of the *current*
//! healthy set. A client therefore stays on the same backend only while the
//! healthy set is unchanged: when any other backend changes health the
//! modulus or the positions shift, and the client may move even though its
//! own backend never went down. Stable placement would need consistent hashing.

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::load_balancer::{BackendTable, SelectionState, Strategy};

/// Hash-based (sticky) selector keyed on the client id.
#[derive(Debug, Default, Clone, Copy)]
pub struct IpHash;

impl IpHash {
    /// Deterministic hash of a client id.
    ///
    /// `DefaultHasher::new()` uses fixed keys, so the value is stable for the
    /// lifetime of the process.
    pub fn hash_client(client_id: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        client_id.hash(&mut hasher);
        hasher.finish()
    }
}

impl Strategy for IpHash {
    fn next_server(
        &self,
        table: &BackendTable,
        _state: &SelectionState,
        client_id: &str,
    ) -> Option<usize> {
        // One pass over the health flags so the count and the lookup agree.
        let healthy: Vec<usize> = table.healthy().map(|(index, _)| index).collect();
        if healthy.is_empty() {
            return None;
        }

        let slot = Self::hash_client(client_id) % healthy.len() as u64;
        Some(healthy[slot as usize])
    }

    fn name(&self) -> &'static str {
        "ip-hash"
    }
}
