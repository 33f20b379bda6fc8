//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! configure(algorithm, specs)
//!     → table.rs (build BackendTable, fresh SelectionState)
//!     → engine.rs (atomic swap of the active table)
//!
//! select(client_id)
//!     → engine.rs (load active table + algorithm)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through backends)
//!         - weighted.rs (smooth weighted round robin)
//!         - least_conn.rs (pick backend with fewest connections)
//!         - ip_hash.rs (hash client id into healthy set)
//!     → Return backend identity or None (unavailable)
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless; per-table scratch state is passed in
//! - Unhealthy backends excluded from selection
//! - Switching algorithm or reconfiguring always starts from fresh scratch state

use std::fmt;
use std::str::FromStr;

pub mod backend;
pub mod engine;
pub mod error;
pub mod ip_hash;
pub mod least_conn;
pub mod round_robin;
pub mod table;
pub mod weighted;

pub use backend::{Backend, BackendId, ConnectionGuard};
pub use engine::{BackendSpec, BackendStatus, LoadBalancer, Snapshot};
pub use error::{LoadBalancerError, Result};
pub use table::{BackendTable, SelectionState};

use ip_hash::IpHash;
use least_conn::LeastConnections;
use round_robin::RoundRobin;
use weighted::WeightedRoundRobin;

/// A backend selection algorithm.
///
/// Implementations return the table index of the chosen backend, or `None`
/// when no healthy backend exists.
pub trait Strategy: Send + Sync + fmt::Debug {
    fn next_server(
        &self,
        table: &BackendTable,
        state: &SelectionState,
        client_id: &str,
    ) -> Option<usize>;

    fn name(&self) -> &'static str;
}

static ROUND_ROBIN: RoundRobin = RoundRobin;
static WEIGHTED_ROUND_ROBIN: WeightedRoundRobin = WeightedRoundRobin;
static LEAST_CONNECTIONS: LeastConnections = LeastConnections;
static IP_HASH: IpHash = IpHash;

/// Algorithm tag, as named in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
    LeastConnections,
    IpHash,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::RoundRobin,
        Algorithm::WeightedRoundRobin,
        Algorithm::LeastConnections,
        Algorithm::IpHash,
    ];

    /// The strategy implementing this algorithm.
    pub fn strategy(self) -> &'static dyn Strategy {
        match self {
            Algorithm::RoundRobin => &ROUND_ROBIN,
            Algorithm::WeightedRoundRobin => &WEIGHTED_ROUND_ROBIN,
            Algorithm::LeastConnections => &LEAST_CONNECTIONS,
            Algorithm::IpHash => &IP_HASH,
        }
    }

    /// Canonical configuration token.
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "ROUND_ROBIN",
            Algorithm::WeightedRoundRobin => "WEIGHTED_ROUND_ROBIN",
            Algorithm::LeastConnections => "LEAST_CONNECTIONS",
            Algorithm::IpHash => "IP_HASH",
        }
    }

    /// Parse a configuration token, falling back to round robin.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(
                algorithm = %value,
                "Unknown load balancing algorithm, falling back to ROUND_ROBIN"
            );
            Algorithm::RoundRobin
        })
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised algorithm token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown load balancing algorithm '{0}'")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| UnknownAlgorithm(s.to_string()))
    }
}
