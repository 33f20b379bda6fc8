//! Backend health state machine.
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy → Healthy: consecutive successes >= healthy_threshold
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping
//! - Counters reset on state transition
//! - The tracker only decides; the caller applies the transition

use std::collections::HashMap;

use crate::load_balancer::BackendId;

/// Result of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    Failure,
}

/// A health change the caller must apply to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BecameHealthy,
    BecameUnhealthy,
}

#[derive(Debug, Default, Clone, Copy)]
struct Streak {
    successes: u32,
    failures: u32,
}

/// Consecutive success/failure counters per backend.
#[derive(Debug)]
pub struct HealthTracker {
    healthy_threshold: u32,
    unhealthy_threshold: u32,
    streaks: HashMap<BackendId, Streak>,
}

impl HealthTracker {
    pub fn new(healthy_threshold: u32, unhealthy_threshold: u32) -> Self {
        Self {
            healthy_threshold: healthy_threshold.max(1),
            unhealthy_threshold: unhealthy_threshold.max(1),
            streaks: HashMap::new(),
        }
    }

    /// Record a probe of a backend currently in state `healthy`.
    pub fn observe(
        &mut self,
        id: &BackendId,
        healthy: bool,
        outcome: ProbeOutcome,
    ) -> Option<Transition> {
        let streak = self.streaks.entry(id.clone()).or_default();

        match outcome {
            ProbeOutcome::Success => {
                streak.failures = 0;
                streak.successes = streak.successes.saturating_add(1);
                if !healthy && streak.successes >= self.healthy_threshold {
                    *streak = Streak::default();
                    return Some(Transition::BecameHealthy);
                }
            }
            ProbeOutcome::Failure => {
                streak.successes = 0;
                streak.failures = streak.failures.saturating_add(1);
                if healthy && streak.failures >= self.unhealthy_threshold {
                    *streak = Streak::default();
                    return Some(Transition::BecameUnhealthy);
                }
            }
        }
        None
    }

    /// Drop counters for backends no longer in the table.
    pub fn retain(&mut self, current: &[BackendId]) {
        self.streaks.retain(|id, _| current.contains(id));
    }
}
