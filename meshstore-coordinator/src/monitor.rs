//! Heartbeat monitor: a timestamp-driven state machine, ticked
//! periodically, that classifies nodes HEALTHY/FAILED and publishes
//! transitions on the internal event bus.

use crate::events::NodeEvent;
use meshstore_core::ids::NodeId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeHealth {
    Healthy,
    Failed,
}

struct Tracked {
    last_seen_at: chrono::DateTime<chrono::Utc>,
    health: NodeHealth,
}

/// Pure state, separated from the tick loop so it can be driven by a
/// fake clock in tests — state is a pure function of the sequence of
/// heartbeat timestamps and the clock, never of wall-clock time read
/// internally.
pub struct MonitorState {
    tracked: Mutex<HashMap<NodeId, Tracked>>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            tracked: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_register(&self, node_id: NodeId, now: chrono::DateTime<chrono::Utc>) {
        self.tracked.lock().insert(
            node_id,
            Tracked {
                last_seen_at: now,
                health: NodeHealth::Healthy,
            },
        );
    }

    /// Heartbeat wins over a FAILED->HEALTHY tick that runs concurrently.
    /// Returns `true` if this heartbeat caused a FAILED->HEALTHY recovery.
    pub fn on_heartbeat(&self, node_id: &NodeId, timestamp: chrono::DateTime<chrono::Utc>) -> bool {
        let mut tracked = self.tracked.lock();
        let entry = tracked.entry(node_id.clone()).or_insert(Tracked {
            last_seen_at: timestamp,
            health: NodeHealth::Healthy,
        });
        let was_failed = entry.health == NodeHealth::Failed;
        if timestamp > entry.last_seen_at {
            entry.last_seen_at = timestamp;
        }
        entry.health = NodeHealth::Healthy;
        was_failed
    }

    /// Evaluate every tracked node against `failure_timeout`, return the
    /// node ids that transitioned HEALTHY -> FAILED this tick.
    pub fn tick(
        &self,
        now: chrono::DateTime<chrono::Utc>,
        failure_timeout: chrono::Duration,
    ) -> Vec<NodeId> {
        let mut tracked = self.tracked.lock();
        let mut newly_failed = Vec::new();
        for (node_id, state) in tracked.iter_mut() {
            if state.health == NodeHealth::Healthy && now - state.last_seen_at > failure_timeout {
                state.health = NodeHealth::Failed;
                newly_failed.push(node_id.clone());
            }
        }
        newly_failed
    }

    pub fn health_of(&self, node_id: &NodeId) -> Option<NodeHealth> {
        self.tracked.lock().get(node_id).map(|t| t.health)
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HeartbeatMonitor {
    pub state: std::sync::Arc<MonitorState>,
    pub tick_interval: Duration,
    pub failure_timeout: Duration,
    pub events: broadcast::Sender<NodeEvent>,
}

impl HeartbeatMonitor {
    pub fn spawn(self: std::sync::Arc<Self>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let timeout = chrono::Duration::from_std(self.failure_timeout)
                .unwrap_or(chrono::Duration::seconds(30));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = chrono::Utc::now();
                        for node_id in self.state.tick(now, timeout) {
                            warn!(node_id = %node_id, "node failed: no heartbeat within timeout");
                            let _ = self.events.send(NodeEvent::Failed(node_id));
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("heartbeat monitor shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Called by the service layer on every inbound heartbeat; publishes
    /// `NodeEvent::Recovered` if this heartbeat crossed FAILED -> HEALTHY.
    pub fn record_heartbeat(&self, node_id: &NodeId, timestamp: chrono::DateTime<chrono::Utc>) {
        if self.state.on_heartbeat(node_id, timestamp) {
            info!(node_id = %node_id, "node recovered");
            let _ = self.events.send(NodeEvent::Recovered(node_id.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_fails_after_timeout_and_recovers_on_newer_heartbeat() {
        let state = MonitorState::new();
        let t0 = chrono::Utc::now();
        let node = NodeId::new("n1");
        state.on_register(node.clone(), t0);

        let timeout = chrono::Duration::seconds(30);
        assert!(state.tick(t0 + chrono::Duration::seconds(10), timeout).is_empty());

        let failed = state.tick(t0 + chrono::Duration::seconds(31), timeout);
        assert_eq!(failed, vec![node.clone()]);
        assert_eq!(state.health_of(&node), Some(NodeHealth::Failed));

        let recovered = state.on_heartbeat(&node, t0 + chrono::Duration::seconds(40));
        assert!(recovered);
        assert_eq!(state.health_of(&node), Some(NodeHealth::Healthy));
    }

    #[test]
    fn replaying_the_same_timestamps_yields_the_same_decisions() {
        // Monitor state is a pure function of the timestamp sequence.
        let t0 = chrono::Utc::now();
        let node = NodeId::new("n1");
        let timeout = chrono::Duration::seconds(30);

        let run = || {
            let state = MonitorState::new();
            state.on_register(node.clone(), t0);
            let mut failures = Vec::new();
            failures.extend(state.tick(t0 + chrono::Duration::seconds(5), timeout));
            failures.extend(state.tick(t0 + chrono::Duration::seconds(35), timeout));
            state.on_heartbeat(&node, t0 + chrono::Duration::seconds(36));
            failures.extend(state.tick(t0 + chrono::Duration::seconds(70), timeout));
            failures
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn heartbeat_wins_the_failed_to_healthy_tie_break() {
        let state = MonitorState::new();
        let t0 = chrono::Utc::now();
        let node = NodeId::new("n1");
        state.on_register(node.clone(), t0);
        let timeout = chrono::Duration::seconds(30);

        state.tick(t0 + chrono::Duration::seconds(31), timeout);
        assert_eq!(state.health_of(&node), Some(NodeHealth::Failed));

        // A heartbeat "arriving during the same tick" still wins.
        state.on_heartbeat(&node, t0 + chrono::Duration::seconds(32));
        assert_eq!(state.health_of(&node), Some(NodeHealth::Healthy));
    }
}
