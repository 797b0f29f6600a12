//! Bandwidth accountant.
//!
//! The reported `network_utilisation` is *always* `sum(active.values())`,
//! recomputed on each mutation — never a mutable counter that is
//! incremented and decremented independently, which would drift from
//! reality the moment a release is missed or double-counted.

use parking_lot::Mutex;
use std::collections::HashMap;

/// 20% of the link is always held back so a single transfer cannot
/// saturate the link and starve heartbeats.
const HEADROOM_FACTOR: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReservationId(pub u64);

pub struct BandwidthAccountant {
    link_capacity_bps: u64,
    active: Mutex<HashMap<ReservationId, u64>>,
    next_id: Mutex<u64>,
}

impl BandwidthAccountant {
    pub fn new(link_capacity_bps: u64) -> Self {
        Self {
            link_capacity_bps,
            active: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }

    /// Reserve bandwidth for a new transfer. Grants
    /// `min(requested, free_capacity * 0.8)`. Returns the reservation id
    /// (to `release` later) and the granted rate in bits/second.
    pub fn reserve(&self, requested_bps: u64) -> (ReservationId, u64) {
        let mut active = self.active.lock();
        let in_use: u64 = active.values().sum();
        let free = self.link_capacity_bps.saturating_sub(in_use);
        let headroom_free = (free as f64 * HEADROOM_FACTOR) as u64;
        let granted = requested_bps.min(headroom_free);

        let mut next_id = self.next_id.lock();
        let id = ReservationId(*next_id);
        *next_id += 1;
        drop(next_id);

        active.insert(id, granted);
        (id, granted)
    }

    /// Idempotent: releasing an unknown or already-released id is a
    /// no-op, not an error.
    pub fn release(&self, id: ReservationId) {
        self.active.lock().remove(&id);
    }

    /// The *sum* of all currently outstanding reservations — never an
    /// independently maintained counter. At rest (no active transfers)
    /// this is always exactly zero.
    pub fn network_utilisation(&self) -> u64 {
        self.active.lock().values().sum()
    }

    pub fn active_transfer_count(&self) -> usize {
        self.active.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilisation_is_zero_at_rest() {
        let acct = BandwidthAccountant::new(1_000_000);
        assert_eq!(acct.network_utilisation(), 0);

        let (id, granted) = acct.reserve(500_000);
        assert!(granted > 0);
        assert_eq!(acct.network_utilisation(), granted);

        acct.release(id);
        assert_eq!(acct.network_utilisation(), 0);
    }

    #[test]
    fn headroom_caps_a_single_reservation() {
        let acct = BandwidthAccountant::new(1_000_000);
        let (_id, granted) = acct.reserve(10_000_000); // way over capacity
        assert_eq!(granted, (1_000_000f64 * HEADROOM_FACTOR) as u64);
    }

    #[test]
    fn release_is_idempotent() {
        let acct = BandwidthAccountant::new(1_000_000);
        let (id, _) = acct.reserve(100);
        acct.release(id);
        acct.release(id); // second release is a no-op
        assert_eq!(acct.network_utilisation(), 0);
    }

    #[test]
    fn concurrent_reservations_sum_correctly() {
        let acct = BandwidthAccountant::new(1_000_000);
        let (id1, g1) = acct.reserve(300_000);
        let (id2, g2) = acct.reserve(300_000);
        assert_eq!(acct.network_utilisation(), g1 + g2);
        acct.release(id1);
        assert_eq!(acct.network_utilisation(), g2);
        acct.release(id2);
        assert_eq!(acct.network_utilisation(), 0);
    }

    proptest::proptest! {
        #[test]
        fn utilisation_is_always_sum_of_outstanding(
            requests in proptest::collection::vec(1u64..2_000_000, 0..20)
        ) {
            let acct = BandwidthAccountant::new(1_000_000);
            let mut ids = Vec::new();
            let mut expected = 0u64;
            for r in requests {
                let (id, granted) = acct.reserve(r);
                ids.push(id);
                expected += granted;
                proptest::prop_assert_eq!(acct.network_utilisation(), expected);
            }
            for id in ids {
                let before = acct.network_utilisation();
                let granted = acct.active.lock().get(&id).copied().unwrap_or(0);
                acct.release(id);
                proptest::prop_assert_eq!(acct.network_utilisation(), before - granted);
            }
            proptest::prop_assert_eq!(acct.network_utilisation(), 0);
        }
    }
}
