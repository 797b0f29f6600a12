//! Transmission-time model.
//!
//! `size_bits / granted_bandwidth + base_latency`. This node performs
//! real TCP transfers and additionally sleeps the *difference*, if any,
//! between the modelled transmission time and how long the real
//! transfer actually took, so that bandwidth-constrained nodes behave
//! consistently regardless of how fast the underlying loopback/network
//! happens to be.

use std::time::Duration;

pub const DEFAULT_BASE_LATENCY: Duration = Duration::from_millis(5);

pub fn modelled_transmission_time(size_bytes: u64, granted_bps: u64, base_latency: Duration) -> Duration {
    if granted_bps == 0 {
        return base_latency;
    }
    let size_bits = size_bytes.saturating_mul(8);
    let secs = size_bits as f64 / granted_bps as f64;
    base_latency + Duration::from_secs_f64(secs)
}

/// Sleep out the remainder of the modelled transmission time not already
/// spent on the real transfer.
pub async fn throttle(size_bytes: u64, granted_bps: u64, elapsed: Duration) {
    let modelled = modelled_transmission_time(size_bytes, granted_bps, DEFAULT_BASE_LATENCY);
    if let Some(remaining) = modelled.checked_sub(elapsed) {
        if remaining > Duration::ZERO {
            tokio::time::sleep(remaining).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bandwidth_is_just_base_latency() {
        let t = modelled_transmission_time(1_000_000, 0, DEFAULT_BASE_LATENCY);
        assert_eq!(t, DEFAULT_BASE_LATENCY);
    }

    #[test]
    fn larger_transfers_take_longer() {
        let small = modelled_transmission_time(1_000, 1_000_000, DEFAULT_BASE_LATENCY);
        let big = modelled_transmission_time(1_000_000, 1_000_000, DEFAULT_BASE_LATENCY);
        assert!(big > small);
    }
}
