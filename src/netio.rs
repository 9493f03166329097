//! Host-level network byte counters.
//!
//! The benchmark measures bytes transferred as the delta of the host's
//! cumulative per-interface counters over the job's execution window. This
//! includes any unrelated host traffic; the runner is expected to be the
//! only significant network user in its task container.

use sysinfo::Networks;

/// A point-in-time snapshot of the host's cumulative network counters,
/// summed over all interfaces.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NetworkSnapshot {
    /// Cumulative bytes received
    pub bytes_received: u64,
    /// Cumulative bytes sent
    pub bytes_sent: u64,
}

impl NetworkSnapshot {
    /// Return the `(received, sent)` deltas since an earlier snapshot.
    ///
    /// Saturating: interface counters can reset (interface removal, counter
    /// wrap), and a negative delta must not underflow.
    pub fn delta_since(&self, earlier: &NetworkSnapshot) -> (u64, u64) {
        (
            self.bytes_received.saturating_sub(earlier.bytes_received),
            self.bytes_sent.saturating_sub(earlier.bytes_sent),
        )
    }
}

/// Take a snapshot of the host's network counters.
pub fn snapshot() -> NetworkSnapshot {
    let networks = Networks::new_with_refreshed_list();
    let mut snapshot = NetworkSnapshot::default();
    for (_interface, data) in networks.iter() {
        snapshot.bytes_received += data.total_received();
        snapshot.bytes_sent += data.total_transmitted();
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_since() {
        let earlier = NetworkSnapshot {
            bytes_received: 100,
            bytes_sent: 10,
        };
        let later = NetworkSnapshot {
            bytes_received: 250,
            bytes_sent: 30,
        };
        assert_eq!((150, 20), later.delta_since(&earlier));
    }

    #[test]
    fn delta_since_saturates_on_counter_reset() {
        let earlier = NetworkSnapshot {
            bytes_received: 100,
            bytes_sent: 10,
        };
        let later = NetworkSnapshot {
            bytes_received: 50,
            bytes_sent: 0,
        };
        assert_eq!((0, 0), later.delta_since(&earlier));
    }

    #[test]
    fn snapshot_is_monotonic() {
        let first = snapshot();
        let second = snapshot();
        assert!(second.bytes_received >= first.bytes_received);
        assert!(second.bytes_sent >= first.bytes_sent);
    }
}
