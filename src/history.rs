// Keeps the last (bytes, timestamp) sample per (node, device, direction) so
// Stage 2 can turn successive byte counters into a bits/sec rate. Pure
// in-process state: nothing here is persisted across process restarts.

use crate::info_table::WlanDirection;
use std::collections::HashMap;
use std::time::Duration;

pub type HistoryKey = (u32, u8, WlanDirection);

#[derive(Debug, Clone, Copy)]
pub struct HistorySample {
    pub bytes: u64,
    pub timestamp: f64,
    /// Incremented on every cycle that passes without a fresh sample;
    /// reset to 0 whenever the key is refreshed. Drives eviction.
    pub cycles_since_seen: u32,
}

/// Number of consecutive cycles a key may go unrefreshed before the
/// orchestrator evicts it (a supplement: the source specifies no eviction
/// policy at all).
pub const EVICT_AFTER_CYCLES: u32 = 8;

#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    samples: HashMap<HistoryKey, HistorySample>,
}

/// Result of sampling a new byte counter against history: the computed rate
/// (if a previous sample existed) and whether this is a fresh key.
pub struct RateSample {
    pub rate_bps: Option<f64>,
}

impl HistoryStore {
    pub fn new() -> Self {
        HistoryStore::default()
    }

    /// Records a fresh byte counter for `key` observed at `now` (seconds
    /// since epoch, as a float). Returns the computed rate if a previous
    /// sample for the same key exists. A decreasing counter (reset/wrap)
    /// clamps the rate to 0.0 rather than emitting a negative value -- see
    /// SPEC_FULL.md Open Question decisions.
    pub fn sample(&mut self, key: HistoryKey, bytes: u64, now: f64) -> RateSample {
        let previous = self.samples.get(&key).copied();
        let rate_bps = previous.and_then(|prev| {
            let dt = now - prev.timestamp;
            if dt <= 0.0 {
                None
            } else {
                let delta_bytes = bytes as i128 - prev.bytes as i128;
                let rate = 8.0 * delta_bytes as f64 / dt;
                Some(rate.max(0.0))
            }
        });
        self.samples.insert(key, HistorySample { bytes, timestamp: now, cycles_since_seen: 0 });
        RateSample { rate_bps }
    }

    /// Advances the staleness counter for every stored key that was NOT
    /// touched this cycle (the caller passes the set of keys refreshed in
    /// the cycle just completed) and evicts any that have gone
    /// `EVICT_AFTER_CYCLES` cycles without a fresh sample.
    pub fn age_and_evict(&mut self, refreshed: &std::collections::HashSet<HistoryKey>) {
        self.samples.retain(|key, sample| {
            if refreshed.contains(key) {
                sample.cycles_since_seen = 0;
            } else {
                sample.cycles_since_seen += 1;
            }
            sample.cycles_since_seen < EVICT_AFTER_CYCLES
        });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, key: &HistoryKey) -> Option<&HistorySample> {
        self.samples.get(key)
    }
}

/// Converts a `Duration`-based "now" into the float-seconds-since-epoch form
/// used throughout the rate math, matching the source's `time.time()`.
pub fn now_as_secs(now: std::time::SystemTime) -> f64 {
    now.duration_since(std::time::UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_has_no_rate() {
        let mut history = HistoryStore::new();
        let sample = history.sample((5, 0, WlanDirection::Rx), 1000, 10.0);
        assert!(sample.rate_bps.is_none());
    }

    #[test]
    fn second_sample_computes_rate() {
        let mut history = HistoryStore::new();
        history.sample((5, 0, WlanDirection::Rx), 1000, 10.0);
        let sample = history.sample((5, 0, WlanDirection::Rx), 5000, 14.0);
        // 8 * (5000-1000) / 4 = 8000.0
        assert_eq!(sample.rate_bps, Some(8000.0));
    }

    #[test]
    fn decreasing_counter_clamps_to_zero() {
        let mut history = HistoryStore::new();
        history.sample((5, 0, WlanDirection::Rx), 5000, 10.0);
        let sample = history.sample((5, 0, WlanDirection::Rx), 1000, 14.0);
        assert_eq!(sample.rate_bps, Some(0.0));
    }

    #[test]
    fn timestamps_are_monotonic_or_rate_is_skipped() {
        let mut history = HistoryStore::new();
        history.sample((5, 0, WlanDirection::Rx), 1000, 10.0);
        let sample = history.sample((5, 0, WlanDirection::Rx), 2000, 10.0);
        assert!(sample.rate_bps.is_none());
    }

    #[test]
    fn eviction_after_k_stale_cycles() {
        let mut history = HistoryStore::new();
        let key = (5, 0, WlanDirection::Rx);
        history.sample(key, 1000, 10.0);
        let empty = std::collections::HashSet::new();
        for _ in 0..EVICT_AFTER_CYCLES {
            history.age_and_evict(&empty);
        }
        assert!(history.get(&key).is_none());
    }

    #[test]
    fn refreshed_keys_do_not_age() {
        let mut history = HistoryStore::new();
        let key = (5, 0, WlanDirection::Rx);
        history.sample(key, 1000, 10.0);
        let mut refreshed = std::collections::HashSet::new();
        refreshed.insert(key);
        for _ in 0..(EVICT_AFTER_CYCLES * 2) {
            history.age_and_evict(&refreshed);
        }
        assert!(history.get(&key).is_some());
    }
}
