//! Eviction policies and candidate selection
//!
//! A policy turns a record's metadata into an eviction score (higher means
//! a better candidate). Candidates are found by sampling into a small
//! best-effort pool ([`pool::EvictionPool`]) rather than scanning the whole
//! keyspace.

pub mod frequency;
pub mod pool;

pub use frequency::{FrequencyCounter, FrequencyEstimator, LFU_INIT_VAL};
pub use pool::{EvictionPool, EVICTION_POOL_SIZE};

use crate::clock::LruClock;
use crate::store::RecordMeta;
use serde::{Deserialize, Serialize};

/// How eviction candidates are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    /// Longest idle time wins.
    Lru,
    /// Lowest access frequency wins, with periodic decay.
    Lfu,
    /// Among volatile records, nearest expiry wins.
    VolatileTtl,
    /// Refuse to evict; memory pressure becomes an error.
    NoEviction,
}

impl EvictionPolicy {
    /// Score a record for eviction. `None` means the record is not a
    /// candidate under this policy.
    ///
    /// Under LFU the decay check runs as a side effect of scoring; the
    /// updated counter is returned so the caller can write it back.
    pub fn score(
        &self,
        meta: &RecordMeta,
        estimator: &FrequencyEstimator,
        clock: &LruClock,
    ) -> Option<(u64, Option<FrequencyCounter>)> {
        match self {
            EvictionPolicy::Lru => Some((clock.idle_time_ms(meta.lru_stamp), None)),
            EvictionPolicy::Lfu => {
                let decayed = estimator.decr_if_due(meta.freq, clock.minutes());
                let score = 255 - u64::from(decayed.counter);
                let writeback = (decayed != meta.freq).then_some(decayed);
                Some((score, writeback))
            }
            EvictionPolicy::VolatileTtl => meta
                .expires_at_ms
                .map(|expires| (u64::MAX - expires, None)),
            EvictionPolicy::NoEviction => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Location;

    fn meta(lru_stamp: u64, counter: u8, expires_at_ms: Option<u64>) -> RecordMeta {
        RecordMeta {
            location: Location::Resident,
            lru_stamp,
            freq: FrequencyCounter {
                last_decrement_min: 0,
                counter,
            },
            expires_at_ms,
            size_bytes: 64,
            row_count: 1,
        }
    }

    #[test]
    fn test_lru_scores_idle_time() {
        let clock = LruClock::new(100);
        clock.tick();
        let now = clock.now();

        let est = FrequencyEstimator::new(10, 1);
        let idle = meta(now.saturating_sub(10), 0, None);
        let hot = meta(now, 0, None);

        let (idle_score, _) = EvictionPolicy::Lru.score(&idle, &est, &clock).unwrap();
        let (hot_score, _) = EvictionPolicy::Lru.score(&hot, &est, &clock).unwrap();
        assert!(idle_score > hot_score);
    }

    #[test]
    fn test_lfu_scores_inverse_frequency() {
        let clock = LruClock::new(100);
        // Long decay window so scoring does not decay in this test.
        let est = FrequencyEstimator::new(10, 60);

        let cold = meta(0, 2, None);
        let warm = meta(0, 200, None);
        let (cold_score, wb) = EvictionPolicy::Lfu.score(&cold, &est, &clock).unwrap();
        let (warm_score, _) = EvictionPolicy::Lfu.score(&warm, &est, &clock).unwrap();
        assert_eq!(cold_score, 253);
        assert_eq!(warm_score, 55);
        assert!(wb.is_none());
    }

    #[test]
    fn test_lfu_returns_decayed_counter_for_writeback() {
        let clock = LruClock::new(100);
        let est = FrequencyEstimator::new(10, 1);
        // Stamp far enough in the past that decay is due unless the
        // wall-clock minute happens to be 0 mod 2^16.
        let stale = RecordMeta {
            freq: FrequencyCounter {
                last_decrement_min: clock.minutes().wrapping_sub(10),
                counter: 100,
            },
            ..meta(0, 0, None)
        };
        let (_, writeback) = EvictionPolicy::Lfu.score(&stale, &est, &clock).unwrap();
        let updated = writeback.expect("decay was due");
        assert_eq!(updated.counter, 50);
    }

    #[test]
    fn test_volatile_ttl_requires_expiry() {
        let clock = LruClock::new(100);
        let est = FrequencyEstimator::new(10, 1);

        assert!(EvictionPolicy::VolatileTtl
            .score(&meta(0, 0, None), &est, &clock)
            .is_none());

        let soon = meta(0, 0, Some(1_000));
        let later = meta(0, 0, Some(2_000));
        let (soon_score, _) = EvictionPolicy::VolatileTtl.score(&soon, &est, &clock).unwrap();
        let (later_score, _) = EvictionPolicy::VolatileTtl
            .score(&later, &est, &clock)
            .unwrap();
        assert!(soon_score > later_score);
    }

    #[test]
    fn test_no_eviction_never_scores() {
        let clock = LruClock::new(100);
        let est = FrequencyEstimator::new(10, 1);
        assert!(EvictionPolicy::NoEviction
            .score(&meta(0, 0, Some(5)), &est, &clock)
            .is_none());
    }
}
