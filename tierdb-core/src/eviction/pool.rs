//! Sampled eviction pool
//!
//! A fixed array of 16 slots kept sorted by score ascending; the rightmost
//! occupied slot is the best candidate seen so far. Population draws a few
//! random keys per pass and merges them in, so the pool converges on good
//! candidates across passes without a full keyspace scan. Slot key buffers
//! up to 255 bytes are cached and reused across generations; longer keys
//! spill to a heap allocation that is dropped on displacement.

use crate::clock::LruClock;
use crate::eviction::{EvictionPolicy, FrequencyEstimator};
use crate::stats::TieringStats;
use crate::store::{NamespaceId, PrimaryStore, RecordMeta};

/// Number of candidate slots.
pub const EVICTION_POOL_SIZE: usize = 16;

/// Longest key kept in a slot's reusable inline buffer.
pub const POOL_INLINE_KEY_LEN: usize = 255;

#[derive(Debug)]
struct PoolEntry {
    score: u64,
    namespace: NamespaceId,
    /// Reusable buffer for keys up to [`POOL_INLINE_KEY_LEN`] bytes.
    cached: String,
    /// Oversized keys live here and are freed on displacement.
    spilled: Option<String>,
    occupied: bool,
}

impl PoolEntry {
    fn empty() -> Self {
        Self {
            score: 0,
            namespace: 0,
            cached: String::with_capacity(POOL_INLINE_KEY_LEN),
            spilled: None,
            occupied: false,
        }
    }

    fn key(&self) -> &str {
        match &self.spilled {
            Some(key) => key,
            None => &self.cached,
        }
    }

    fn fill(&mut self, namespace: NamespaceId, key: &str, score: u64) {
        self.score = score;
        self.namespace = namespace;
        if key.len() <= POOL_INLINE_KEY_LEN {
            self.cached.clear();
            self.cached.push_str(key);
            self.spilled = None;
        } else {
            self.cached.clear();
            self.spilled = Some(key.to_string());
        }
        self.occupied = true;
    }

    fn vacate(&mut self) {
        self.score = 0;
        self.spilled = None;
        self.occupied = false;
    }
}

/// The candidate pool. Not thread-safe; owned by the pressure controller.
#[derive(Debug)]
pub struct EvictionPool {
    entries: Vec<PoolEntry>,
}

impl Default for EvictionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl EvictionPool {
    pub fn new() -> Self {
        Self {
            entries: (0..EVICTION_POOL_SIZE).map(|_| PoolEntry::empty()).collect(),
        }
    }

    /// Merge one scored candidate into the pool, keeping slots sorted by
    /// score ascending. When the pool is full, only candidates scoring
    /// strictly above the current worst are admitted; admission displaces
    /// that worst slot.
    pub fn insert(&mut self, namespace: NamespaceId, key: &str, score: u64) -> bool {
        let mut k = 0;
        while k < EVICTION_POOL_SIZE
            && self.entries[k].occupied
            && self.entries[k].score < score
        {
            k += 1;
        }

        if k == 0 && self.entries[EVICTION_POOL_SIZE - 1].occupied {
            // Scores no better than the whole of a full pool.
            return false;
        }

        if k < EVICTION_POOL_SIZE && !self.entries[k].occupied {
            // Free slot at the insertion point.
        } else if self.entries[EVICTION_POOL_SIZE - 1].occupied {
            // Full pool: drop the worst slot and shift the prefix left,
            // which carries its (vacated) buffer to position k-1.
            k -= 1;
            self.entries[0].vacate();
            self.entries[..=k].rotate_left(1);
        } else {
            // Room at the tail: shift the suffix right, carrying the last
            // slot's free buffer to position k.
            self.entries[k..].rotate_right(1);
        }

        self.entries[k].fill(namespace, key, score);
        true
    }

    /// Sample keys from the store and merge the acceptable ones.
    ///
    /// `accept` filters candidates before scoring (location and key-shape
    /// checks live in the caller). LFU decay write-backs happen here as a
    /// side effect of scoring. Returns the number of candidates merged.
    #[allow(clippy::too_many_arguments)]
    pub fn populate<F>(
        &mut self,
        namespace: NamespaceId,
        store: &dyn PrimaryStore,
        policy: EvictionPolicy,
        estimator: &FrequencyEstimator,
        clock: &LruClock,
        sample_count: usize,
        accept: F,
        stats: &TieringStats,
    ) -> usize
    where
        F: Fn(&str, &RecordMeta) -> bool,
    {
        let keys = store.sample_keys(namespace, sample_count);
        stats.record_samples(keys.len() as u64);

        let mut merged = 0;
        for key in keys {
            let meta = match store.lookup(namespace, &key) {
                Some(meta) => meta,
                None => continue,
            };
            if !accept(&key, &meta) {
                continue;
            }
            let (score, writeback) = match policy.score(&meta, estimator, clock) {
                Some(scored) => scored,
                None => continue,
            };
            if let Some(freq) = writeback {
                store.store_frequency(namespace, &key, freq);
            }
            if self.insert(namespace, &key, score) {
                merged += 1;
            }
        }
        merged
    }

    /// Pop the best candidate that still exists in the store, vacating any
    /// stale slots passed over on the way.
    pub fn best_valid(
        &mut self,
        store: &dyn PrimaryStore,
    ) -> Option<(NamespaceId, String, u64)> {
        for k in (0..EVICTION_POOL_SIZE).rev() {
            if !self.entries[k].occupied {
                continue;
            }
            let namespace = self.entries[k].namespace;
            let score = self.entries[k].score;
            if store.lookup(namespace, self.entries[k].key()).is_some() {
                let key = self.entries[k].key().to_string();
                self.entries[k].vacate();
                return Some((namespace, key, score));
            }
            // Vanished since sampling.
            self.entries[k].vacate();
        }
        None
    }

    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            entry.vacate();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| !e.occupied)
    }

    #[cfg(test)]
    fn scores(&self) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|e| e.occupied)
            .map(|e| e.score)
            .collect()
    }

    #[cfg(test)]
    fn keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.occupied)
            .map(|e| e.key())
            .collect()
    }
}
