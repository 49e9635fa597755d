//! In-memory primary store
//!
//! Sharded concurrent maps per namespace with atomic memory accounting.
//! Random sampling is served from a seedable RNG so eviction behavior can
//! be reproduced in tests.

use crate::clock::LruClock;
use crate::eviction::{FrequencyCounter, FrequencyEstimator};
use crate::store::{Location, NamespaceId, PrimaryStore, RecordMeta};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Accounted fixed cost of one record beyond its key and payload bytes.
const RECORD_OVERHEAD: usize = 64;

#[derive(Debug, Clone)]
struct StoredRecord {
    payload: Vec<u8>,
    meta: RecordMeta,
}

/// The in-process primary tier.
#[derive(Debug)]
pub struct MemoryStore {
    namespaces: DashMap<NamespaceId, DashMap<String, StoredRecord>>,
    used: AtomicUsize,
    overhead: AtomicUsize,
    rng: Mutex<SmallRng>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }

    /// Deterministic sampling for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            namespaces: DashMap::new(),
            used: AtomicUsize::new(0),
            overhead: AtomicUsize::new(0),
            rng: Mutex::new(rng),
        }
    }

    fn record_size(key: &str, payload: &[u8]) -> usize {
        RECORD_OVERHEAD + key.len() + payload.len()
    }

    /// Insert a single-row record.
    pub fn insert(&self, ns: NamespaceId, key: &str, payload: Vec<u8>, clock: &LruClock) {
        self.insert_row_group(ns, key, payload, 1, clock);
    }

    /// Insert a row-group record stamped as freshly accessed.
    pub fn insert_row_group(
        &self,
        ns: NamespaceId,
        key: &str,
        payload: Vec<u8>,
        row_count: u64,
        clock: &LruClock,
    ) {
        let size_bytes = Self::record_size(key, &payload);
        let record = StoredRecord {
            payload,
            meta: RecordMeta {
                location: Location::Resident,
                lru_stamp: clock.now(),
                freq: FrequencyCounter::new(clock.minutes()),
                expires_at_ms: None,
                size_bytes,
                row_count,
            },
        };

        let map = self.namespaces.entry(ns).or_default();
        if let Some(old) = map.insert(key.to_string(), record) {
            self.used.fetch_sub(old.meta.size_bytes, Ordering::Relaxed);
        }
        self.used.fetch_add(size_bytes, Ordering::Relaxed);
    }

    /// Attach an absolute expiry to an existing record.
    pub fn set_expiry(&self, ns: NamespaceId, key: &str, expires_at_ms: u64) -> bool {
        match self.namespaces.get(&ns) {
            Some(map) => match map.get_mut(key) {
                Some(mut record) => {
                    record.meta.expires_at_ms = Some(expires_at_ms);
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Record an access: restamp the LRU clock and bump the LFU counter.
    ///
    /// Lock order: the rng mutex must never be taken while a shard guard is
    /// held (`sample_keys` holds rng while reading shards).
    pub fn touch(
        &self,
        ns: NamespaceId,
        key: &str,
        estimator: &FrequencyEstimator,
        clock: &LruClock,
    ) -> bool {
        let map = match self.namespaces.get(&ns) {
            Some(map) => map,
            None => return false,
        };
        let counter = match map.get(key) {
            Some(record) => record.meta.freq.counter,
            None => return false,
        };
        let bumped = {
            let mut rng = self.rng.lock();
            estimator.log_incr(counter, &mut *rng)
        };
        let updated = match map.get_mut(key) {
            Some(mut record) => {
                record.meta.lru_stamp = clock.now();
                record.meta.freq.counter = bumped;
                true
            }
            None => false,
        };
        updated
    }

    /// Bytes of bookkeeping excluded from eviction decisions.
    pub fn set_not_counted_overhead(&self, bytes: usize) {
        self.overhead.store(bytes, Ordering::Relaxed);
    }

    pub fn contains(&self, ns: NamespaceId, key: &str) -> bool {
        self.namespaces
            .get(&ns)
            .map(|map| map.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self, ns: NamespaceId) -> usize {
        self.namespaces.get(&ns).map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, ns: NamespaceId) -> bool {
        self.len(ns) == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PrimaryStore for MemoryStore {
    fn sample_keys(&self, ns: NamespaceId, count: usize) -> Vec<String> {
        let map = match self.namespaces.get(&ns) {
            Some(map) => map,
            None => return Vec::new(),
        };
        if map.is_empty() {
            return Vec::new();
        }

        // Random positional draws; duplicates are possible and harmless,
        // the pool deduplicates by score displacement.
        let mut rng = self.rng.lock();
        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            let idx = rng.gen_range(0..map.len());
            if let Some(entry) = map.iter().nth(idx) {
                keys.push(entry.key().clone());
            }
        }
        keys
    }

    fn lookup(&self, ns: NamespaceId, key: &str) -> Option<RecordMeta> {
        self.namespaces
            .get(&ns)
            .and_then(|map| map.get(key).map(|record| record.meta))
    }

    fn payload(&self, ns: NamespaceId, key: &str) -> Option<Vec<u8>> {
        self.namespaces
            .get(&ns)
            .and_then(|map| map.get(key).map(|record| record.payload.clone()))
    }

    fn remove(&self, ns: NamespaceId, key: &str) -> bool {
        let map = match self.namespaces.get(&ns) {
            Some(map) => map,
            None => return false,
        };
        match map.remove(key) {
            Some((_, record)) => {
                self.used.fetch_sub(record.meta.size_bytes, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    fn used_memory(&self) -> usize {
        self.used.load(Ordering::Relaxed) + self.overhead.load(Ordering::Relaxed)
    }

    fn not_counted_overhead(&self) -> usize {
        self.overhead.load(Ordering::Relaxed)
    }

    fn store_frequency(&self, ns: NamespaceId, key: &str, freq: FrequencyCounter) {
        if let Some(map) = self.namespaces.get(&ns) {
            if let Some(mut record) = map.get_mut(key) {
                record.meta.freq = freq;
            }
        }
    }

    fn mark_location(&self, ns: NamespaceId, key: &str, location: Location) -> bool {
        let map = match self.namespaces.get(&ns) {
            Some(map) => map,
            None => return false,
        };
        let updated = match map.get_mut(key) {
            Some(mut record) => {
                record.meta.location = location;
                true
            }
            None => false,
        };
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> LruClock {
        LruClock::new(100)
    }

    #[test]
    fn test_insert_lookup_remove() {
        let store = MemoryStore::with_seed(1);
        let clock = clock();

        store.insert_row_group(0, "D:{1:a}:1", vec![0u8; 100], 50, &clock);
        let meta = store.lookup(0, "D:{1:a}:1").unwrap();
        assert_eq!(meta.location, Location::Resident);
        assert_eq!(meta.row_count, 50);
        assert_eq!(store.payload(0, "D:{1:a}:1").unwrap().len(), 100);

        assert!(store.remove(0, "D:{1:a}:1"));
        assert!(!store.remove(0, "D:{1:a}:1"));
        assert!(store.lookup(0, "D:{1:a}:1").is_none());
    }

    #[test]
    fn test_memory_accounting() {
        let store = MemoryStore::with_seed(1);
        let clock = clock();
        assert_eq!(store.used_memory(), 0);

        store.insert(0, "key", vec![0u8; 100], &clock);
        let after_insert = store.used_memory();
        assert!(after_insert >= 100 + "key".len());

        // Replacement does not double-count.
        store.insert(0, "key", vec![0u8; 10], &clock);
        assert!(store.used_memory() < after_insert);

        store.remove(0, "key");
        assert_eq!(store.used_memory(), 0);

        store.set_not_counted_overhead(4096);
        assert_eq!(store.used_memory(), 4096);
        assert_eq!(store.not_counted_overhead(), 4096);
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let store = MemoryStore::with_seed(1);
        let clock = clock();
        store.insert(0, "key", vec![1], &clock);
        store.insert(1, "key", vec![2], &clock);

        assert_eq!(store.payload(0, "key").unwrap(), vec![1]);
        assert_eq!(store.payload(1, "key").unwrap(), vec![2]);
        assert!(store.remove(0, "key"));
        assert!(store.contains(1, "key"));
    }

    #[test]
    fn test_sample_keys_draws_from_namespace() {
        let store = MemoryStore::with_seed(7);
        let clock = clock();
        for i in 0..10 {
            store.insert(0, &format!("k{}", i), vec![0], &clock);
        }

        let keys = store.sample_keys(0, 5);
        assert_eq!(keys.len(), 5);
        for key in &keys {
            assert!(store.contains(0, key));
        }
        assert!(store.sample_keys(9, 5).is_empty());
    }

    #[test]
    fn test_touch_updates_lru_and_frequency() {
        let store = MemoryStore::with_seed(1);
        let clock = clock();
        // Certain increment at log_factor 0.
        let estimator = FrequencyEstimator::new(0, 60);

        store.insert(0, "key", vec![0], &clock);
        let before = store.lookup(0, "key").unwrap();
        assert!(store.touch(0, "key", &estimator, &clock));
        let after = store.lookup(0, "key").unwrap();
        assert_eq!(after.freq.counter, before.freq.counter + 1);

        assert!(!store.touch(0, "missing", &estimator, &clock));
    }

    #[test]
    fn test_mark_location_and_frequency_writeback() {
        let store = MemoryStore::with_seed(1);
        let clock = clock();
        store.insert(0, "key", vec![0], &clock);

        assert!(store.mark_location(0, "key", Location::Persisted));
        assert_eq!(store.lookup(0, "key").unwrap().location, Location::Persisted);
        assert!(!store.mark_location(0, "missing", Location::Persisted));

        let freq = FrequencyCounter {
            last_decrement_min: 9,
            counter: 99,
        };
        store.store_frequency(0, "key", freq);
        assert_eq!(store.lookup(0, "key").unwrap().freq, freq);
    }

    #[test]
    fn test_concurrent_touch_and_sampling() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::with_seed(3));
        let clock = Arc::new(LruClock::new(100));
        let estimator = FrequencyEstimator::new(10, 60);
        for i in 0..64 {
            store.insert(0, &format!("k{}", i), vec![0u8; 8], &clock);
        }

        // Accesses and pool-population sampling race from different
        // threads; both paths take the rng mutex and shard guards.
        let toucher = {
            let store = Arc::clone(&store);
            let clock = Arc::clone(&clock);
            std::thread::spawn(move || {
                for i in 0..5_000usize {
                    store.touch(0, &format!("k{}", i % 64), &estimator, &clock);
                }
            })
        };
        let sampler = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..5_000usize {
                    store.sample_keys(0, 5);
                }
            })
        };

        toucher.join().unwrap();
        sampler.join().unwrap();
        assert_eq!(store.len(0), 64);
    }

    #[test]
    fn test_set_expiry() {
        let store = MemoryStore::with_seed(1);
        let clock = clock();
        store.insert(0, "key", vec![0], &clock);
        assert!(store.set_expiry(0, "key", 12345));
        assert_eq!(store.lookup(0, "key").unwrap().expires_at_ms, Some(12345));
        assert!(!store.set_expiry(0, "missing", 12345));
    }
}
