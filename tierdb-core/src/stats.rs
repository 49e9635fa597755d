//! Tiering statistics
//!
//! Write-only atomic counters in the style of the storage-engine stats:
//! the reclamation and batch-tiering paths record events, observers read.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for the eviction/tiering pipeline.
#[derive(Debug, Default)]
pub struct TieringStats {
    /// Row groups persisted to the cold store.
    evicted_keys: AtomicU64,
    /// Row groups removed from primary memory after persistence.
    cleared_keys: AtomicU64,
    /// Tiering batches handed to the cold store.
    batches_run: AtomicU64,
    /// Keys drawn while populating the eviction pool.
    samples_drawn: AtomicU64,
    /// Current EvictQueue depth (last observed).
    evict_queue_depth: AtomicUsize,
    /// Current FreeQueue depth (last observed).
    free_queue_depth: AtomicUsize,
}

impl TieringStats {
    pub(crate) fn record_evicted(&self, count: u64) {
        self.evicted_keys.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_cleared(&self) {
        self.cleared_keys.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self) {
        self.batches_run.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_samples(&self, count: u64) {
        self.samples_drawn.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn set_queue_depths(&self, evict: usize, free: usize) {
        self.evict_queue_depth.store(evict, Ordering::Relaxed);
        self.free_queue_depth.store(free, Ordering::Relaxed);
    }

    /// Total row groups persisted to the cold store.
    pub fn evicted_keys(&self) -> u64 {
        self.evicted_keys.load(Ordering::Relaxed)
    }

    /// Total row groups freed from primary memory.
    pub fn cleared_keys(&self) -> u64 {
        self.cleared_keys.load(Ordering::Relaxed)
    }

    /// Total batches handed to the cold store.
    pub fn batches_run(&self) -> u64 {
        self.batches_run.load(Ordering::Relaxed)
    }

    /// Total keys sampled for pool population.
    pub fn samples_drawn(&self) -> u64 {
        self.samples_drawn.load(Ordering::Relaxed)
    }

    /// Last observed EvictQueue depth.
    pub fn evict_queue_depth(&self) -> usize {
        self.evict_queue_depth.load(Ordering::Relaxed)
    }

    /// Last observed FreeQueue depth.
    pub fn free_queue_depth(&self) -> usize {
        self.free_queue_depth.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = TieringStats::default();
        assert_eq!(stats.evicted_keys(), 0);

        stats.record_evicted(3);
        stats.record_evicted(2);
        assert_eq!(stats.evicted_keys(), 5);

        stats.record_cleared();
        assert_eq!(stats.cleared_keys(), 1);

        stats.record_batch();
        stats.record_samples(5);
        assert_eq!(stats.batches_run(), 1);
        assert_eq!(stats.samples_drawn(), 5);
    }

    #[test]
    fn test_queue_depth_gauges() {
        let stats = TieringStats::default();
        stats.set_queue_depths(7, 2);
        assert_eq!(stats.evict_queue_depth(), 7);
        assert_eq!(stats.free_queue_depth(), 2);

        stats.set_queue_depths(0, 0);
        assert_eq!(stats.evict_queue_depth(), 0);
    }
}
