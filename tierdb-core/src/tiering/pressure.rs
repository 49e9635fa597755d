//! Memory pressure controller
//!
//! Owns the eviction pool and the per-namespace tiering queues and drives
//! the whole reclamation path: soft-threshold checks, the no-eviction
//! busy-poll, proactive and forced tiering batches, and the FreeQueue
//! drain that actually releases memory. Single logical worker per
//! namespace; the pool and queues are mutated only through `&mut` methods.

use crate::clock::LruClock;
use crate::config::TieringConfig;
use crate::eviction::{EvictionPolicy, EvictionPool, FrequencyEstimator};
use crate::relational::{partition_values, Condition, RelationalKey};
use crate::stats::TieringStats;
use crate::store::{ColdStore, Location, NamespaceId, PrimaryStore, RecordMeta};
use crate::tiering::batch::BatchTieringEngine;
use crate::tiering::lazyfree::LazyFreeWorker;
use crate::tiering::queues::{NamespaceQueues, QueueEntry};
use crate::tiering::TieringError;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct MemoryPressureController {
    config: TieringConfig,
    primary: Arc<dyn PrimaryStore>,
    batcher: BatchTieringEngine,
    clock: Arc<LruClock>,
    estimator: FrequencyEstimator,
    pool: EvictionPool,
    queues: HashMap<NamespaceId, NamespaceQueues>,
    stats: Arc<TieringStats>,
    lazyfree: LazyFreeWorker,
}

impl MemoryPressureController {
    pub fn new(
        config: TieringConfig,
        primary: Arc<dyn PrimaryStore>,
        cold: Arc<dyn ColdStore>,
    ) -> Result<Self> {
        config.validate()?;

        let clock = Arc::new(LruClock::new(config.clock_refresh_interval_ms));
        let estimator = FrequencyEstimator::new(config.lfu_log_factor, config.lfu_decay_minutes);
        let lazyfree = LazyFreeWorker::spawn(Arc::clone(&primary));

        info!(
            max_memory = config.max_memory,
            policy = ?config.policy,
            "memory pressure controller ready"
        );

        Ok(Self {
            batcher: BatchTieringEngine::new(cold),
            config,
            primary,
            clock,
            estimator,
            pool: EvictionPool::new(),
            queues: HashMap::new(),
            stats: Arc::new(TieringStats::default()),
            lazyfree,
        })
    }

    /// Bring the namespace's memory usage back under the ceiling.
    ///
    /// Usage at or below 80% of the ceiling (after subtracting overhead
    /// that eviction cannot reclaim) is a no-op. Under the no-eviction
    /// policy pending background frees are awaited, then the call fails
    /// without touching any queue. Otherwise persisted row groups are
    /// drained from the FreeQueue until usage fits, forcing tiering
    /// batches whenever the FreeQueue runs dry.
    pub fn reclaim(&mut self, ns: NamespaceId) -> Result<(), TieringError> {
        self.clock.tick();

        let max = self.config.max_memory;
        let soft = max / 5 * 4;

        let mut used = self.primary.used_memory();
        if used <= soft {
            return Ok(());
        }
        used = used.saturating_sub(self.primary.not_counted_overhead());
        if used <= soft {
            return Ok(());
        }

        debug!(ns, used, max, "memory over soft threshold, reclaiming");

        if self.config.policy == EvictionPolicy::NoEviction {
            // Background frees already in flight may be enough; wait for
            // them before refusing.
            while self.lazyfree.pending_jobs() > 0 {
                std::thread::sleep(Duration::from_millis(1));
                let now = self
                    .primary
                    .used_memory()
                    .saturating_sub(self.primary.not_counted_overhead());
                if now <= soft {
                    return Ok(());
                }
            }
            used = self
                .primary
                .used_memory()
                .saturating_sub(self.primary.not_counted_overhead());
            if used <= soft {
                return Ok(());
            }
            warn!(ns, used, "over memory ceiling under no-eviction policy");
            return Err(TieringError::PolicyForbids);
        }

        let queues = self
            .queues
            .entry(ns)
            .or_insert_with(|| NamespaceQueues::new(&self.config));

        if queues.free.len() < self.config.free_queue_low_water {
            debug!(
                ns,
                free_depth = queues.free.len(),
                low_water = self.config.free_queue_low_water,
                "free queue under low water, running proactive batch"
            );
            self.batcher
                .run_batch(ns, self.primary.as_ref(), queues, &self.config, &self.stats);
        }

        loop {
            used = self
                .primary
                .used_memory()
                .saturating_sub(self.primary.not_counted_overhead());
            if used <= max {
                break;
            }

            match queues.free.dequeue() {
                Some(entry) => {
                    let meta = self.primary.lookup(ns, &entry.key).ok_or_else(|| {
                        TieringError::FatalConsistency(format!(
                            "free-queue key '{}' missing from primary store",
                            entry.key
                        ))
                    })?;
                    if meta.location != Location::Persisted {
                        return Err(TieringError::FatalConsistency(format!(
                            "free-queue key '{}' is {:?}, not persisted",
                            entry.key, meta.location
                        )));
                    }
                    if !self.primary.remove(ns, &entry.key) {
                        return Err(TieringError::FatalConsistency(format!(
                            "failed to remove persisted key '{}'",
                            entry.key
                        )));
                    }
                    self.stats.record_cleared();
                }
                None => {
                    info!(ns, used, "free queue empty, forcing tiering batch");
                    let persisted = self.batcher.run_batch(
                        ns,
                        self.primary.as_ref(),
                        queues,
                        &self.config,
                        &self.stats,
                    );
                    if persisted == 0 {
                        // Nothing staged either; sample fresh candidates.
                        let staged = Self::stage_candidates(
                            &mut self.pool,
                            self.primary.as_ref(),
                            queues,
                            &self.config,
                            &self.estimator,
                            &self.clock,
                            &self.stats,
                            ns,
                            None,
                        );
                        if staged == 0 && queues.evict.is_empty() {
                            warn!(ns, used, max, "no evictable row groups left");
                            return Err(TieringError::PolicyForbids);
                        }
                    }
                }
            }
        }

        self.stats
            .set_queue_depths(queues.evict.len(), queues.free.len());
        debug!(ns, used, "reclamation complete");
        Ok(())
    }

    /// Sample the namespace and stage evictable row groups on its
    /// EvictQueue, optionally scoped by a partition filter. Returns the
    /// number of candidates staged.
    pub fn enqueue_candidates(
        &mut self,
        ns: NamespaceId,
        filter: Option<&Condition>,
    ) -> usize {
        self.clock.tick();
        let queues = self
            .queues
            .entry(ns)
            .or_insert_with(|| NamespaceQueues::new(&self.config));
        Self::stage_candidates(
            &mut self.pool,
            self.primary.as_ref(),
            queues,
            &self.config,
            &self.estimator,
            &self.clock,
            &self.stats,
            ns,
            filter,
        )
    }

    /// One sample-score-stage pass through the eviction pool.
    #[allow(clippy::too_many_arguments)]
    fn stage_candidates(
        pool: &mut EvictionPool,
        primary: &dyn PrimaryStore,
        queues: &mut NamespaceQueues,
        config: &TieringConfig,
        estimator: &FrequencyEstimator,
        clock: &LruClock,
        stats: &TieringStats,
        ns: NamespaceId,
        filter: Option<&Condition>,
    ) -> usize {
        let accept = |key: &str, meta: &RecordMeta| {
            if meta.location != Location::Resident {
                return false;
            }
            match RelationalKey::parse(key) {
                Ok(parsed) => {
                    parsed.row_group_id().is_some()
                        && filter.map_or(true, |cond| {
                            cond.evaluate(&partition_values(parsed.partition()))
                        })
                }
                Err(_) => false,
            }
        };

        pool.clear();
        pool.populate(
            ns,
            primary,
            config.policy,
            estimator,
            clock,
            config.sample_count,
            accept,
            stats,
        );

        let mut staged = 0;
        while let Some((entry_ns, key, score)) = pool.best_valid(primary) {
            debug_assert_eq!(entry_ns, ns);
            // Sampling repeats keys; a key persisted twice would later make
            // the FreeQueue drain look like a consistency fault.
            if queues.evict.contains(&key) {
                continue;
            }
            if !queues.evict.enqueue(QueueEntry { key, score }) {
                debug!(ns, "evict queue full, remaining candidates dropped");
                pool.clear();
                break;
            }
            staged += 1;
        }

        stats.set_queue_depths(queues.evict.len(), queues.free.len());
        staged
    }

    /// Run one tiering batch for the namespace, returning the number of
    /// row groups confirmed persisted.
    pub fn run_batch(&mut self, ns: NamespaceId) -> usize {
        let queues = self
            .queues
            .entry(ns)
            .or_insert_with(|| NamespaceQueues::new(&self.config));
        self.batcher
            .run_batch(ns, self.primary.as_ref(), queues, &self.config, &self.stats)
    }

    /// Stage one already-scored candidate directly on the EvictQueue.
    pub fn stage_candidate(&mut self, ns: NamespaceId, key: &str, score: u64) -> bool {
        if self.primary.lookup(ns, key).is_none() {
            return false;
        }
        let queues = self
            .queues
            .entry(ns)
            .or_insert_with(|| NamespaceQueues::new(&self.config));
        if queues.evict.contains(key) {
            return false;
        }
        queues.evict.enqueue(QueueEntry {
            key: key.to_string(),
            score,
        })
    }

    /// Stage an externally persisted record for memory reclamation. The
    /// record must already be marked [`Location::Persisted`].
    pub fn confirm_persisted(&mut self, ns: NamespaceId, key: &str) -> bool {
        match self.primary.lookup(ns, key) {
            Some(meta) if meta.location == Location::Persisted => {}
            _ => return false,
        }
        let queues = self
            .queues
            .entry(ns)
            .or_insert_with(|| NamespaceQueues::new(&self.config));
        if queues.free.contains(key) {
            return false;
        }
        queues.free.enqueue(QueueEntry {
            key: key.to_string(),
            score: 0,
        })
    }

    /// Hand a removal to the background free thread.
    pub fn lazy_remove(&self, ns: NamespaceId, key: &str) {
        self.lazyfree.submit_remove(ns, key.to_string());
    }

    pub fn pending_lazy_jobs(&self) -> usize {
        self.lazyfree.pending_jobs()
    }

    pub fn stats(&self) -> &TieringStats {
        &self.stats
    }

    pub fn clock(&self) -> &LruClock {
        &self.clock
    }

    pub fn evict_depth(&self, ns: NamespaceId) -> usize {
        self.queues.get(&ns).map(|q| q.evict.len()).unwrap_or(0)
    }

    pub fn free_depth(&self, ns: NamespaceId) -> usize {
        self.queues.get(&ns).map(|q| q.free.len()).unwrap_or(0)
    }
}
