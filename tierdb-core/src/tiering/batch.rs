//! Batch tiering engine
//!
//! Drains the best candidates from a namespace's EvictQueue, hands their
//! payloads to the cold store in one batch write, and stages the confirmed
//! ones on the FreeQueue for memory reclamation. Unconfirmed entries return
//! to the EvictQueue, so a short or failed batch write degrades to a retry
//! rather than data loss.

use crate::config::TieringConfig;
use crate::stats::TieringStats;
use crate::store::{ColdStore, Location, NamespaceId, PrimaryStore};
use crate::tiering::queues::{NamespaceQueues, QueueEntry};
use std::sync::Arc;
use tracing::{debug, warn};

/// Moves row groups from the primary store into the cold store in batches.
pub struct BatchTieringEngine {
    cold: Arc<dyn ColdStore>,
}

impl BatchTieringEngine {
    pub fn new(cold: Arc<dyn ColdStore>) -> Self {
        Self { cold }
    }

    /// Run one tiering batch for a namespace.
    ///
    /// Takes up to `batch_size` candidates by score, skipping entries whose
    /// records vanished since staging (skips cost no batch budget). Returns
    /// the number of row groups confirmed persisted and staged for freeing.
    pub fn run_batch(
        &self,
        ns: NamespaceId,
        primary: &dyn PrimaryStore,
        queues: &mut NamespaceQueues,
        config: &TieringConfig,
        stats: &TieringStats,
    ) -> usize {
        let mut entries: Vec<QueueEntry> = Vec::with_capacity(config.batch_size);
        let mut keys: Vec<String> = Vec::with_capacity(config.batch_size);
        let mut payloads: Vec<Vec<u8>> = Vec::with_capacity(config.batch_size);

        while entries.len() < config.batch_size {
            let entry = match queues.evict.take_best() {
                Some(entry) => entry,
                None => break,
            };
            let payload = match primary.payload(ns, &entry.key) {
                Some(payload) => payload,
                None => continue, // vanished since staging
            };
            primary.mark_location(ns, &entry.key, Location::Flushing);
            keys.push(entry.key.clone());
            payloads.push(payload);
            entries.push(entry);
        }

        if entries.is_empty() {
            stats.set_queue_depths(queues.evict.len(), queues.free.len());
            return 0;
        }

        let persisted = self.cold.persist_batch(ns, &keys, &payloads);

        for entry in entries.drain(..persisted.min(keys.len())) {
            primary.mark_location(ns, &entry.key, Location::Persisted);
            if !queues.free.enqueue(entry.clone()) {
                warn!(
                    ns,
                    key = %entry.key,
                    "free queue full, persisted row group not staged for freeing"
                );
            }
        }

        // Unconfirmed tail goes back for the next batch.
        for entry in entries {
            primary.mark_location(ns, &entry.key, Location::Resident);
            if !queues.evict.enqueue(entry.clone()) {
                warn!(
                    ns,
                    key = %entry.key,
                    "evict queue full, dropping unconfirmed tiering candidate"
                );
            }
        }

        stats.record_evicted(persisted as u64);
        stats.record_batch();
        stats.set_queue_depths(queues.evict.len(), queues.free.len());

        debug!(
            ns,
            persisted,
            evict_depth = queues.evict.len(),
            free_depth = queues.free.len(),
            "tiering batch complete"
        );

        persisted
    }
}
