//! Per-namespace tiering queues
//!
//! Candidates flow EvictQueue -> batch persistence -> FreeQueue -> removal.
//! Both are bounded FIFO queues; the EvictQueue additionally supports
//! score-ordered extraction so batches take the best candidates first while
//! preserving arrival order among the rest.

use crate::config::TieringConfig;
use std::collections::VecDeque;

/// A staged candidate: canonical key plus the score it was staged with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub key: String,
    pub score: u64,
}

/// A bounded FIFO queue of staged candidates.
#[derive(Debug)]
pub struct BoundedQueue {
    entries: VecDeque<QueueEntry>,
    capacity: usize,
}

impl BoundedQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Append an entry, returning `false` when the queue is full.
    pub fn enqueue(&mut self, entry: QueueEntry) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    /// Pop the oldest entry.
    pub fn dequeue(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Remove and return the highest-scoring entry; on ties the oldest
    /// wins. Relative order of the remaining entries is preserved.
    pub fn take_best(&mut self) -> Option<QueueEntry> {
        let best = self
            .entries
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.score.cmp(&b.score).then(ib.cmp(ia)))?
            .0;
        self.entries.remove(best)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }
}

/// One namespace's pair of tiering queues.
#[derive(Debug)]
pub struct NamespaceQueues {
    pub evict: BoundedQueue,
    pub free: BoundedQueue,
}

impl NamespaceQueues {
    pub fn new(config: &TieringConfig) -> Self {
        Self {
            evict: BoundedQueue::new(config.evict_queue_cap),
            free: BoundedQueue::new(config.free_queue_cap),
        }
    }
}
