//! Tiering pipeline
//!
//! Memory pressure is relieved by moving cold row groups out of the primary
//! store: candidates are staged on a per-namespace EvictQueue, persisted to
//! the cold store in batches, staged on the FreeQueue once durable, and
//! finally removed from primary memory by the pressure controller.

pub mod batch;
pub mod lazyfree;
pub mod pressure;
pub mod queues;

pub use batch::BatchTieringEngine;
pub use lazyfree::LazyFreeWorker;
pub use pressure::MemoryPressureController;
pub use queues::{BoundedQueue, NamespaceQueues, QueueEntry};

/// Reclamation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TieringError {
    /// The configured policy (or an exhausted keyspace) forbids freeing
    /// memory. Transient backpressure; the triggering write is refused.
    #[error("eviction policy forbids reclaiming memory")]
    PolicyForbids,

    /// A FreeQueue entry turned out not to be durably persisted, or its
    /// removal failed. The reclamation pass aborts and the namespace's
    /// queues must not be trusted further.
    #[error("tiering consistency violation: {0}")]
    FatalConsistency(String),
}
