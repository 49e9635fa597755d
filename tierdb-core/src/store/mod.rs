//! Store abstractions
//!
//! The tiering pipeline is written against two traits: [`PrimaryStore`]
//! (the in-memory working set, sampled and shrunk under pressure) and
//! [`ColdStore`] (the batch-persisted cold tier). [`MemoryStore`] is the
//! in-process primary implementation.

pub mod memory;

pub use memory::MemoryStore;

use crate::eviction::FrequencyCounter;
use serde::{Deserialize, Serialize};

/// Identifier of an isolated key namespace (a database).
pub type NamespaceId = u32;

/// Where a record's payload currently lives in the tier hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// Payload is only in primary memory.
    Resident,
    /// Payload handed to a tiering batch, persistence not yet confirmed.
    Flushing,
    /// Payload confirmed durable in the cold store.
    Persisted,
}

/// Per-record metadata the eviction machinery reads and updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMeta {
    pub location: Location,
    /// Reduced LRU clock stamp of the last access.
    pub lru_stamp: u64,
    /// LFU state, meaningful under the LFU policy.
    pub freq: FrequencyCounter,
    /// Absolute expiry in Unix milliseconds, if the record is volatile.
    pub expires_at_ms: Option<u64>,
    /// Accounted memory footprint in bytes.
    pub size_bytes: usize,
    /// Rows held, for row-group records.
    pub row_count: u64,
}

/// The in-memory tier the pressure controller samples and shrinks.
pub trait PrimaryStore: Send + Sync {
    /// Draw up to `count` keys from the namespace, approximately uniformly.
    fn sample_keys(&self, ns: NamespaceId, count: usize) -> Vec<String>;

    /// Metadata of one record, if present.
    fn lookup(&self, ns: NamespaceId, key: &str) -> Option<RecordMeta>;

    /// The record's payload bytes, if present.
    fn payload(&self, ns: NamespaceId, key: &str) -> Option<Vec<u8>>;

    /// Remove a record, returning whether it existed.
    fn remove(&self, ns: NamespaceId, key: &str) -> bool;

    /// Bytes currently accounted against the memory ceiling.
    fn used_memory(&self) -> usize;

    /// Bytes that do not count toward eviction decisions (buffers and
    /// bookkeeping that shrinking the dataset cannot reclaim).
    fn not_counted_overhead(&self) -> usize;

    /// Write back an updated frequency counter.
    fn store_frequency(&self, ns: NamespaceId, key: &str, freq: FrequencyCounter);

    /// Move a record to a new tier location, returning whether it existed.
    fn mark_location(&self, ns: NamespaceId, key: &str, location: Location) -> bool;
}

/// The durable cold tier row groups are batch-persisted into.
pub trait ColdStore: Send + Sync {
    /// Persist `keys[i]` -> `payloads[i]` pairs, returning how many of the
    /// leading entries were durably written. A short count leaves the tail
    /// unconfirmed for the caller to retry.
    fn persist_batch(&self, ns: NamespaceId, keys: &[String], payloads: &[Vec<u8>]) -> usize;
}
