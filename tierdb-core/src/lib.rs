//! TierDB core engine
//!
//! A key-value store core extended with a relational, columnar data model:
//! tables are partitioned by column values and stored as row groups that
//! migrate to a cold store under memory pressure.
//!
//! Components:
//! - **Relational model** ([`relational`]): the key grammar shared by scan
//!   and tiering paths, row-group metadata, and partition filter conditions.
//! - **Eviction** ([`eviction`]): policies, the sampled eviction pool, and
//!   probabilistic frequency estimation.
//! - **Tiering** ([`tiering`]): per-namespace evict/free queues, the batch
//!   tiering engine, lazy-free worker, and the memory pressure controller.
//! - **Stores** ([`store`]): the in-memory primary tier and the cold-store
//!   trait boundary.

pub mod clock;
pub mod config;
pub mod eviction;
pub mod relational;
pub mod stats;
pub mod store;
pub mod tiering;

pub use clock::LruClock;
pub use config::TieringConfig;
pub use eviction::{EvictionPolicy, EvictionPool, FrequencyCounter, FrequencyEstimator};
pub use relational::{Condition, PartitionDescriptor, RelationalKey};
pub use stats::TieringStats;
pub use store::{ColdStore, Location, MemoryStore, NamespaceId, PrimaryStore, RecordMeta};
pub use tiering::{BatchTieringEngine, MemoryPressureController, TieringError};
