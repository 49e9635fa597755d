//! Relational model: keys, partition metadata and filters
//!
//! A table is split into partitions by its partition columns; each partition
//! holds numerically ordered row groups addressed through the key grammar in
//! [`key`]. Partition filters ([`filter`]) prune partitions during scans and
//! scope eviction candidate selection.

pub mod filter;
pub mod key;

pub use filter::{Condition, FilterError, Literal, PartitionValues};
pub use key::{
    CellAddr, KeyError, PartitionDescriptor, RelationalKey, DATA_KEY_PREFIX, META_KEY_PREFIX,
    ROW_GROUP_MIN,
};

use serde::{Deserialize, Serialize};

/// Row counts are stored in a signed field by downstream consumers, so cap
/// them below `i64::MAX`.
const ROW_COUNT_MAX: u64 = (1 << 63) - 1;

/// Per-partition row-group bookkeeping kept under the metadata key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowGroupParameter {
    /// Canonical key of the row group this parameter describes.
    pub handle: String,
    /// Whether the row group currently lives in the cold store.
    pub is_in_cold_store: bool,
    /// Rows accumulated in this row group.
    pub row_count: u64,
}

impl RowGroupParameter {
    pub fn new(handle: String, row_count: u64) -> Result<Self, KeyError> {
        if row_count > ROW_COUNT_MAX {
            return Err(KeyError::Malformed(format!(
                "row count {} exceeds maximum",
                row_count
            )));
        }
        Ok(Self {
            handle,
            is_in_cold_store: false,
            row_count,
        })
    }
}

/// Project a partition descriptor into the column values a filter evaluates.
///
/// Descriptors with an even number of values are read as `(columnId, value)`
/// pairs. An odd count means the descriptor carries bare values, which get
/// positional column names `"0"`, `"1"`, ... instead. Values that parse as
/// `i64` become integer literals, everything else stays a string.
pub fn partition_values(descriptor: &PartitionDescriptor) -> PartitionValues {
    let values = descriptor.values();
    let mut out = PartitionValues::new();

    if values.len() % 2 == 0 {
        for pair in values.chunks(2) {
            out.insert(pair[0].clone(), to_literal(&pair[1]));
        }
    } else {
        for (idx, value) in values.iter().enumerate() {
            out.insert(idx.to_string(), to_literal(value));
        }
    }

    out
}

fn to_literal(value: &str) -> Literal {
    match value.parse::<i64>() {
        Ok(i) => Literal::Int(i),
        Err(_) => Literal::Str(value.to_string()),
    }
}
