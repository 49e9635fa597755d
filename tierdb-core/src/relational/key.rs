//! Relational key codec
//!
//! The canonical string form of a relational key is the primary-store lookup
//! key and the one bit-exact contract this crate shares with scan and filter
//! components:
//!
//! ```text
//! D:{<tableId>:<partitionDescriptor>}[:<rowGroupId>[:<rowId>:<columnId>]]
//! ```
//!
//! Row-group metadata (current row-group id, row counts) lives under the
//! partition's metadata key `M:{<tableId>:<partitionDescriptor>}`. Encoding
//! is bijective with parsing, and row-group ids are numerically ordered
//! within a table+partition so neighbours can be derived without a scan.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of data keys (row groups and cells).
pub const DATA_KEY_PREFIX: &str = "D:";

/// Prefix of partition metadata keys.
pub const META_KEY_PREFIX: &str = "M:";

/// Smallest valid row-group id within a partition.
pub const ROW_GROUP_MIN: u32 = 1;

/// Relational key grammar violations. Caller errors, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("malformed relational key: {0}")]
    Malformed(String),
}

/// Ordered column values identifying one partition of a table.
///
/// Values are opaque to the codec except that they must be non-empty and
/// must not contain the structural characters `:`, `{` or `}`; this keeps
/// encoding bijective with parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionDescriptor(Vec<String>);

impl PartitionDescriptor {
    /// Build a descriptor, rejecting values that would break the grammar.
    pub fn new(values: Vec<String>) -> Result<Self, KeyError> {
        if values.is_empty() {
            return Err(KeyError::Malformed(
                "partition descriptor cannot be empty".to_string(),
            ));
        }
        for value in &values {
            Self::check_value(value)?;
        }
        Ok(Self(values))
    }

    fn check_value(value: &str) -> Result<(), KeyError> {
        if value.is_empty() {
            return Err(KeyError::Malformed(
                "empty partition column value".to_string(),
            ));
        }
        if value.contains([':', '{', '}']) {
            return Err(KeyError::Malformed(format!(
                "partition column value '{}' contains a reserved character",
                value
            )));
        }
        Ok(())
    }

    /// The ordered column values.
    pub fn values(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for PartitionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(":"))
    }
}

/// Row and column address of a single data cell inside a row group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAddr {
    pub row_id: u64,
    pub column_id: u32,
}

/// A parsed relational key: table, partition, and optionally a row group
/// and a cell within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationalKey {
    table_id: u64,
    partition: PartitionDescriptor,
    row_group_id: Option<u32>,
    cell: Option<CellAddr>,
}

impl RelationalKey {
    /// Key addressing a table+partition without a row group.
    pub fn partition_root(table_id: u64, partition: PartitionDescriptor) -> Self {
        Self {
            table_id,
            partition,
            row_group_id: None,
            cell: None,
        }
    }

    /// Key addressing one row group of a partition.
    pub fn row_group(
        table_id: u64,
        partition: PartitionDescriptor,
        row_group_id: u32,
    ) -> Result<Self, KeyError> {
        if row_group_id < ROW_GROUP_MIN {
            return Err(KeyError::Malformed(format!(
                "row-group id {} below minimum {}",
                row_group_id, ROW_GROUP_MIN
            )));
        }
        Ok(Self {
            table_id,
            partition,
            row_group_id: Some(row_group_id),
            cell: None,
        })
    }

    /// Key addressing one data cell.
    pub fn cell(
        table_id: u64,
        partition: PartitionDescriptor,
        row_group_id: u32,
        cell: CellAddr,
    ) -> Result<Self, KeyError> {
        let mut key = Self::row_group(table_id, partition, row_group_id)?;
        key.cell = Some(cell);
        Ok(key)
    }

    pub fn table_id(&self) -> u64 {
        self.table_id
    }

    pub fn partition(&self) -> &PartitionDescriptor {
        &self.partition
    }

    pub fn row_group_id(&self) -> Option<u32> {
        self.row_group_id
    }

    pub fn cell_addr(&self) -> Option<CellAddr> {
        self.cell
    }

    /// Canonical string form. `parse(encode(k)) == k` for every valid key.
    pub fn encode(&self) -> String {
        let mut out = format!("{}{{{}:{}}}", DATA_KEY_PREFIX, self.table_id, self.partition);
        if let Some(rg) = self.row_group_id {
            out.push(':');
            out.push_str(&rg.to_string());
            if let Some(cell) = self.cell {
                out.push(':');
                out.push_str(&cell.row_id.to_string());
                out.push(':');
                out.push_str(&cell.column_id.to_string());
            }
        }
        out
    }

    /// The partition metadata key, `M:{t:p}`, for whatever this key
    /// addresses.
    pub fn metadata_key(&self) -> String {
        format!("{}{{{}:{}}}", META_KEY_PREFIX, self.table_id, self.partition)
    }

    /// Data cell key for `(row, column)` within this key's row group.
    pub fn data_cell_key(&self, row_id: u64, column_id: u32) -> Result<String, KeyError> {
        let rg = self.row_group_id.ok_or_else(|| {
            KeyError::Malformed("cell key requires a row-group id".to_string())
        })?;
        Ok(format!(
            "{}{{{}:{}}}:{}:{}:{}",
            DATA_KEY_PREFIX, self.table_id, self.partition, rg, row_id, column_id
        ))
    }

    /// Key of the first row group in this partition.
    pub fn first_entry_key(&self) -> String {
        format!(
            "{}{{{}:{}}}:{}",
            DATA_KEY_PREFIX, self.table_id, self.partition, ROW_GROUP_MIN
        )
    }

    /// Key of the previous row group, or `None` at the minimum.
    pub fn prev_entry_key(&self) -> Option<String> {
        let rg = self.row_group_id?;
        if rg <= ROW_GROUP_MIN {
            return None;
        }
        Some(format!(
            "{}{{{}:{}}}:{}",
            DATA_KEY_PREFIX,
            self.table_id,
            self.partition,
            rg - 1
        ))
    }

    /// The same key moved to the next row group.
    pub fn next_row_group(&self) -> Result<Self, KeyError> {
        let rg = self.row_group_id.ok_or_else(|| {
            KeyError::Malformed("key has no row-group id to advance".to_string())
        })?;
        self.with_row_group(i64::from(rg) + 1)
    }

    /// Re-target the key at `new_id`. Negative ids are malformed.
    pub fn with_row_group(&self, new_id: i64) -> Result<Self, KeyError> {
        if new_id < 0 {
            return Err(KeyError::Malformed(format!(
                "negative row-group id {}",
                new_id
            )));
        }
        if new_id < i64::from(ROW_GROUP_MIN) {
            return Err(KeyError::Malformed(format!(
                "row-group id {} below minimum {}",
                new_id, ROW_GROUP_MIN
            )));
        }
        Ok(Self {
            table_id: self.table_id,
            partition: self.partition.clone(),
            row_group_id: Some(new_id as u32),
            cell: None,
        })
    }

    /// Parse a canonical data key string.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let rest = key
            .strip_prefix(DATA_KEY_PREFIX)
            .ok_or_else(|| KeyError::Malformed(format!("missing data prefix: '{}'", key)))?;
        let (table_id, partition, suffix) = Self::parse_braced(rest)?;

        let (row_group_id, cell) = match suffix {
            "" => (None, None),
            s => {
                let s = s.strip_prefix(':').ok_or_else(|| {
                    KeyError::Malformed(format!("garbage after partition brace: '{}'", key))
                })?;
                let parts: Vec<&str> = s.split(':').collect();
                match parts.as_slice() {
                    [rg] => (Some(Self::parse_row_group(rg)?), None),
                    [rg, row, col] => {
                        let rg = Self::parse_row_group(rg)?;
                        let row_id = row.parse::<u64>().map_err(|_| {
                            KeyError::Malformed(format!("bad row id '{}'", row))
                        })?;
                        let column_id = col.parse::<u32>().map_err(|_| {
                            KeyError::Malformed(format!("bad column id '{}'", col))
                        })?;
                        (Some(rg), Some(CellAddr { row_id, column_id }))
                    }
                    _ => {
                        return Err(KeyError::Malformed(format!(
                            "unexpected key suffix ':{}'",
                            s
                        )))
                    }
                }
            }
        };

        Ok(Self {
            table_id,
            partition,
            row_group_id,
            cell,
        })
    }

    /// Parse a partition metadata key (`M:{t:p}`) into its partition root.
    pub fn parse_meta(key: &str) -> Result<Self, KeyError> {
        let rest = key
            .strip_prefix(META_KEY_PREFIX)
            .ok_or_else(|| KeyError::Malformed(format!("missing meta prefix: '{}'", key)))?;
        let (table_id, partition, suffix) = Self::parse_braced(rest)?;
        if !suffix.is_empty() {
            return Err(KeyError::Malformed(format!(
                "metadata key has trailing data: '{}'",
                key
            )));
        }
        Ok(Self::partition_root(table_id, partition))
    }

    fn parse_row_group(s: &str) -> Result<u32, KeyError> {
        let rg = s
            .parse::<u32>()
            .map_err(|_| KeyError::Malformed(format!("bad row-group id '{}'", s)))?;
        if rg < ROW_GROUP_MIN {
            return Err(KeyError::Malformed(format!(
                "row-group id {} below minimum {}",
                rg, ROW_GROUP_MIN
            )));
        }
        Ok(rg)
    }

    /// Split `{tableId:partition}suffix`, validating the brace structure.
    fn parse_braced(rest: &str) -> Result<(u64, PartitionDescriptor, &str), KeyError> {
        let inner = rest
            .strip_prefix('{')
            .ok_or_else(|| KeyError::Malformed(format!("expected '{{' in '{}'", rest)))?;
        let close = inner
            .find('}')
            .ok_or_else(|| KeyError::Malformed(format!("unclosed brace in '{}'", rest)))?;
        let (body, suffix) = inner.split_at(close);
        let suffix = &suffix[1..]; // skip '}'

        if body.contains('{') {
            return Err(KeyError::Malformed(format!("nested brace in '{}'", rest)));
        }

        let mut segments = body.split(':');
        let table_str = segments
            .next()
            .ok_or_else(|| KeyError::Malformed("empty key body".to_string()))?;
        let table_id = table_str
            .parse::<u64>()
            .map_err(|_| KeyError::Malformed(format!("bad table id '{}'", table_str)))?;

        let values: Vec<String> = segments.map(str::to_string).collect();
        let partition = PartitionDescriptor::new(values)?;

        Ok((table_id, partition, suffix))
    }
}

impl fmt::Display for RelationalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(values: &[&str]) -> PartitionDescriptor {
        PartitionDescriptor::new(values.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_encode_partition_root() {
        let key = RelationalKey::partition_root(3, descriptor(&["1", "2"]));
        assert_eq!(key.encode(), "D:{3:1:2}");
        assert_eq!(key.metadata_key(), "M:{3:1:2}");
    }

    #[test]
    fn test_encode_row_group_and_cell() {
        let key = RelationalKey::row_group(3, descriptor(&["1", "2"]), 4).unwrap();
        assert_eq!(key.encode(), "D:{3:1:2}:4");
        assert_eq!(key.data_cell_key(10, 7).unwrap(), "D:{3:1:2}:4:10:7");

        let cell = RelationalKey::cell(
            3,
            descriptor(&["1", "2"]),
            4,
            CellAddr {
                row_id: 10,
                column_id: 7,
            },
        )
        .unwrap();
        assert_eq!(cell.encode(), "D:{3:1:2}:4:10:7");
    }

    #[test]
    fn test_parse_round_trip() {
        for input in ["D:{3:1:2}", "D:{3:1:2}:4", "D:{3:1:2}:4:10:7"] {
            let key = RelationalKey::parse(input).unwrap();
            assert_eq!(key.encode(), input);
        }
    }

    #[test]
    fn test_parse_meta_key() {
        let key = RelationalKey::parse_meta("M:{3:1:2}").unwrap();
        assert_eq!(key.table_id(), 3);
        assert_eq!(key.row_group_id(), None);
        assert!(RelationalKey::parse_meta("M:{3:1:2}:4").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_grammar() {
        for input in [
            "3:1:2",          // no prefix
            "D:3:1:2",        // no braces
            "D:{3:1:2",       // unclosed brace
            "D:{3}",          // no partition values
            "D:{x:1}",        // non-numeric table id
            "D:{3:1:2}:0",    // row group below minimum
            "D:{3:1:2}:4:10", // cell needs row and column
            "D:{3:1:2}4",     // garbage after brace
            "D:{3:1:2}:a",    // non-numeric row group
        ] {
            assert!(RelationalKey::parse(input).is_err(), "accepted: {}", input);
        }
    }

    #[test]
    fn test_neighbor_traversal() {
        let key = RelationalKey::row_group(3, descriptor(&["1", "2"]), 4).unwrap();
        assert_eq!(key.first_entry_key(), "D:{3:1:2}:1");
        assert_eq!(key.prev_entry_key().unwrap(), "D:{3:1:2}:3");
        assert_eq!(key.next_row_group().unwrap().encode(), "D:{3:1:2}:5");

        let first = RelationalKey::row_group(3, descriptor(&["1", "2"]), ROW_GROUP_MIN).unwrap();
        assert_eq!(first.prev_entry_key(), None);
    }

    #[test]
    fn test_with_row_group_rejects_negative() {
        let key = RelationalKey::row_group(3, descriptor(&["1"]), 4).unwrap();
        assert!(matches!(
            key.with_row_group(-1),
            Err(KeyError::Malformed(_))
        ));
        assert_eq!(key.with_row_group(9).unwrap().encode(), "D:{3:1}:9");
    }

    #[test]
    fn test_descriptor_rejects_reserved_characters() {
        assert!(PartitionDescriptor::new(vec!["a:b".to_string()]).is_err());
        assert!(PartitionDescriptor::new(vec!["".to_string()]).is_err());
        assert!(PartitionDescriptor::new(vec![]).is_err());
        assert!(PartitionDescriptor::new(vec!["a{".to_string()]).is_err());
    }
}
