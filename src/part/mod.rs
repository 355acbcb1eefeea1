//! Immutable data parts and the snapshot arena that links their versions.
//!
//! A part may supersede one logically-previous version of the same base part.
//! Versions live in a [`PartSnapshot`] arena and point backwards by
//! [`PartIdx`], so every chain is finite and acyclic by construction.

mod snapshot;

use std::{cmp::Ordering, fmt, sync::Arc};

use thiserror::Error;

pub use snapshot::{ChainSummary, PartSnapshot, PartSnapshotBuilder};

use crate::timestamp::TxnTimestamp;

/// Shared, immutable handle to a data part.
pub type PartHandle = Arc<DataPart>;

/// Position of a part inside a [`PartSnapshot`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartIdx(usize);

impl PartIdx {
    /// Raw arena slot.
    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

/// Errors raised while building or walking a part snapshot.
#[derive(Debug, Error)]
pub enum PartError {
    /// A part referenced a previous version that is not (yet) in the arena.
    #[error("part {part} references unknown previous version slot {previous}")]
    DanglingPrevious {
        /// Name of the offending part.
        part: String,
        /// Arena slot that was referenced.
        previous: usize,
    },
    /// A slot outside the arena was marked visible.
    #[error("part slot {0} is not present in the snapshot")]
    UnknownPart(usize),
    /// A version chain walk exceeded the number of parts in the arena.
    #[error("version chain of part {part} did not terminate within {limit} hops")]
    ChainOverflow {
        /// Name of the leaf part whose chain was walked.
        part: String,
        /// Maximum number of hops allowed.
        limit: usize,
    },
}

/// Logical placement of a part: partition plus block range and generation.
///
/// The derived ordering (partition, min block, max block, level, mutation) is
/// the canonical order used for naming merged parts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartInfo {
    /// Partition the part belongs to.
    pub partition_id: String,
    /// First block number covered by the part.
    pub min_block: u64,
    /// Last block number covered by the part.
    pub max_block: u64,
    /// Merge generation; freshly inserted parts have level 0.
    pub level: u32,
    /// Mutation version, 0 when the part was never mutated.
    pub mutation: u64,
}

impl PartInfo {
    /// Describe a part covering `[min_block, max_block]` in `partition_id`.
    pub fn new(partition_id: impl Into<String>, min_block: u64, max_block: u64, level: u32) -> Self {
        Self {
            partition_id: partition_id.into(),
            min_block,
            max_block,
            level,
            mutation: 0,
        }
    }

    /// Set the mutation version.
    pub fn with_mutation(self, mutation: u64) -> Self {
        Self { mutation, ..self }
    }
}

impl fmt::Display for PartInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.partition_id, self.min_block, self.max_block, self.level
        )?;
        if self.mutation > 0 {
            write!(f, "_{}", self.mutation)?;
        }
        Ok(())
    }
}

/// Immutable metadata of one stored part.
#[derive(Debug, Clone)]
pub struct DataPart {
    info: PartInfo,
    bytes: u64,
    rows: u64,
    commit_time: TxnTimestamp,
    columns_commit_time: TxnTimestamp,
    mutation_commit_time: TxnTimestamp,
    bucket_number: i64,
    table_definition_hash: u64,
    previous: Option<PartIdx>,
}

impl DataPart {
    /// Create a part with zero size, no bucket and no previous version.
    pub fn new(info: PartInfo) -> Self {
        Self {
            info,
            bytes: 0,
            rows: 0,
            commit_time: TxnTimestamp::MIN,
            columns_commit_time: TxnTimestamp::MIN,
            mutation_commit_time: TxnTimestamp::MIN,
            bucket_number: -1,
            table_definition_hash: 0,
            previous: None,
        }
    }

    /// Set the on-disk size in bytes.
    pub fn with_bytes(self, bytes: u64) -> Self {
        Self { bytes, ..self }
    }

    /// Set the row count.
    pub fn with_rows(self, rows: u64) -> Self {
        Self { rows, ..self }
    }

    /// Set the commit timestamp.
    pub fn with_commit_time(self, commit_time: TxnTimestamp) -> Self {
        Self {
            commit_time,
            ..self
        }
    }

    /// Set the commit time of the column schema the part was written with.
    pub fn with_columns_commit_time(self, columns_commit_time: TxnTimestamp) -> Self {
        Self {
            columns_commit_time,
            ..self
        }
    }

    /// Set the commit time of the last mutation applied to the part.
    pub fn with_mutation_commit_time(self, mutation_commit_time: TxnTimestamp) -> Self {
        Self {
            mutation_commit_time,
            ..self
        }
    }

    /// Place the part in a cluster bucket, tagged with the clustering definition hash.
    pub fn with_bucket(self, bucket_number: i64, table_definition_hash: u64) -> Self {
        Self {
            bucket_number,
            table_definition_hash,
            ..self
        }
    }

    /// Placement of the part.
    pub fn info(&self) -> &PartInfo {
        &self.info
    }

    /// Partition the part belongs to.
    pub fn partition_id(&self) -> &str {
        &self.info.partition_id
    }

    /// Human-readable part name.
    pub fn name(&self) -> String {
        self.info.to_string()
    }

    /// On-disk size of this version alone.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Row count of this version.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Commit timestamp of this version.
    pub fn commit_time(&self) -> TxnTimestamp {
        self.commit_time
    }

    /// Commit time of the column schema.
    pub fn columns_commit_time(&self) -> TxnTimestamp {
        self.columns_commit_time
    }

    /// Commit time of the latest applied mutation.
    pub fn mutation_commit_time(&self) -> TxnTimestamp {
        self.mutation_commit_time
    }

    /// Cluster bucket number, `-1` for unbucketed parts.
    pub fn bucket_number(&self) -> i64 {
        self.bucket_number
    }

    /// Hash of the clustering definition the part was written under.
    pub fn table_definition_hash(&self) -> u64 {
        self.table_definition_hash
    }

    /// Arena slot of the version this part supersedes.
    pub fn previous(&self) -> Option<PartIdx> {
        self.previous
    }
}

/// Canonical part order: placement first, commit time as tie-breaker.
pub fn canonical_order(lhs: &DataPart, rhs: &DataPart) -> Ordering {
    lhs.info
        .cmp(&rhs.info)
        .then_with(|| lhs.commit_time.cmp(&rhs.commit_time))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_name_includes_mutation_only_when_set() {
        let info = PartInfo::new("20240101", 1, 5, 2);
        assert_eq!(info.to_string(), "20240101_1_5_2");
        assert_eq!(info.with_mutation(9).to_string(), "20240101_1_5_2_9");
    }

    #[test]
    fn canonical_order_sorts_by_partition_then_blocks() {
        let mut parts = vec![
            DataPart::new(PartInfo::new("b", 1, 1, 0)),
            DataPart::new(PartInfo::new("a", 3, 4, 0)),
            DataPart::new(PartInfo::new("a", 1, 2, 1)),
            DataPart::new(PartInfo::new("a", 1, 2, 0)),
        ];
        parts.sort_by(canonical_order);
        let names: Vec<_> = parts.iter().map(DataPart::name).collect();
        assert_eq!(names, vec!["a_1_2_0", "a_1_2_1", "a_3_4_0", "b_1_1_0"]);
    }

    #[test]
    fn commit_time_breaks_ties() {
        let older = DataPart::new(PartInfo::new("a", 1, 1, 0))
            .with_commit_time(TxnTimestamp::from_unix_secs(10));
        let newer = DataPart::new(PartInfo::new("a", 1, 1, 0))
            .with_commit_time(TxnTimestamp::from_unix_secs(20));
        assert_eq!(canonical_order(&older, &newer), Ordering::Less);
    }
}
