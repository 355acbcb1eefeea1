//! Table descriptor and table-level merge tunables.

use crate::id::TableId;

/// Hash of a table's current `CLUSTER BY` definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterByHash(u64);

impl ClusterByHash {
    /// Wrap a definition hash.
    pub const fn new(hash: u64) -> Self {
        Self(hash)
    }

    /// Returns `true` if a part written under `part_hash` is clustered the way
    /// the table currently is.
    pub fn matches(&self, part_hash: u64) -> bool {
        self.0 == part_hash
    }
}

/// Merge selector variants a table can opt into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeSelectorStrategy {
    /// Greedy window scan against size/age thresholds.
    Simple,
    /// Wide search with base lowering and optional adaptive tuning.
    #[default]
    Dance,
}

/// Table-level merge tunables.
#[derive(Debug, Clone)]
pub struct MergeTreeSettings {
    pub(crate) merge_selector: MergeSelectorStrategy,
    pub(crate) select_nonadjacent_parts: bool,
    pub(crate) max_parts_to_merge: usize,
    pub(crate) max_parts_to_merge_at_once: usize,
    pub(crate) max_total_rows_to_merge: i64,
    pub(crate) expected_parts_number: i64,
    pub(crate) write_amplification_optimize_threshold: u64,
    pub(crate) merge_with_ttl_timeout: u64,
}

impl Default for MergeTreeSettings {
    fn default() -> Self {
        Self {
            merge_selector: MergeSelectorStrategy::Dance,
            select_nonadjacent_parts: false,
            max_parts_to_merge: 100,
            max_parts_to_merge_at_once: 100,
            max_total_rows_to_merge: 50_000_000,
            expected_parts_number: -1,
            write_amplification_optimize_threshold: 4,
            merge_with_ttl_timeout: 4 * 60 * 60,
        }
    }
}

impl MergeTreeSettings {
    /// Choose the merge selector variant.
    pub fn merge_selector(self, merge_selector: MergeSelectorStrategy) -> Self {
        MergeTreeSettings {
            merge_selector,
            ..self
        }
    }

    /// Group parts by schema/mutation lineage instead of strict adjacency.
    pub fn select_nonadjacent_parts(self, select_nonadjacent_parts: bool) -> Self {
        MergeTreeSettings {
            select_nonadjacent_parts,
            ..self
        }
    }

    /// Cap on the number of parts in one merge.
    pub fn max_parts_to_merge(self, max_parts_to_merge: usize) -> Self {
        MergeTreeSettings {
            max_parts_to_merge,
            ..self
        }
    }

    /// Engine-wide cap on parts merged at once; the smaller of both caps wins.
    pub fn max_parts_to_merge_at_once(self, max_parts_to_merge_at_once: usize) -> Self {
        MergeTreeSettings {
            max_parts_to_merge_at_once,
            ..self
        }
    }

    /// Cap on rows produced by one merge. Values ≤ 0 mean "no cap" unless the
    /// table has a unique key.
    pub fn max_total_rows_to_merge(self, max_total_rows_to_merge: i64) -> Self {
        MergeTreeSettings {
            max_total_rows_to_merge,
            ..self
        }
    }

    /// Target number of parts per partition for the adaptive controller.
    /// Negative disables the controller, 0 means "use the default worker count".
    pub fn expected_parts_number(self, expected_parts_number: i64) -> Self {
        MergeTreeSettings {
            expected_parts_number,
            ..self
        }
    }

    /// Write amplification above which the controller trades part count for
    /// fewer rewrites.
    pub fn write_amplification_optimize_threshold(
        self,
        write_amplification_optimize_threshold: u64,
    ) -> Self {
        MergeTreeSettings {
            write_amplification_optimize_threshold,
            ..self
        }
    }

    /// Age in seconds after which a lone version chain is collapsed; 0 disables.
    pub fn merge_with_ttl_timeout(self, merge_with_ttl_timeout: u64) -> Self {
        MergeTreeSettings {
            merge_with_ttl_timeout,
            ..self
        }
    }

    /// Effective parts-per-merge cap.
    pub(crate) fn max_parts_to_merge_base(&self) -> usize {
        self.max_parts_to_merge.min(self.max_parts_to_merge_at_once)
    }
}

/// What the planner needs to know about a table.
#[derive(Debug, Clone)]
pub struct MergeTreeTable {
    id: TableId,
    cluster_by: Option<ClusterByHash>,
    has_unique_key: bool,
    settings: MergeTreeSettings,
}

impl MergeTreeTable {
    /// Describe an unbucketed table without a unique key.
    pub fn new(id: TableId) -> Self {
        Self {
            id,
            cluster_by: None,
            has_unique_key: false,
            settings: MergeTreeSettings::default(),
        }
    }

    /// Mark the table as bucketed under the given clustering definition.
    pub fn cluster_by(self, hash: ClusterByHash) -> Self {
        Self {
            cluster_by: Some(hash),
            ..self
        }
    }

    /// Declare whether rows carry a uniqueness constraint.
    pub fn unique_key(self, has_unique_key: bool) -> Self {
        Self {
            has_unique_key,
            ..self
        }
    }

    /// Replace the table-level tunables.
    pub fn settings(self, settings: MergeTreeSettings) -> Self {
        Self { settings, ..self }
    }

    /// Table identity.
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Returns `true` for bucketed tables.
    pub fn is_bucket_table(&self) -> bool {
        self.cluster_by.is_some()
    }

    /// Current clustering definition, when bucketed.
    pub fn cluster_by_hash(&self) -> Option<ClusterByHash> {
        self.cluster_by
    }

    /// Returns `true` if rows carry a uniqueness constraint.
    pub fn has_unique_key(&self) -> bool {
        self.has_unique_key
    }

    /// Table-level tunables.
    pub fn merge_settings(&self) -> &MergeTreeSettings {
        &self.settings
    }
}
