//! Per-table background task statistics.
//!
//! Merge and insert executors record what they did here; merge selection only
//! reads. The registry is an ordinary value handed to the planner, so several
//! independent registries can coexist (one per test, one per server).

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::id::TableId;

/// Source of per-table statistics consulted by the adaptive controller.
pub trait BgTaskStatsProvider: Send + Sync {
    /// Statistics for `table`, creating an empty record on first access.
    ///
    /// Returns `None` when the provider does not track this table at all.
    fn get_or_create_table_stats(&self, table: TableId) -> Option<Arc<TableBgTaskStats>>;
}

/// In-process statistics registry keyed by table.
#[derive(Debug, Default)]
pub struct BgTaskStatsRegistry {
    tables: RwLock<HashMap<TableId, Arc<TableBgTaskStats>>>,
}

impl BgTaskStatsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the statistics of a table, e.g. after it was removed.
    pub fn remove_table(&self, table: TableId) -> Option<Arc<TableBgTaskStats>> {
        self.tables.write().remove(&table)
    }

    /// Number of tables with statistics.
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Returns `true` if no table has statistics yet.
    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

impl BgTaskStatsProvider for BgTaskStatsRegistry {
    fn get_or_create_table_stats(&self, table: TableId) -> Option<Arc<TableBgTaskStats>> {
        if let Some(stats) = self.tables.read().get(&table) {
            return Some(Arc::clone(stats));
        }
        let mut guard = self.tables.write();
        let stats = guard
            .entry(table)
            .or_insert_with(|| Arc::new(TableBgTaskStats::new(table)));
        Some(Arc::clone(stats))
    }
}

/// Cumulative insert/merge counters of one partition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartitionBgTaskStats {
    /// Parts produced by inserts.
    pub inserted_parts: u64,
    /// Bytes written by inserts.
    pub inserted_bytes: u64,
    /// Input parts consumed by merges.
    pub merged_parts: u64,
    /// Bytes written by merges.
    pub merged_bytes: u64,
    /// Unix second of the latest insert, 0 if none.
    pub last_insert_time: u64,
    /// Unix second of the latest merge, 0 if none.
    pub last_merge_time: u64,
}

impl PartitionBgTaskStats {
    /// Merge bytes written per inserted byte, if anything was inserted.
    pub fn write_amplification(&self) -> Option<f64> {
        if self.inserted_bytes == 0 {
            return None;
        }
        Some(self.merged_bytes as f64 / self.inserted_bytes as f64)
    }

    /// Returns `true` if an insert landed within `window` seconds before `now`.
    pub fn inserted_within(&self, now: u64, window: u64) -> bool {
        self.inserted_parts > 0 && now.saturating_sub(self.last_insert_time) <= window
    }
}

/// Statistics of one table, bucketed by partition.
#[derive(Debug)]
pub struct TableBgTaskStats {
    table: TableId,
    partitions: RwLock<HashMap<String, PartitionBgTaskStats>>,
}

impl TableBgTaskStats {
    /// Empty statistics for `table`.
    pub fn new(table: TableId) -> Self {
        Self {
            table,
            partitions: RwLock::new(HashMap::new()),
        }
    }

    /// Table these statistics belong to.
    pub fn table(&self) -> TableId {
        self.table
    }

    /// Record `parts` new parts totalling `bytes` inserted into `partition` at `now`.
    pub fn record_insert(&self, partition: &str, parts: u64, bytes: u64, now: u64) {
        let mut guard = self.partitions.write();
        let entry = guard.entry(partition.to_owned()).or_default();
        entry.inserted_parts = entry.inserted_parts.saturating_add(parts);
        entry.inserted_bytes = entry.inserted_bytes.saturating_add(bytes);
        entry.last_insert_time = entry.last_insert_time.max(now);
    }

    /// Record a merge of `parts` inputs that wrote `bytes` into `partition` at `now`.
    pub fn record_merge(&self, partition: &str, parts: u64, bytes: u64, now: u64) {
        let mut guard = self.partitions.write();
        let entry = guard.entry(partition.to_owned()).or_default();
        entry.merged_parts = entry.merged_parts.saturating_add(parts);
        entry.merged_bytes = entry.merged_bytes.saturating_add(bytes);
        entry.last_merge_time = entry.last_merge_time.max(now);
    }

    /// Counters of one partition.
    pub fn partition(&self, partition: &str) -> Option<PartitionBgTaskStats> {
        self.partitions.read().get(partition).copied()
    }

    /// Run `f` with a consistent view of all partitions.
    pub fn with_partitions<R>(
        &self,
        f: impl FnOnce(&HashMap<String, PartitionBgTaskStats>) -> R,
    ) -> R {
        let guard = self.partitions.read();
        f(&*guard)
    }

    /// Returns `true` until the first insert or merge is recorded.
    pub fn is_empty(&self) -> bool {
        self.partitions.read().is_empty()
    }
}
