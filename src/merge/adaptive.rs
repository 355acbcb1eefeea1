use std::collections::HashMap;

use super::candidate::PartsRange;
use crate::{observability::log_trace, stats::TableBgTaskStats};

/// Parts of one partition that exist but cannot be selected in this pass
/// (already scheduled, locked elsewhere, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnselectableRows {
    /// Number of excluded parts.
    pub parts: u64,
    /// Rows held by the excluded parts.
    pub rows: u64,
}

/// Unselectable parts per partition id, supplied by the scheduler.
pub type UnselectablePartRows = HashMap<String, UnselectableRows>;

#[derive(Debug, Clone, Copy)]
struct PartitionEstimate {
    current_parts: u64,
    current_rows: u64,
    write_amplification: f64,
    real_time: bool,
}

/// Retunes the optimizing selector from past insert/merge statistics.
#[derive(Debug)]
pub(crate) struct AdaptiveController {
    expected_parts: u64,
    write_amplification_threshold: u64,
    estimates: HashMap<String, PartitionEstimate>,
}

/// Inputs of [`AdaptiveController::init`] that come from settings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ControllerTargets {
    pub(crate) expected_parts: u64,
    pub(crate) write_amplification_threshold: u64,
    pub(crate) real_time_window: u64,
}

impl AdaptiveController {
    /// Estimate every partition in play. Returns `None` without a part target
    /// or when none of the partitions has statistics yet.
    pub(crate) fn init(
        stats: &TableBgTaskStats,
        ranges: &[PartsRange],
        unselectable: &UnselectablePartRows,
        targets: ControllerTargets,
        now: u64,
    ) -> Option<Self> {
        if targets.expected_parts == 0 {
            return None;
        }
        let mut in_play: HashMap<&str, (u64, u64)> = HashMap::new();
        for range in ranges {
            let (parts, rows) = in_play.entry(range.partition_id.as_str()).or_default();
            *parts += range.parts.len() as u64;
            *rows = range
                .parts
                .iter()
                .fold(*rows, |acc, part| acc.saturating_add(part.rows));
        }

        let mut estimates = HashMap::with_capacity(in_play.len());
        for (partition, (parts, rows)) in in_play {
            let Some(history) = stats.partition(partition) else {
                continue;
            };
            let excluded = unselectable.get(partition).copied().unwrap_or_default();
            let estimate = PartitionEstimate {
                current_parts: parts.saturating_add(excluded.parts),
                current_rows: rows.saturating_add(excluded.rows),
                write_amplification: history.write_amplification().unwrap_or(0.0),
                real_time: history.inserted_within(now, targets.real_time_window),
            };
            log_trace!(
                component = "adaptive",
                event = "partition_estimate",
                partition = partition,
                current_parts = estimate.current_parts,
                current_rows = estimate.current_rows,
                write_amplification = estimate.write_amplification,
                real_time = estimate.real_time,
            );
            estimates.insert(partition.to_owned(), estimate);
        }

        if estimates.is_empty() {
            return None;
        }
        Some(Self {
            expected_parts: targets.expected_parts,
            write_amplification_threshold: targets.write_amplification_threshold,
            estimates,
        })
    }

    /// A partition under continuous insert load that already rewrites too much
    /// and is at or below its part target should merge wider, less often.
    pub(crate) fn need_optimize_write_amplification(&self, partition: &str) -> bool {
        self.estimates.get(partition).is_some_and(|estimate| {
            estimate.real_time
                && estimate.write_amplification >= self.write_amplification_threshold as f64
                && estimate.current_parts <= self.expected_parts
        })
    }

    /// Urgency of a partition, at least 1; grows with parts above target.
    pub(crate) fn priority(&self, partition: &str) -> f64 {
        self.estimates.get(partition).map_or(1.0, |estimate| {
            (estimate.current_parts as f64 / self.expected_parts as f64).max(1.0)
        })
    }

    #[cfg(test)]
    pub(crate) fn partitions(&self) -> usize {
        self.estimates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{id::TableId, merge::selector::tests::candidate};

    const NOW: u64 = 100_000;

    fn targets(expected_parts: u64) -> ControllerTargets {
        ControllerTargets {
            expected_parts,
            write_amplification_threshold: 4,
            real_time_window: 3600,
        }
    }

    fn ranges(partition: &str, parts: usize) -> Vec<PartsRange> {
        vec![PartsRange {
            partition_id: partition.to_owned(),
            parts: (0..parts as u64).map(|b| candidate(b, 10)).collect(),
        }]
    }

    #[test]
    fn no_statistics_means_no_controller() {
        let stats = TableBgTaskStats::new(TableId::new());
        let controller = AdaptiveController::init(
            &stats,
            &ranges("p", 3),
            &UnselectablePartRows::new(),
            targets(2),
            NOW,
        );
        assert!(controller.is_none());
    }

    #[test]
    fn statistics_of_other_partitions_are_ignored() {
        let stats = TableBgTaskStats::new(TableId::new());
        stats.record_insert("other", 1, 10, NOW);
        let controller = AdaptiveController::init(
            &stats,
            &ranges("p", 3),
            &UnselectablePartRows::new(),
            targets(2),
            NOW,
        );
        assert!(controller.is_none());
    }

    #[test]
    fn zero_target_means_no_controller() {
        let stats = TableBgTaskStats::new(TableId::new());
        stats.record_insert("p", 1, 10, NOW);
        let controller = AdaptiveController::init(
            &stats,
            &ranges("p", 3),
            &UnselectablePartRows::new(),
            targets(0),
            NOW,
        );
        assert!(controller.is_none());
    }

    #[test]
    fn priority_counts_unselectable_parts() {
        let stats = TableBgTaskStats::new(TableId::new());
        stats.record_insert("p", 4, 40, NOW);
        let mut unselectable = UnselectablePartRows::new();
        unselectable.insert(
            "p".to_owned(),
            UnselectableRows {
                parts: 5,
                rows: 50,
            },
        );
        let controller =
            AdaptiveController::init(&stats, &ranges("p", 3), &unselectable, targets(2), NOW)
                .unwrap();
        assert_eq!(controller.partitions(), 1);
        assert_eq!(controller.priority("p"), 4.0);
        assert_eq!(controller.priority("unknown"), 1.0);
    }

    #[test]
    fn write_amplification_needs_recent_inserts_and_headroom() {
        let stats = TableBgTaskStats::new(TableId::new());
        stats.record_insert("p", 10, 100, NOW - 60);
        stats.record_merge("p", 10, 500, NOW - 30);
        let unselectable = UnselectablePartRows::new();

        let controller =
            AdaptiveController::init(&stats, &ranges("p", 3), &unselectable, targets(4), NOW)
                .unwrap();
        assert!(controller.need_optimize_write_amplification("p"));

        let crowded =
            AdaptiveController::init(&stats, &ranges("p", 6), &unselectable, targets(4), NOW)
                .unwrap();
        assert!(!crowded.need_optimize_write_amplification("p"));

        let idle = AdaptiveController::init(
            &stats,
            &ranges("p", 3),
            &unselectable,
            targets(4),
            NOW + 7200,
        )
        .unwrap();
        assert!(!idle.need_optimize_write_amplification("p"));
    }
}
