use std::{collections::BTreeMap, mem, sync::Arc};

use super::error::PlanError;
use crate::part::{PartHandle, PartSnapshot};

/// Pairwise merge eligibility supplied by the scheduler.
///
/// `prev` is `None` when `part` would open a new range; the oracle must then
/// decide whether `part` may take part in any merge at all (quorum inserts,
/// parts already scheduled, locks held elsewhere).
pub trait MergePredicate {
    /// Returns `true` if `part` may follow `prev` in one merge.
    fn can_merge(&mut self, prev: Option<&PartHandle>, part: &PartHandle) -> bool;
}

impl<F> MergePredicate for F
where
    F: FnMut(Option<&PartHandle>, &PartHandle) -> bool,
{
    fn can_merge(&mut self, prev: Option<&PartHandle>, part: &PartHandle) -> bool {
        self(prev, part)
    }
}

/// Pin a closure to the [`MergePredicate`] signature.
///
/// ```
/// use mergetree_select::merge::merge_predicate;
///
/// let predicate = merge_predicate(|_prev, part| part.rows() > 0);
/// # let _ = predicate;
/// ```
pub fn merge_predicate<F>(predicate: F) -> F
where
    F: FnMut(Option<&PartHandle>, &PartHandle) -> bool,
{
    predicate
}

/// Predicate that accepts every part and every pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysMergeable;

impl MergePredicate for AlwaysMergeable {
    fn can_merge(&mut self, _prev: Option<&PartHandle>, _part: &PartHandle) -> bool {
        true
    }
}

/// Per-part metrics handed to selectors, rebuilt every pass.
#[derive(Debug, Clone)]
pub(crate) struct CandidatePart {
    /// Bytes of the part plus every previous version in its chain.
    pub(crate) size: u64,
    pub(crate) rows: u64,
    /// Seconds since the chain's base version was committed.
    pub(crate) age: u64,
    pub(crate) level: u32,
    pub(crate) chain_depth: u32,
    pub(crate) shall_participate_in_merges: bool,
    pub(crate) part: PartHandle,
}

impl CandidatePart {
    /// Number of physical versions the part stands for.
    pub(crate) fn versions(&self) -> u64 {
        1 + u64::from(self.chain_depth)
    }
}

/// Ordered, non-empty run of pairwise mergeable parts of one partition.
#[derive(Debug, Clone)]
pub(crate) struct PartsRange {
    pub(crate) partition_id: String,
    pub(crate) parts: Vec<CandidatePart>,
}

/// Output of range construction for all groups of a pass.
#[derive(Debug, Default)]
pub(crate) struct CandidateRanges {
    pub(crate) ranges: Vec<PartsRange>,
    /// Parts accepted into any range.
    pub(crate) parts_considered: usize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RangeBuilderOptions {
    /// Group by schema/mutation lineage instead of strict adjacency.
    pub(crate) nonadjacent: bool,
    /// Strict-mode cap on range length.
    pub(crate) max_parts_to_break: usize,
    /// Unix second used as "now" for part ages.
    pub(crate) now: u64,
}

/// Single-pass interval construction over bucket groups.
pub(crate) struct CandidateRangeBuilder<'a> {
    snapshot: &'a PartSnapshot,
    options: RangeBuilderOptions,
    ranges: Vec<PartsRange>,
    open: Vec<CandidatePart>,
    parts_considered: usize,
}

impl<'a> CandidateRangeBuilder<'a> {
    pub(crate) fn new(snapshot: &'a PartSnapshot, options: RangeBuilderOptions) -> Self {
        Self {
            snapshot,
            options,
            ranges: Vec::new(),
            open: Vec::new(),
            parts_considered: 0,
        }
    }

    /// Cut one bucket group (ordered by partition) into ranges.
    pub(crate) fn add_group<P>(
        &mut self,
        parts: Vec<PartHandle>,
        predicate: &mut P,
    ) -> Result<(), PlanError>
    where
        P: MergePredicate + ?Sized,
    {
        if self.options.nonadjacent {
            for sequence in group_by_lineage(parts) {
                self.scan(&sequence, predicate)?;
            }
            Ok(())
        } else {
            self.scan(&parts, predicate)
        }
    }

    pub(crate) fn finish(mut self) -> CandidateRanges {
        self.close_range();
        CandidateRanges {
            ranges: self.ranges,
            parts_considered: self.parts_considered,
        }
    }

    fn scan<P>(&mut self, sequence: &[PartHandle], predicate: &mut P) -> Result<(), PlanError>
    where
        P: MergePredicate + ?Sized,
    {
        let mut prev_partition: Option<&str> = None;
        // Previous accepted part, only within the current partition frame.
        let mut prev_part: Option<&PartHandle> = None;

        for part in sequence {
            let split_by_length =
                !self.options.nonadjacent && self.open.len() >= self.options.max_parts_to_break;
            if prev_partition != Some(part.partition_id()) || split_by_length {
                self.close_range();
                prev_partition = Some(part.partition_id());
                prev_part = None;
            }

            match prev_part {
                None => {
                    if !predicate.can_merge(None, part) {
                        continue;
                    }
                    self.close_range();
                }
                Some(prev) => {
                    if !predicate.can_merge(Some(prev), part) {
                        prev_part = None;
                        if self.open.is_empty() {
                            return Err(PlanError::Invariant(
                                "open range is empty although its last part was accepted",
                            ));
                        }
                        // Do not open a range the part cannot start; the next
                        // accepted part closes the current one.
                        if !predicate.can_merge(None, part) {
                            continue;
                        }
                        self.close_range();
                    }
                }
            }

            let candidate = self.candidate(part)?;
            self.open.push(candidate);
            self.parts_considered += 1;
            prev_part = Some(part);
        }
        self.close_range();
        Ok(())
    }

    fn candidate(&self, part: &PartHandle) -> Result<CandidatePart, PlanError> {
        let chain = self.snapshot.chain(part)?;
        Ok(CandidatePart {
            size: chain.bytes,
            rows: part.rows(),
            age: self
                .options
                .now
                .saturating_sub(chain.base_commit_time.to_second()),
            level: part.info().level,
            chain_depth: chain.depth,
            shall_participate_in_merges: true,
            part: Arc::clone(part),
        })
    }

    fn close_range(&mut self) {
        if self.open.is_empty() {
            return;
        }
        let parts = mem::take(&mut self.open);
        let partition_id = parts[0].part.partition_id().to_owned();
        self.ranges.push(PartsRange {
            partition_id,
            parts,
        });
    }
}

/// Split parts by (columns commit time, mutation commit time), keeping the
/// relative order inside each lineage.
fn group_by_lineage(parts: Vec<PartHandle>) -> Vec<Vec<PartHandle>> {
    let mut grouped: BTreeMap<(u64, u64), Vec<PartHandle>> = BTreeMap::new();
    for part in parts {
        let key = (
            part.columns_commit_time().get(),
            part.mutation_commit_time().get(),
        );
        grouped.entry(key).or_default().push(part);
    }
    grouped.into_values().collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        part::{DataPart, PartInfo},
        timestamp::TxnTimestamp,
    };

    const NOW: u64 = 10_000;

    fn options(max_parts_to_break: usize) -> RangeBuilderOptions {
        RangeBuilderOptions {
            nonadjacent: false,
            max_parts_to_break,
            now: NOW,
        }
    }

    fn part(partition: &str, block: u64) -> DataPart {
        DataPart::new(PartInfo::new(partition, block, block, 0))
            .with_bytes(10)
            .with_rows(5)
            .with_commit_time(TxnTimestamp::from_unix_secs(NOW - 100))
    }

    fn build<P: MergePredicate>(
        snapshot: &PartSnapshot,
        options: RangeBuilderOptions,
        mut predicate: P,
    ) -> CandidateRanges {
        let mut builder = CandidateRangeBuilder::new(snapshot, options);
        builder
            .add_group(snapshot.visible().cloned().collect(), &mut predicate)
            .unwrap();
        builder.finish()
    }

    fn blocks(ranges: &CandidateRanges) -> Vec<Vec<u64>> {
        ranges
            .ranges
            .iter()
            .map(|range| range.parts.iter().map(|c| c.part.info().min_block).collect())
            .collect()
    }

    #[test]
    fn partitions_start_new_ranges() {
        let snapshot =
            PartSnapshot::from_parts([part("a", 1), part("a", 2), part("b", 3), part("b", 4)]);
        let ranges = build(&snapshot, options(100), AlwaysMergeable);
        assert_eq!(blocks(&ranges), vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(ranges.ranges[0].partition_id, "a");
        assert_eq!(ranges.ranges[1].partition_id, "b");
        assert_eq!(ranges.parts_considered, 4);
    }

    #[test]
    fn strict_mode_splits_long_ranges() {
        let snapshot = PartSnapshot::from_parts((1..=7).map(|block| part("a", block)));
        let ranges = build(&snapshot, options(3), AlwaysMergeable);
        assert_eq!(blocks(&ranges), vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
        assert!(ranges.ranges.iter().all(|range| range.parts.len() <= 3));
    }

    #[test]
    fn part_failing_solo_check_is_skipped_without_empty_range() {
        let snapshot = PartSnapshot::from_parts([part("a", 1), part("a", 2), part("a", 3)]);
        let predicate = merge_predicate(|_prev, part| part.info().min_block != 1);
        let ranges = build(&snapshot, options(100), predicate);
        assert_eq!(blocks(&ranges), vec![vec![2, 3]]);
        assert_eq!(ranges.parts_considered, 2);
    }

    #[test]
    fn rejected_pair_restarts_range_in_same_partition() {
        let snapshot = PartSnapshot::from_parts((1..=4).map(|block| part("a", block)));
        let predicate = merge_predicate(|prev: Option<&PartHandle>, part: &PartHandle| {
            !matches!(prev, Some(prev) if prev.info().min_block == 2 && part.info().min_block == 3)
        });
        let ranges = build(&snapshot, options(100), predicate);
        assert_eq!(blocks(&ranges), vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn part_rejected_by_pair_and_solo_checks_is_dropped() {
        let snapshot = PartSnapshot::from_parts((1..=4).map(|block| part("a", block)));
        let predicate = merge_predicate(|_prev, part| part.info().min_block != 3);
        let ranges = build(&snapshot, options(100), predicate);
        assert_eq!(blocks(&ranges), vec![vec![1, 2], vec![4]]);
        assert_eq!(ranges.parts_considered, 3);
    }

    #[test]
    fn all_parts_rejected_yields_nothing() {
        let snapshot = PartSnapshot::from_parts([part("a", 1), part("b", 2)]);
        let ranges = build(&snapshot, options(100), merge_predicate(|_, _| false));
        assert!(ranges.ranges.is_empty());
        assert_eq!(ranges.parts_considered, 0);
    }

    #[test]
    fn chain_metrics_come_from_the_base_version() {
        let mut builder = PartSnapshot::builder();
        let base = builder
            .add_superseded(
                part("a", 1)
                    .with_bytes(100)
                    .with_commit_time(TxnTimestamp::from_unix_secs(NOW - 500)),
                None,
            )
            .unwrap();
        builder
            .add_version(
                DataPart::new(PartInfo::new("a", 1, 1, 3))
                    .with_bytes(40)
                    .with_rows(9)
                    .with_commit_time(TxnTimestamp::from_unix_secs(NOW - 10)),
                base,
            )
            .unwrap();
        let snapshot = builder.build();
        let ranges = build(&snapshot, options(100), AlwaysMergeable);
        let candidate = &ranges.ranges[0].parts[0];
        assert_eq!(candidate.size, 140);
        assert_eq!(candidate.age, 500);
        assert_eq!(candidate.chain_depth, 1);
        assert_eq!(candidate.rows, 9);
        assert_eq!(candidate.level, 3);
        assert_eq!(candidate.versions(), 2);
    }

    #[test]
    fn age_is_clamped_for_future_commits() {
        let snapshot = PartSnapshot::from_parts([
            part("a", 1).with_commit_time(TxnTimestamp::from_unix_secs(NOW + 60))
        ]);
        let ranges = build(&snapshot, options(100), AlwaysMergeable);
        assert_eq!(ranges.ranges[0].parts[0].age, 0);
    }

    #[test]
    fn nonadjacent_mode_groups_by_lineage_and_ignores_length_cap() {
        let lineage = |block: u64, columns: u64, mutation: u64| {
            part("a", block)
                .with_columns_commit_time(TxnTimestamp::new(columns))
                .with_mutation_commit_time(TxnTimestamp::new(mutation))
        };
        let snapshot = PartSnapshot::from_parts([
            lineage(1, 1, 1),
            lineage(2, 2, 1),
            lineage(3, 1, 1),
            lineage(4, 2, 1),
            lineage(5, 1, 1),
        ]);
        let ranges = build(
            &snapshot,
            RangeBuilderOptions {
                nonadjacent: true,
                max_parts_to_break: 2,
                now: NOW,
            },
            AlwaysMergeable,
        );
        assert_eq!(blocks(&ranges), vec![vec![1, 3, 5], vec![2, 4]]);
        for range in &ranges.ranges {
            let keys: HashSet<_> = range
                .parts
                .iter()
                .map(|c| {
                    (
                        c.part.columns_commit_time(),
                        c.part.mutation_commit_time(),
                    )
                })
                .collect();
            assert_eq!(keys.len(), 1);
        }
    }
}
