use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use super::{
    adaptive::{AdaptiveController, ControllerTargets, UnselectablePartRows},
    candidate::{
        CandidatePart, CandidateRangeBuilder, CandidateRanges, MergePredicate, PartsRange,
        RangeBuilderOptions,
    },
    error::PlanError,
    grouper::group_by_bucket,
    selector::{MergeSelector, SelectorSettings},
};
use crate::{
    config::SelectorConfig,
    id::TableId,
    observability::{log_debug, log_warn},
    option::SelectPartsSettings,
    part::{canonical_order, PartHandle, PartSnapshot},
    stats::BgTaskStatsProvider,
    table::{MergeSelectorStrategy, MergeTreeTable},
};

/// Result category of a planning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectDecision {
    /// There were no parts at all.
    NothingToMerge,
    /// Parts exist but nothing qualifies right now; try again later.
    CannotSelect,
    /// At least one range was selected.
    Selected,
}

/// Decision plus the selected ranges, each ready for merge execution.
#[derive(Debug, Clone)]
pub struct SelectOutcome {
    /// What the pass concluded.
    pub decision: SelectDecision,
    /// Selected ranges; empty unless `decision` is [`SelectDecision::Selected`].
    pub ranges: Vec<Vec<PartHandle>>,
}

impl SelectOutcome {
    fn nothing_to_merge() -> Self {
        Self {
            decision: SelectDecision::NothingToMerge,
            ranges: Vec::new(),
        }
    }

    fn cannot_select() -> Self {
        Self {
            decision: SelectDecision::CannotSelect,
            ranges: Vec::new(),
        }
    }

    /// Returns `true` if anything was selected.
    pub fn is_selected(&self) -> bool {
        self.decision == SelectDecision::Selected
    }
}

/// Chooses which parts of one table to merge next.
///
/// A planner is cheap to keep around per table; every call to
/// [`plan`](Self::plan) works on its own immutable snapshot and shares no
/// mutable state with other passes.
pub struct MergePlanner {
    table: MergeTreeTable,
    config: SelectorConfig,
    stats: Option<Arc<dyn BgTaskStatsProvider>>,
}

impl MergePlanner {
    /// Planner for `table` using server-side selector configuration `config`.
    pub fn new(table: MergeTreeTable, config: SelectorConfig) -> Self {
        Self {
            table,
            config,
            stats: None,
        }
    }

    /// Feed the adaptive controller from `provider`.
    pub fn with_stats_provider(self, provider: Arc<dyn BgTaskStatsProvider>) -> Self {
        Self {
            stats: Some(provider),
            ..self
        }
    }

    /// Table this planner selects for.
    pub fn table(&self) -> &MergeTreeTable {
        &self.table
    }

    /// Run one planning pass at the current wall-clock time.
    pub fn plan<P>(
        &self,
        snapshot: &PartSnapshot,
        unselectable: &UnselectablePartRows,
        predicate: P,
        settings: &SelectPartsSettings,
    ) -> Result<SelectOutcome, PlanError>
    where
        P: MergePredicate,
    {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        self.plan_at(snapshot, unselectable, predicate, settings, now)
    }

    /// Run one planning pass with `now` (unix seconds) as the reference time
    /// for part ages.
    pub fn plan_at<P>(
        &self,
        snapshot: &PartSnapshot,
        unselectable: &UnselectablePartRows,
        mut predicate: P,
        settings: &SelectPartsSettings,
        now: u64,
    ) -> Result<SelectOutcome, PlanError>
    where
        P: MergePredicate,
    {
        let table_id = self.table.id();
        if snapshot.is_empty() {
            log_debug!(
                component = "planner",
                event = "nothing_to_merge",
                table = %table_id,
            );
            return Ok(SelectOutcome::nothing_to_merge());
        }

        let table_settings = self.table.merge_settings();
        let aggressive = settings.aggressive || self.table.is_bucket_table();
        let nonadjacent = table_settings.select_nonadjacent_parts;

        let mut builder = CandidateRangeBuilder::new(
            snapshot,
            RangeBuilderOptions {
                nonadjacent,
                max_parts_to_break: self.config.max_parts_to_break(),
                now,
            },
        );
        for (_bucket, parts) in group_by_bucket(&self.table, snapshot.visible()) {
            builder.add_group(parts, &mut predicate)?;
        }
        let CandidateRanges {
            ranges,
            parts_considered,
        } = builder.finish();

        if parts_considered == 0 {
            log_debug!(
                component = "planner",
                event = "no_parts_satisfy_preconditions",
                table = %table_id,
                visible_parts = snapshot.len(),
            );
            return Ok(SelectOutcome::cannot_select());
        }

        let selector_settings = SelectorSettings {
            max_parts_to_merge_base: table_settings.max_parts_to_merge_base(),
            min_parts_to_merge_base: if aggressive {
                1
            } else {
                self.config.dance_merge_selector.min_parts_to_merge_base
            },
            max_total_rows_to_merge: self.max_total_rows_to_merge(),
            enable_batch_select: settings.enable_batch_select,
            final_merge: settings.final_merge,
            max_age_for_single_part_chain: table_settings.merge_with_ttl_timeout,
            select_nonadjacent_parts_allowed: nonadjacent,
        };
        let mut selector = table_settings
            .merge_selector
            .build(selector_settings, &self.config);
        if let Some(controller) =
            self.adaptive_controller(&ranges, unselectable, settings, aggressive, now)
        {
            selector = selector.with_adaptive_controller(controller);
        }

        let selected = selector.select(&ranges, settings.max_total_size_to_merge);
        if selected.is_empty() {
            log_debug!(
                component = "planner",
                event = "selector_empty_result",
                table = %table_id,
                ranges = ranges.len(),
                parts_considered,
            );
            return Ok(SelectOutcome::cannot_select());
        }

        let out = materialize(table_id, selected, nonadjacent);

        if out.is_empty() {
            return Ok(SelectOutcome::cannot_select());
        }
        log_debug!(
            component = "planner",
            event = "parts_selected",
            table = %table_id,
            ranges = out.len(),
            parts = out.iter().map(Vec::len).sum::<usize>(),
        );
        Ok(SelectOutcome {
            decision: SelectDecision::Selected,
            ranges: out,
        })
    }

    /// Row cap handed to the selector.
    ///
    /// Tables with a unique key address rows with 32-bit ids, so their cap is
    /// reset to `u32::MAX` when it is unset or out of range.
    pub(crate) fn max_total_rows_to_merge(&self) -> u64 {
        let configured = self.table.merge_settings().max_total_rows_to_merge;
        if self.table.has_unique_key() {
            match u64::try_from(configured) {
                Ok(rows) if rows > 0 && rows <= u64::from(u32::MAX) => rows,
                _ => u64::from(u32::MAX),
            }
        } else if configured <= 0 {
            u64::MAX
        } else {
            configured as u64
        }
    }

    fn adaptive_controller(
        &self,
        ranges: &[PartsRange],
        unselectable: &UnselectablePartRows,
        settings: &SelectPartsSettings,
        aggressive: bool,
        now: u64,
    ) -> Option<AdaptiveController> {
        let table_settings = self.table.merge_settings();
        if table_settings.merge_selector != MergeSelectorStrategy::Dance
            || table_settings.expected_parts_number < 0
            || aggressive
            || settings.final_merge
        {
            return None;
        }
        let table_id = self.table.id();
        let expected_parts = match table_settings.expected_parts_number {
            0 => settings.num_default_workers,
            expected => expected as u64,
        };
        if expected_parts == 0 {
            log_debug!(
                component = "adaptive",
                event = "adaptive_controller_skipped",
                table = %table_id,
                reason = "no_target",
            );
            return None;
        }

        let Some(stats) = self
            .stats
            .as_ref()
            .and_then(|provider| provider.get_or_create_table_stats(table_id))
        else {
            log_debug!(
                component = "adaptive",
                event = "adaptive_controller_skipped",
                table = %table_id,
                reason = "no_stats_provider",
            );
            return None;
        };

        let targets = ControllerTargets {
            expected_parts,
            write_amplification_threshold: table_settings.write_amplification_optimize_threshold,
            real_time_window: self.config.dance_merge_selector.real_time_window,
        };
        match AdaptiveController::init(&stats, ranges, unselectable, targets, now) {
            Some(controller) => {
                log_debug!(
                    component = "adaptive",
                    event = "adaptive_controller_enabled",
                    table = %table_id,
                    expected_parts,
                );
                Some(controller)
            }
            None => {
                log_debug!(
                    component = "adaptive",
                    event = "adaptive_controller_skipped",
                    table = %table_id,
                    reason = "no_statistics",
                );
                None
            }
        }
    }
}

/// Turn selector output into part lists: drop singletons that have no version
/// chain to collapse, and restore canonical order after a nonadjacent pass.
fn materialize(
    table_id: TableId,
    selected: Vec<Vec<CandidatePart>>,
    nonadjacent: bool,
) -> Vec<Vec<PartHandle>> {
    let mut out = Vec::with_capacity(selected.len());
    for slice in selected {
        if let [single] = slice.as_slice() {
            if single.chain_depth == 0 {
                log_warn!(
                    component = "planner",
                    event = "discard_singleton_range",
                    table = %table_id,
                    part = %single.part.info(),
                    level = single.level,
                );
                continue;
            }
        }
        let mut parts: Vec<PartHandle> =
            slice.into_iter().map(|candidate: CandidatePart| candidate.part).collect();
        if nonadjacent {
            parts.sort_by(|lhs, rhs| canonical_order(lhs, rhs));
        }
        out.push(parts);
    }
    out
}
