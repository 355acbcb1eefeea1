//! Merge selectors: choose contiguous slices of candidate ranges to merge.
//!
//! Both variants share one window scan and one picking rule; they differ only
//! in which windows they accept and how they score them. Selection is a pure
//! function of its inputs so that independent planners converge on the same
//! decision.

mod dance;
mod simple;

use std::{borrow::Cow, cmp::Ordering};

pub(crate) use dance::DanceMergeSelector;
pub(crate) use simple::SimpleMergeSelector;

use super::{
    adaptive::AdaptiveController,
    candidate::{CandidatePart, PartsRange},
};
use crate::{config::SelectorConfig, table::MergeSelectorStrategy};

/// Selector interface shared by all strategies.
pub(crate) trait MergeSelector {
    /// Pick disjoint contiguous slices of `ranges` within `max_total_size` bytes.
    fn select(&self, ranges: &[PartsRange], max_total_size: u64) -> Vec<Vec<CandidatePart>>;
}

/// Concrete selector built for one planning pass.
#[derive(Debug)]
pub(crate) enum MergeSelectorKind {
    /// Greedy threshold selector.
    Simple(SimpleMergeSelector),
    /// Optimizing selector.
    Dance(DanceMergeSelector),
}

impl MergeSelector for MergeSelectorKind {
    fn select(&self, ranges: &[PartsRange], max_total_size: u64) -> Vec<Vec<CandidatePart>> {
        match self {
            Self::Simple(selector) => selector.select(ranges, max_total_size),
            Self::Dance(selector) => selector.select(ranges, max_total_size),
        }
    }
}

impl MergeSelectorKind {
    /// Attach a controller; strategies that do not adapt ignore it.
    pub(crate) fn with_adaptive_controller(self, controller: AdaptiveController) -> Self {
        match self {
            Self::Dance(selector) => Self::Dance(selector.with_adaptive_controller(controller)),
            other => other,
        }
    }
}

impl MergeSelectorStrategy {
    /// Build the concrete selector for this strategy.
    pub(crate) fn build(
        self,
        settings: SelectorSettings,
        config: &SelectorConfig,
    ) -> MergeSelectorKind {
        match self {
            Self::Simple => MergeSelectorKind::Simple(SimpleMergeSelector::new(
                settings,
                config.simple_merge_selector.clone(),
            )),
            Self::Dance => MergeSelectorKind::Dance(DanceMergeSelector::new(
                settings,
                config.dance_merge_selector.clone(),
            )),
        }
    }
}

/// Limits and flags resolved by the planner for one pass.
#[derive(Debug, Clone)]
pub(crate) struct SelectorSettings {
    pub(crate) max_parts_to_merge_base: usize,
    /// Collapses to 1 in aggressive mode.
    pub(crate) min_parts_to_merge_base: usize,
    pub(crate) max_total_rows_to_merge: u64,
    pub(crate) enable_batch_select: bool,
    pub(crate) final_merge: bool,
    /// Chain age (seconds) after which a lone chain may be collapsed; 0 disables.
    pub(crate) max_age_for_single_part_chain: u64,
    pub(crate) select_nonadjacent_parts_allowed: bool,
}

impl SelectorSettings {
    pub(crate) fn aggressive(&self) -> bool {
        self.min_parts_to_merge_base <= 1
    }

    /// Whether `part` may be merged on its own to collapse its version chain.
    fn single_chain_allowed(&self, part: &CandidatePart) -> bool {
        if part.chain_depth == 0 {
            return false;
        }
        self.aggressive()
            || self.final_merge
            || (self.max_age_for_single_part_chain > 0
                && part.age >= self.max_age_for_single_part_chain)
    }
}

/// Running totals of a contiguous slice `[begin, end)` of one range.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Window {
    pub(crate) begin: usize,
    pub(crate) end: usize,
    pub(crate) sum_size: u64,
    pub(crate) sum_rows: u64,
    pub(crate) max_size: u64,
    pub(crate) min_age: u64,
    /// Physical versions covered, counting every chain member.
    pub(crate) versions: u64,
}

impl Window {
    fn empty(begin: usize) -> Self {
        Self {
            begin,
            end: begin,
            sum_size: 0,
            sum_rows: 0,
            max_size: 0,
            min_age: u64::MAX,
            versions: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.end - self.begin
    }

    fn push(&mut self, part: &CandidatePart) {
        self.end += 1;
        self.sum_size = self.sum_size.saturating_add(part.size);
        self.sum_rows = self.sum_rows.saturating_add(part.rows);
        self.max_size = self.max_size.max(part.size);
        self.min_age = self.min_age.min(part.age);
        self.versions += part.versions();
    }
}

/// Strategy hooks plugged into the shared window scan.
pub(crate) trait WindowPolicy {
    /// Longest window worth scoring.
    fn max_parts(&self) -> usize;

    /// Whether a window of at least two parts is worth merging.
    fn accept(&self, range: &PartsRange, window: &Window) -> bool;

    /// Cost of merging the window; lower is better.
    fn score(&self, range: &PartsRange, window: &Window) -> f64;
}

#[derive(Debug, Clone, Copy)]
struct ScoredWindow {
    range: usize,
    begin: usize,
    end: usize,
    sum_size: u64,
    score: f64,
}

impl ScoredWindow {
    fn new<P: WindowPolicy>(
        policy: &P,
        range_idx: usize,
        range: &PartsRange,
        window: &Window,
    ) -> Self {
        Self {
            range: range_idx,
            begin: window.begin,
            end: window.end,
            sum_size: window.sum_size,
            score: policy.score(range, window),
        }
    }

    fn cmp_rank(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.range.cmp(&other.range))
            .then(self.begin.cmp(&other.begin))
            .then(self.end.cmp(&other.end))
    }
}

/// Scored windows of a pass: only the best one unless batch select needs all.
enum ScoredWindows {
    Best(Option<ScoredWindow>),
    All(Vec<ScoredWindow>),
}

impl ScoredWindows {
    fn new(batch: bool) -> Self {
        if batch {
            Self::All(Vec::new())
        } else {
            Self::Best(None)
        }
    }

    fn push(&mut self, window: ScoredWindow) {
        match self {
            Self::Best(best) => {
                if best
                    .as_ref()
                    .map_or(true, |current| window.cmp_rank(current) == Ordering::Less)
                {
                    *best = Some(window);
                }
            }
            Self::All(all) => all.push(window),
        }
    }
}

/// Scan every window of every range, then pick the best disjoint ones.
pub(crate) fn select_windows<P>(
    policy: &P,
    settings: &SelectorSettings,
    ranges: &[PartsRange],
    max_total_size: u64,
) -> Vec<Vec<CandidatePart>>
where
    P: WindowPolicy,
{
    let ranges = arrange(ranges, settings.select_nonadjacent_parts_allowed);
    let max_parts = policy.max_parts().max(1);

    let mut scored = ScoredWindows::new(settings.enable_batch_select);
    for (range_idx, range) in ranges.iter().enumerate() {
        let parts = &range.parts;
        for begin in 0..parts.len() {
            let mut window = Window::empty(begin);
            let mut last_accepted = false;
            for part in &parts[begin..] {
                if !part.shall_participate_in_merges || window.len() >= max_parts {
                    break;
                }
                if window.sum_rows.saturating_add(part.rows) > settings.max_total_rows_to_merge
                    || window.sum_size.saturating_add(part.size) > max_total_size
                {
                    break;
                }
                window.push(part);

                last_accepted = if window.len() == 1 {
                    settings.single_chain_allowed(part)
                } else {
                    policy.accept(range, &window)
                };
                if last_accepted {
                    scored.push(ScoredWindow::new(policy, range_idx, range, &window));
                }
            }
            // Under final, the widest window reachable from the range start is
            // offered even if the policy rejected it.
            if begin == 0 && settings.final_merge && window.len() > 1 && !last_accepted {
                scored.push(ScoredWindow::new(policy, range_idx, range, &window));
            }
        }
    }

    let scored = match scored {
        ScoredWindows::Best(best) => {
            return best
                .map(|best| vec![ranges[best.range].parts[best.begin..best.end].to_vec()])
                .unwrap_or_default();
        }
        ScoredWindows::All(mut all) => {
            all.sort_by(ScoredWindow::cmp_rank);
            all
        }
    };

    let mut occupied: Vec<Vec<bool>> = ranges
        .iter()
        .map(|range| vec![false; range.parts.len()])
        .collect();
    let mut total_size = 0u64;
    let mut selected = Vec::new();
    for window in scored {
        let slots = &mut occupied[window.range][window.begin..window.end];
        if slots.iter().any(|taken| *taken) {
            continue;
        }
        let Some(next_total) = total_size
            .checked_add(window.sum_size)
            .filter(|total| *total <= max_total_size)
        else {
            continue;
        };
        slots.iter_mut().for_each(|taken| *taken = true);
        total_size = next_total;
        selected.push(ranges[window.range].parts[window.begin..window.end].to_vec());
    }
    selected
}

/// In nonadjacent mode, reorder each range so similar parts sit next to each
/// other: fewer rows first, then smaller, then older, then by name.
fn arrange(ranges: &[PartsRange], nonadjacent: bool) -> Cow<'_, [PartsRange]> {
    if !nonadjacent {
        return Cow::Borrowed(ranges);
    }
    let mut arranged = ranges.to_vec();
    for range in &mut arranged {
        range.parts.sort_by(|lhs, rhs| {
            lhs.rows
                .cmp(&rhs.rows)
                .then(lhs.size.cmp(&rhs.size))
                .then(rhs.age.cmp(&lhs.age))
                .then_with(|| lhs.part.info().cmp(rhs.part.info()))
        });
    }
    Cow::Owned(arranged)
}
