//! Optimizing selector.
//!
//! Every window is scored by the bytes it rewrites per part it removes, and a
//! window only qualifies once its size ratio reaches a base that is lowered for
//! small and old windows. Partitions the adaptive controller flags for
//! write-amplification optimization use the full parts-per-merge cap as base.

use super::{select_windows, MergeSelector, SelectorSettings, Window, WindowPolicy};
use crate::{
    config::DanceSelectorConfig,
    merge::{
        adaptive::AdaptiveController,
        candidate::{CandidatePart, PartsRange},
    },
};

#[derive(Debug)]
pub(crate) struct DanceMergeSelector {
    settings: SelectorSettings,
    config: DanceSelectorConfig,
    controller: Option<AdaptiveController>,
}

impl DanceMergeSelector {
    pub(crate) fn new(settings: SelectorSettings, config: DanceSelectorConfig) -> Self {
        Self {
            settings,
            config,
            controller: None,
        }
    }

    pub(crate) fn with_adaptive_controller(self, controller: AdaptiveController) -> Self {
        Self {
            controller: Some(controller),
            ..self
        }
    }

    fn base(&self, partition: &str) -> usize {
        let base = self.settings.min_parts_to_merge_base;
        match &self.controller {
            Some(controller)
                if base > 1 && controller.need_optimize_write_amplification(partition) =>
            {
                self.settings.max_parts_to_merge_base.max(base)
            }
            _ => base,
        }
    }

    /// Base lowered towards 2 for windows that are small or old.
    fn lowered_base(&self, base: usize, window: &Window) -> f64 {
        let base = base as f64;
        if base <= 2.0 {
            return base;
        }
        let size_normalized = 1.0
            - map_to_unit(
                (window.sum_size as f64).ln_1p(),
                (self.config.min_size_to_lower_base as f64).ln_1p(),
                (self.config.max_size_to_lower_base as f64).ln_1p(),
            );
        let age_normalized = map_to_unit(
            window.min_age as f64,
            self.config.min_age_to_lower_base as f64,
            self.config.max_age_to_lower_base as f64,
        );
        interpolate(base, 2.0, (size_normalized + age_normalized).min(1.0))
    }

    fn fixed_cost(&self, window: &Window) -> f64 {
        window.versions as f64 * self.config.size_fixed_cost_to_add as f64
    }
}

impl WindowPolicy for DanceMergeSelector {
    fn max_parts(&self) -> usize {
        self.settings.max_parts_to_merge_base
    }

    fn accept(&self, range: &PartsRange, window: &Window) -> bool {
        let base = self.base(&range.partition_id);
        if base <= 1 {
            return true;
        }
        let numerator = window.sum_size as f64 + self.fixed_cost(window);
        let denominator =
            (window.max_size as f64 + self.config.size_fixed_cost_to_add as f64).max(1.0);
        numerator / denominator >= self.lowered_base(base, window)
    }

    fn score(&self, range: &PartsRange, window: &Window) -> f64 {
        let versions = window.versions as f64;
        let cost = (window.sum_size as f64 + self.fixed_cost(window)) / (versions - 1.9);
        match &self.controller {
            Some(controller) => cost / controller.priority(&range.partition_id),
            None => cost,
        }
    }
}

impl MergeSelector for DanceMergeSelector {
    fn select(&self, ranges: &[PartsRange], max_total_size: u64) -> Vec<Vec<CandidatePart>> {
        select_windows(self, &self.settings, ranges, max_total_size)
    }
}

fn map_to_unit(value: f64, min: f64, max: f64) -> f64 {
    if value <= min {
        0.0
    } else if value >= max {
        1.0
    } else {
        (value - min) / (max - min)
    }
}

fn interpolate(from: f64, to: f64, ratio: f64) -> f64 {
    from + (to - from) * ratio
}
