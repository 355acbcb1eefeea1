//! Greedy threshold selector: small windows, balanced sizes, cheap decisions.

use super::{select_windows, MergeSelector, SelectorSettings, Window, WindowPolicy};
use crate::{
    config::SimpleSelectorConfig,
    merge::candidate::{CandidatePart, PartsRange},
};

#[derive(Debug)]
pub(crate) struct SimpleMergeSelector {
    settings: SelectorSettings,
    config: SimpleSelectorConfig,
}

impl SimpleMergeSelector {
    pub(crate) fn new(settings: SelectorSettings, config: SimpleSelectorConfig) -> Self {
        Self { settings, config }
    }
}

impl WindowPolicy for SimpleMergeSelector {
    fn max_parts(&self) -> usize {
        self.config
            .max_parts_in_window
            .min(self.settings.max_parts_to_merge_base)
    }

    fn accept(&self, _range: &PartsRange, window: &Window) -> bool {
        if self.settings.aggressive() || window.min_age >= self.config.min_age_to_force_merge {
            return true;
        }
        let rest = window.sum_size - window.max_size;
        window.max_size as f64 <= self.config.max_size_ratio * rest as f64
    }

    fn score(&self, _range: &PartsRange, window: &Window) -> f64 {
        window.sum_size as f64 / (window.versions as f64 - 1.0)
    }
}

impl MergeSelector for SimpleMergeSelector {
    fn select(&self, ranges: &[PartsRange], max_total_size: u64) -> Vec<Vec<CandidatePart>> {
        select_windows(self, &self.settings, ranges, max_total_size)
    }
}
