/// Knobs for a single planning pass, supplied by the scheduler.
#[derive(Debug, Clone)]
pub struct SelectPartsSettings {
    pub(crate) max_total_size_to_merge: u64,
    pub(crate) num_default_workers: u64,
    pub(crate) aggressive: bool,
    pub(crate) enable_batch_select: bool,
    pub(crate) final_merge: bool,
}

impl Default for SelectPartsSettings {
    fn default() -> Self {
        SelectPartsSettings {
            max_total_size_to_merge: 150 * 1024 * 1024 * 1024,
            num_default_workers: 1,
            aggressive: false,
            enable_batch_select: false,
            final_merge: false,
        }
    }
}

impl SelectPartsSettings {
    /// Byte budget across everything selected in this pass.
    pub fn max_total_size_to_merge(self, max_total_size_to_merge: u64) -> Self {
        SelectPartsSettings {
            max_total_size_to_merge,
            ..self
        }
    }

    /// Worker count used as the part target when a table asks for "auto".
    pub fn num_default_workers(self, num_default_workers: u64) -> Self {
        SelectPartsSettings {
            num_default_workers,
            ..self
        }
    }

    /// Try to collapse each group into a single part.
    pub fn aggressive(self, aggressive: bool) -> Self {
        SelectPartsSettings { aggressive, ..self }
    }

    /// Return several disjoint merges instead of only the best one.
    pub fn enable_batch_select(self, enable_batch_select: bool) -> Self {
        SelectPartsSettings {
            enable_batch_select,
            ..self
        }
    }

    /// Always offer the full extent of each range as a candidate.
    pub fn final_merge(self, final_merge: bool) -> Self {
        SelectPartsSettings {
            final_merge,
            ..self
        }
    }
}
