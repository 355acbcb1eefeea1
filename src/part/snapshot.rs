use std::sync::Arc;

use super::{DataPart, PartError, PartHandle, PartIdx};
use crate::timestamp::TxnTimestamp;

/// Immutable view of a table's parts taken for one planning pass.
///
/// Every version ever referenced by a chain lives in the arena; only the
/// visible (leaf) parts take part in merge selection.
#[derive(Debug, Clone, Default)]
pub struct PartSnapshot {
    arena: Vec<PartHandle>,
    visible: Vec<PartIdx>,
}

/// Size, age anchor and length of a version chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSummary {
    /// Bytes summed over the leaf and all previous versions.
    pub bytes: u64,
    /// Commit time of the oldest version in the chain.
    pub base_commit_time: TxnTimestamp,
    /// Number of previous versions linked under the leaf.
    pub depth: u32,
}

impl PartSnapshot {
    /// Start building a snapshot.
    pub fn builder() -> PartSnapshotBuilder {
        PartSnapshotBuilder::default()
    }

    /// Snapshot where every part is visible and none has a previous version.
    pub fn from_parts(parts: impl IntoIterator<Item = DataPart>) -> Self {
        let mut builder = Self::builder();
        for part in parts {
            builder.add_part(part);
        }
        builder.build()
    }

    /// Visible parts in catalog order.
    pub fn visible(&self) -> impl ExactSizeIterator<Item = &PartHandle> + '_ {
        self.visible.iter().map(move |idx| &self.arena[idx.0])
    }

    /// Number of visible parts.
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    /// Returns `true` when there are no visible parts.
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Look up any arena slot.
    pub fn get(&self, idx: PartIdx) -> Option<&PartHandle> {
        self.arena.get(idx.0)
    }

    /// Version `part` directly supersedes, if any.
    pub fn previous(&self, part: &DataPart) -> Option<&PartHandle> {
        part.previous.and_then(|idx| self.get(idx))
    }

    /// Walk the version chain under `part`.
    ///
    /// A chain can never be longer than the arena, so the walk gives up after
    /// that many hops.
    pub fn chain(&self, part: &DataPart) -> Result<ChainSummary, PartError> {
        let limit = self.arena.len();
        let mut summary = ChainSummary {
            bytes: part.bytes,
            base_commit_time: part.commit_time,
            depth: 0,
        };
        let mut last_slot = usize::MAX;
        let mut cursor = part.previous;
        while let Some(idx) = cursor {
            debug_assert!(idx.0 < last_slot, "version chain must point backwards");
            last_slot = idx.0;
            if summary.depth as usize >= limit {
                return Err(PartError::ChainOverflow {
                    part: part.name(),
                    limit,
                });
            }
            let Some(prev) = self.arena.get(idx.0) else {
                return Err(PartError::DanglingPrevious {
                    part: part.name(),
                    previous: idx.0,
                });
            };
            summary.depth += 1;
            summary.bytes = summary.bytes.saturating_add(prev.bytes);
            summary.base_commit_time = prev.commit_time;
            cursor = prev.previous;
        }
        Ok(summary)
    }
}

/// Incremental builder for [`PartSnapshot`].
///
/// A version can only point at a slot that already exists, which keeps every
/// chain acyclic.
#[derive(Debug, Default)]
pub struct PartSnapshotBuilder {
    arena: Vec<PartHandle>,
    visible: Vec<PartIdx>,
}

impl PartSnapshotBuilder {
    /// Add a visible part without a previous version.
    ///
    /// A back-reference carried over from another snapshot is dropped.
    pub fn add_part(&mut self, mut part: DataPart) -> PartIdx {
        part.previous = None;
        let idx = self.push(part);
        self.visible.push(idx);
        idx
    }

    /// Add a visible part superseding the version stored at `previous`.
    pub fn add_version(&mut self, part: DataPart, previous: PartIdx) -> Result<PartIdx, PartError> {
        let idx = self.add_superseded(part, Some(previous))?;
        self.visible.push(idx);
        Ok(idx)
    }

    /// Add a version that is only reachable through chains of later versions.
    pub fn add_superseded(
        &mut self,
        mut part: DataPart,
        previous: Option<PartIdx>,
    ) -> Result<PartIdx, PartError> {
        if let Some(prev) = previous {
            if prev.0 >= self.arena.len() {
                return Err(PartError::DanglingPrevious {
                    part: part.name(),
                    previous: prev.0,
                });
            }
        }
        part.previous = previous;
        Ok(self.push(part))
    }

    /// Mark an existing arena slot as visible.
    pub fn mark_visible(&mut self, idx: PartIdx) -> Result<(), PartError> {
        if idx.0 >= self.arena.len() {
            return Err(PartError::UnknownPart(idx.0));
        }
        self.visible.push(idx);
        Ok(())
    }

    /// Finish the snapshot.
    pub fn build(self) -> PartSnapshot {
        PartSnapshot {
            arena: self.arena,
            visible: self.visible,
        }
    }

    fn push(&mut self, part: DataPart) -> PartIdx {
        let idx = PartIdx(self.arena.len());
        self.arena.push(Arc::new(part));
        idx
    }
}
