#![deny(missing_docs)]
//! Merge candidate selection for partitioned, versioned merge-tree tables.
//!
//! A planning pass takes an immutable [`PartSnapshot`] of a table's parts,
//! groups them by bucket, cuts each group into contiguous ranges of mergeable
//! parts and asks the configured selector which slices to merge. The outcome
//! is a [`SelectDecision`] plus the chosen parts; nothing is written.
//!
//! ```
//! use mergetree_select::{
//!     AlwaysMergeable, DataPart, MergePlanner, MergeTreeTable, PartInfo, PartSnapshot,
//!     SelectDecision, SelectPartsSettings, SelectorConfig, TableId, UnselectablePartRows,
//! };
//!
//! let snapshot = PartSnapshot::from_parts(
//!     (1..=3).map(|block| DataPart::new(PartInfo::new("p0", block, block, 0)).with_bytes(10)),
//! );
//! let planner = MergePlanner::new(MergeTreeTable::new(TableId::new()), SelectorConfig::default());
//! let outcome = planner
//!     .plan(
//!         &snapshot,
//!         &UnselectablePartRows::new(),
//!         AlwaysMergeable,
//!         &SelectPartsSettings::default(),
//!     )
//!     .unwrap();
//! assert_eq!(outcome.decision, SelectDecision::Selected);
//! assert_eq!(outcome.ranges[0].len(), 3);
//! ```

mod observability;

/// Server-side selector configuration loaded from TOML.
pub mod config;
/// Table identity.
pub mod id;
/// Merge candidate selection.
pub mod merge;
/// Per-pass planning options.
pub mod option;
/// Parts, version chains and snapshots.
pub mod part;
/// Background task statistics consumed by the adaptive controller.
pub mod stats;
/// Table descriptor and table-level tunables.
pub mod table;
/// Transaction commit timestamps.
pub mod timestamp;

pub use crate::{
    config::{ConfigError, SelectorConfig},
    id::TableId,
    merge::{
        merge_predicate, AlwaysMergeable, MergePlanner, MergePredicate, PlanError,
        SelectDecision, SelectOutcome, UnselectablePartRows, UnselectableRows,
    },
    option::SelectPartsSettings,
    part::{DataPart, PartError, PartHandle, PartInfo, PartSnapshot},
    stats::{BgTaskStatsProvider, BgTaskStatsRegistry, TableBgTaskStats},
    table::{ClusterByHash, MergeSelectorStrategy, MergeTreeSettings, MergeTreeTable},
    timestamp::TxnTimestamp,
};
