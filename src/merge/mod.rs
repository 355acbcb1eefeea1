//! Merge candidate selection.
//!
//! One planning pass groups the visible parts by bucket, cuts each group into
//! contiguous mergeable ranges, lets the configured selector pick sub-ranges
//! within the byte budget and hands the chosen parts back to the scheduler.

/// Feedback from past merges used to retune the optimizing selector.
mod adaptive;
/// Construction of mergeable part ranges and per-part metrics.
mod candidate;
/// Planner error types.
mod error;
/// Bucket grouping of the part set.
mod grouper;
/// Planning pass orchestration.
mod planner;
/// Pluggable merge selectors.
mod selector;

pub use adaptive::{UnselectablePartRows, UnselectableRows};
pub use candidate::{merge_predicate, AlwaysMergeable, MergePredicate};
pub use error::PlanError;
pub use planner::{MergePlanner, SelectDecision, SelectOutcome};
