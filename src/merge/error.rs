use thiserror::Error;

use crate::part::PartError;

/// Failures that abort a planning pass.
///
/// Unfavorable part sets are not errors; they surface as
/// [`SelectDecision`](super::SelectDecision) values.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Range construction reached a state it must never reach.
    #[error("invariant violation: {0}")]
    Invariant(&'static str),
    /// Walking a part's version chain failed.
    #[error(transparent)]
    Part(#[from] PartError),
}
