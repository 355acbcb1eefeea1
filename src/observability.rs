//! Logging infrastructure for merge selection.
//!
//! All events use `tracing` with the single target `mergetree_select` and carry
//! `component` and `event` fields for filtering.
//!
//! ## Library Integration
//!
//! The crate never initializes a global subscriber. Applications configure
//! tracing via `tracing_subscriber` or similar.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: subsystem (e.g., "planner", "adaptive")
//! - Use `%` for Display, `?` for Debug formatting
//! - Per-part fields only on warn paths; planning passes can see thousands of parts

/// Target for all merge-selection log events.
pub(crate) const SELECT_TARGET: &str = "mergetree_select";

/// Macro for debug-level log events.
///
/// # Example
/// ```ignore
/// log_debug!(
///     component = "planner",
///     event = "parts_selected",
///     table = %table_id,
///     ranges = ranges.len(),
/// );
/// ```
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::SELECT_TARGET, $($field)*)
    };
}

/// Macro for trace-level log events.
macro_rules! log_trace {
    ($($field:tt)*) => {
        ::tracing::trace!(target: $crate::observability::SELECT_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::SELECT_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_trace;
pub(crate) use log_warn;
