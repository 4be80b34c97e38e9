//! Logging infrastructure for the replacing merge.
//!
//! All events go through `tracing` with target "replacing_merge" and carry
//! an `event` field for filtering.
//!
//! ## Library Integration
//!
//! The crate never initializes a global subscriber. Applications configure
//! tracing via `tracing_subscriber` or similar.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: subsystem (e.g., "merge", "stream")
//! - Use `%` for Display, `?` for Debug formatting
//! - Per-row events stay at trace level

/// Target for all merge log events.
pub(crate) const MERGE_TARGET: &str = "replacing_merge";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "merge",
///     event = "merge_finished",
///     rows_out = stats.rows_emitted,
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::MERGE_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::MERGE_TARGET, $($field)*)
    };
}

/// Macro for trace-level log events.
macro_rules! log_trace {
    ($($field:tt)*) => {
        ::tracing::trace!(target: $crate::observability::MERGE_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::MERGE_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_trace;
pub(crate) use log_warn;
