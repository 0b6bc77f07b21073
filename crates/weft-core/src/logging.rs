//! Logging facilities for Weft.
//!
//! Weft uses the `tracing` crate for instrumentation. To see logs, install a
//! tracing subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("weft=debug,weft_core=info")
//!     .init();
//! ```
//!
//! Every mutation an adapter reconciles is logged at `debug` level on
//! [`targets::ADAPTER`]; individual selection transitions are logged at
//! `trace` level on [`targets::SELECTION`].

/// Span names used throughout Weft for tracing.
pub mod span_names {
    /// Adapter reconciliation span.
    pub const RECONCILE: &str = "weft::reconcile";
    /// View construction span.
    pub const BUILD_VIEW: &str = "weft::build_view";
    /// List view population span.
    pub const POPULATE: &str = "weft::populate";
    /// Signal emission span.
    pub const SIGNAL: &str = "weft_core::signal";
}

/// `tracing` targets, one per subsystem.
pub mod targets {
    /// Core primitives target.
    pub const CORE: &str = "weft_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "weft_core::signal";
    /// Adapter reconciliation target.
    pub const ADAPTER: &str = "weft::adapter";
    /// Selection state machine target.
    pub const SELECTION: &str = "weft::selection";
    /// View cache target.
    pub const CACHE: &str = "weft::cache";
    /// Windowed list view target.
    pub const LIST_VIEW: &str = "weft::list_view";
    /// Performance spans target.
    pub const PERF: &str = "weft::perf";
}

/// An `info` span on [`targets::PERF`], entered until the guard is dropped.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create and enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "weft::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// `tracing` macros preset to the `weft_core` target.
#[macro_export]
macro_rules! weft_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "weft_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! weft_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "weft_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! weft_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "weft_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! weft_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "weft_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! weft_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "weft_core", $($arg)*)
    };
}
