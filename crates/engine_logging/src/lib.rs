#![deny(missing_docs)]
//! Shared logging utilities for the wallbatch workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! the `job_*` variants that tag a line with the job it belongs to, and a
//! minimal test initializer for the global logger.
//!
//! The macros expand through a re-export of `log`, so callers do not need
//! their own `log` dependency.

#[doc(hidden)]
pub use log as __log;

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        $crate::__log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        $crate::__log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        $crate::__log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        $crate::__log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        $crate::__log::error!($($arg)*);
    }};
}

/// Logs a debug-level message prefixed with `[job <id>]`.
#[macro_export]
macro_rules! job_debug {
    ($job:expr, $($arg:tt)*) => {{
        $crate::__log::debug!("[job {}] {}", $job, format_args!($($arg)*));
    }};
}

/// Logs an info-level message prefixed with `[job <id>]`.
#[macro_export]
macro_rules! job_info {
    ($job:expr, $($arg:tt)*) => {{
        $crate::__log::info!("[job {}] {}", $job, format_args!($($arg)*));
    }};
}

/// Logs a warn-level message prefixed with `[job <id>]`.
#[macro_export]
macro_rules! job_warn {
    ($job:expr, $($arg:tt)*) => {{
        $crate::__log::warn!("[job {}] {}", $job, format_args!($($arg)*));
    }};
}

/// Logs an error-level message prefixed with `[job <id>]`.
#[macro_export]
macro_rules! job_error {
    ($job:expr, $($arg:tt)*) => {{
        $crate::__log::error!("[job {}] {}", $job, format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized, so
/// every test may call it unconditionally.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // reqwest/hyper are chatty at debug level.
    let config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
