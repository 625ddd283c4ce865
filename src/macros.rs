// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging macros for convenient logging

/// Log a formatted message with trace severity
///
/// # Examples
/// ```ignore
/// log_trace!(logger, "admitted ticket {}", ticket);
/// ```
#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::Severity::Trace, ::core::format_args!($($arg)*))
    };
}

/// Log a formatted message with debug severity
///
/// # Examples
/// ```ignore
/// log_debug!(logger, "batch of {} records", count);
/// ```
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::Severity::Debug, ::core::format_args!($($arg)*))
    };
}

/// Log a formatted message with info severity
///
/// # Examples
/// ```ignore
/// log_info!(logger, "worker {} started\n", id);
/// ```
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::Severity::Info, ::core::format_args!($($arg)*))
    };
}

/// Log a formatted message with warn severity
///
/// # Examples
/// ```ignore
/// log_warn!(logger, "ring occupancy high: {}\n", len);
/// ```
#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::Severity::Warn, ::core::format_args!($($arg)*))
    };
}

/// Log a formatted message with error severity
///
/// # Examples
/// ```ignore
/// log_error!(logger, "bind failed: {}\n", err);
/// ```
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::Severity::Error, ::core::format_args!($($arg)*))
    };
}

/// Log a formatted message with fatal severity
///
/// # Examples
/// ```ignore
/// log_fatal!(logger, "giving up: {}\n", err);
/// ```
#[macro_export]
macro_rules! log_fatal {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::Severity::Fatal, ::core::format_args!($($arg)*))
    };
}
