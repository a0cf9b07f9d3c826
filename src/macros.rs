//! Logging macros with `format!`-style arguments.
//!
//! Every macro takes a [`Logger`](crate::Logger) or an
//! [`Entry`](crate::Entry) as its first argument, so fields attached to an
//! entry travel with the formatted message.
//!
//! # Examples
//!
//! ```
//! use rust_field_logger::prelude::*;
//! use rust_field_logger::{info, warn};
//!
//! let logger = Logger::new();
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! let request = logger.with_field("request_id", "a1b2");
//! warn!(request, "slow response: {}ms", 950);
//! ```

/// Log a formatted message at the given level.
///
/// # Examples
///
/// ```
/// # use rust_field_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_field_logger::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($target:expr, $level:expr, $($arg:tt)+) => {
        $target.log_fmt($level, format_args!($($arg)+))
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($target:expr, $($arg:tt)+) => {
        $crate::log!($target, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use rust_field_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_field_logger::info;
/// info!(logger, "User {} logged in", "alice");
/// ```
#[macro_export]
macro_rules! info {
    ($target:expr, $($arg:tt)+) => {
        $crate::log!($target, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($target:expr, $($arg:tt)+) => {
        $crate::log!($target, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! error {
    ($target:expr, $($arg:tt)+) => {
        $crate::log!($target, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message, then close the logger and terminate.
#[macro_export]
macro_rules! fatal {
    ($target:expr, $($arg:tt)+) => {
        $crate::log!($target, $crate::LogLevel::Fatal, $($arg)+)
    };
}

/// Build a [`Fields`](crate::Fields) set from `key => value` pairs.
///
/// # Examples
///
/// ```
/// use rust_field_logger::fields;
///
/// let fields = fields! { "user" => "alice", "attempts" => 3 };
/// assert_eq!(fields.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $(fields.insert($key, $value);)+
        fields
    }};
}
