//! Core logger types and traits

pub mod duration;
pub mod error;
pub mod fields;
pub mod handler;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod registry;

pub use duration::format_duration;
pub use error::{LoggerError, Result};
pub use fields::{FieldValue, Fields};
pub use handler::Handler;
pub use log_entry::{Entry, TraceGuard, DURATION_FIELD, ERROR_FIELD};
pub use log_level::LogLevel;
pub use logger::{
    HandlerErrorCallback, Logger, LoggerBuilder, TerminateCallback, TERMINATE_EXIT_CODE,
};
pub use metrics::LoggerMetrics;
pub use registry::{HandlerRef, HandlerRegistry};
