//! # Rust Field Logger
//!
//! A structured logging library built around immutable, field-carrying
//! entries and per-level handler dispatch.
//!
//! ## Features
//!
//! - **Structured Fields**: Entries carry key/value fields; adding a field
//!   returns a new entry and never changes the original
//! - **Per-Level Handlers**: Each level has its own handler list, so errors
//!   can go to a collector while debug output stays local
//! - **Failure Isolation**: A failing or panicking handler never stops the
//!   others or the caller
//! - **Network Shipping**: GELF records over TCP or UDP with automatic
//!   background reconnection
//! - **Timing**: `trace`/`stop` measure and log how long an operation took
//!
//! ## Example
//!
//! ```
//! use rust_field_logger::prelude::*;
//! use std::sync::Arc;
//!
//! let memory = Arc::new(MemoryHandler::new());
//! let logger = Logger::builder()
//!     .default_field("service", "billing")
//!     .handler(memory.clone(), &LogLevel::ALL)
//!     .build();
//!
//! logger.with_field("invoice", 1042).info("invoice sent");
//! assert_eq!(memory.len(), 1);
//! ```

pub mod core;
pub mod handlers;
pub mod macros;

pub mod prelude {
    pub use crate::core::{
        Entry, FieldValue, Fields, Handler, HandlerRef, LogLevel, Logger, LoggerBuilder,
        LoggerError, LoggerMetrics, Result, TraceGuard,
    };
    pub use crate::handlers::{MemoryHandler, NetworkHandler};
}

pub use crate::core::{
    format_duration, Entry, FieldValue, Fields, Handler, HandlerErrorCallback, HandlerRef,
    HandlerRegistry, LogLevel, Logger, LoggerBuilder, LoggerError, LoggerMetrics, Result,
    TerminateCallback, TraceGuard, DURATION_FIELD, ERROR_FIELD, TERMINATE_EXIT_CODE,
};
pub use crate::handlers::{ConnectionState, MemoryHandler, NetworkHandler, NetworkHandlerBuilder};
