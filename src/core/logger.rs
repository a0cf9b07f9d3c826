//! Main logger implementation
//!
//! A [`Logger`] owns the handler registry and the default fields every new
//! entry starts from. Dispatch is synchronous: a log call returns once every
//! handler subscribed to the entry's level has processed it. A slow handler
//! therefore slows the calling thread; handlers that talk to the outside
//! world are expected to bound their own I/O.

use super::{
    error::LoggerError,
    fields::{FieldValue, Fields},
    handler::Handler,
    log_entry::{error_detail, Entry, TraceGuard},
    log_level::LogLevel,
    metrics::LoggerMetrics,
    registry::{HandlerRef, HandlerRegistry},
};
use chrono::Utc;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Callback receiving the handler name and the error it produced
pub type HandlerErrorCallback = Arc<dyn Fn(&str, &LoggerError) + Send + Sync>;

/// Callback invoked after a Fatal or Panic entry has been dispatched and all
/// handlers closed. The default exits the process.
pub type TerminateCallback = Arc<dyn Fn(i32) + Send + Sync>;

/// Exit code used after a Fatal or Panic entry
pub const TERMINATE_EXIT_CODE: i32 = 1;

struct LoggerInner {
    registry: HandlerRegistry,
    default_fields: Fields,
    metrics: LoggerMetrics,
    on_handler_error: HandlerErrorCallback,
    on_terminate: TerminateCallback,
}

/// Cheaply cloneable handle to a logger. Clones share handlers, default
/// fields and metrics.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Subscribe `handler` to `levels`. Safe to call while other threads log.
    pub fn register(&self, handler: HandlerRef, levels: &[LogLevel]) {
        self.inner.registry.register(handler, levels);
    }

    /// Fields every new entry starts with
    pub fn default_fields(&self) -> &Fields {
        &self.inner.default_fields
    }

    /// A fresh entry carrying the default fields
    pub fn entry(&self) -> Entry {
        Entry::new(self)
    }

    #[must_use]
    pub fn with_field<K, V>(&self, key: K, value: V) -> Entry
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.entry().with_field(key, value)
    }

    #[must_use]
    pub fn with_fields(&self, fields: &Fields) -> Entry {
        self.entry().with_fields(fields)
    }

    #[must_use]
    pub fn with_error<E: StdError>(&self, err: Option<E>) -> Entry {
        self.entry().with_error(err)
    }

    #[must_use]
    pub fn trace(&self, message: impl Into<String>) -> Entry {
        self.entry().trace(message)
    }

    pub fn trace_scope(&self, message: impl Into<String>) -> TraceGuard {
        self.entry().trace_scope(message)
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.entry().log(level, message);
    }

    pub fn log_fmt(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        self.entry().log_fmt(level, args);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn print(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn println(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }

    #[inline]
    pub fn panic(&self, message: impl Into<String>) {
        self.log(LogLevel::Panic, message);
    }

    /// Route a finalized entry to every handler subscribed to its level.
    ///
    /// The timestamp is set here. Each handler works on its own copy of the
    /// entry, so annotations added by one handler are invisible to the
    /// next.
    ///
    /// **Per-Handler Isolation**: an error or panic in one handler is
    /// reported through the error callback and counted; the remaining
    /// handlers still run.
    pub fn dispatch(&self, mut entry: Entry) {
        entry.timestamp = Utc::now();
        self.inner.metrics.record_dispatched();

        let handlers = self.inner.registry.handlers_for(entry.level);
        for handler in handlers.iter() {
            self.inner.metrics.record_invocation();

            let mut snapshot = entry.clone();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                Self::run_handler(handler.as_ref(), &mut snapshot)
            }));

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.inner.metrics.record_failure();
                    (self.inner.on_handler_error)(handler.name(), &e);
                }
                Err(panic_info) => {
                    self.inner.metrics.record_panic();
                    let err = LoggerError::handler_panicked(
                        handler.name(),
                        panic_message(panic_info.as_ref()),
                    );
                    (self.inner.on_handler_error)(handler.name(), &err);
                }
            }
        }
    }

    fn run_handler(handler: &dyn Handler, entry: &mut Entry) -> super::error::Result<()> {
        handler.before_writing(entry)?;
        let payload = handler.encode(entry)?;
        handler.write(&payload)
    }

    /// Flush every registered handler once.
    ///
    /// All handlers are attempted; the first error is returned.
    pub fn flush(&self) -> super::error::Result<()> {
        let mut first_error = None;
        for handler in self.inner.registry.unique_handlers() {
            if let Err(e) = handler.flush() {
                eprintln!("[LOGGER ERROR] Handler '{}' flush failed: {}", handler.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Close every registered handler once.
    ///
    /// All handlers are attempted; the first error is returned.
    pub fn close(&self) -> super::error::Result<()> {
        let mut first_error = None;
        for handler in self.inner.registry.unique_handlers() {
            if let Err(e) = handler.close() {
                eprintln!("[LOGGER ERROR] Handler '{}' close failed: {}", handler.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Close all handlers, then hand control to the terminate callback
    pub(crate) fn terminate(&self) {
        let _ = self.close();
        (self.inner.on_terminate)(TERMINATE_EXIT_CODE);
    }

    /// Get the logger metrics for detailed observability
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.inner.metrics
    }

    /// Number of (level, handler) subscriptions
    pub fn handler_count(&self) -> usize {
        self.inner.registry.len()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("handlers", &self.inner.registry.len())
            .field("default_fields", &self.inner.default_fields)
            .finish()
    }
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

fn default_error_callback() -> HandlerErrorCallback {
    Arc::new(|name, err| {
        eprintln!("[LOGGER ERROR] Handler '{}' failed: {}", name, error_detail(err));
    })
}

fn default_terminate_callback() -> TerminateCallback {
    Arc::new(|code| std::process::exit(code))
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use rust_field_logger::prelude::*;
/// use std::sync::Arc;
///
/// let memory = Arc::new(MemoryHandler::new());
/// let logger = Logger::builder()
///     .default_field("service", "billing")
///     .handler(memory.clone(), &LogLevel::ALL)
///     .on_handler_error(Arc::new(|name, err| {
///         eprintln!("ALERT: handler {} failed: {}", name, err);
///     }))
///     .build();
///
/// logger.info("ready");
/// assert_eq!(memory.len(), 1);
/// ```
pub struct LoggerBuilder {
    default_fields: Fields,
    handlers: Vec<(HandlerRef, Vec<LogLevel>)>,
    on_handler_error: Option<HandlerErrorCallback>,
    on_terminate: Option<TerminateCallback>,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            default_fields: Fields::new(),
            handlers: Vec::new(),
            on_handler_error: None,
            on_terminate: None,
        }
    }

    /// Add a field every entry starts with
    #[must_use = "builder methods return a new value"]
    pub fn default_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.default_fields.insert(key, value);
        self
    }

    /// Merge `fields` into the defaults
    #[must_use = "builder methods return a new value"]
    pub fn default_fields(mut self, fields: &Fields) -> Self {
        self.default_fields = self.default_fields.merged(fields);
        self
    }

    /// Register a handler for the given levels
    #[must_use = "builder methods return a new value"]
    pub fn handler(mut self, handler: HandlerRef, levels: &[LogLevel]) -> Self {
        self.handlers.push((handler, levels.to_vec()));
        self
    }

    /// Set the callback for handler failures
    ///
    /// The default prints the failure to standard error.
    #[must_use = "builder methods return a new value"]
    pub fn on_handler_error(mut self, callback: HandlerErrorCallback) -> Self {
        self.on_handler_error = Some(callback);
        self
    }

    /// Replace process exit after Fatal/Panic entries
    #[must_use = "builder methods return a new value"]
    pub fn on_terminate(mut self, callback: TerminateCallback) -> Self {
        self.on_terminate = Some(callback);
        self
    }

    /// Build the Logger
    pub fn build(self) -> Logger {
        let logger = Logger {
            inner: Arc::new(LoggerInner {
                registry: HandlerRegistry::new(),
                default_fields: self.default_fields,
                metrics: LoggerMetrics::new(),
                on_handler_error: self.on_handler_error.unwrap_or_else(default_error_callback),
                on_terminate: self.on_terminate.unwrap_or_else(default_terminate_callback),
            }),
        };

        for (handler, levels) in self.handlers {
            logger.register(handler, &levels);
        }

        logger
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Create a builder for Logger
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Result;
    use crate::handlers::MemoryHandler;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

    struct Failing;

    impl Handler for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn write(&self, _payload: &[u8]) -> Result<()> {
            Err(LoggerError::other("Simulated failure"))
        }
    }

    struct Panicking;

    impl Handler for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn write(&self, _payload: &[u8]) -> Result<()> {
            panic!("handler exploded");
        }
    }

    #[test]
    fn test_builder_basic() {
        let logger = Logger::builder().default_field("service", "api").build();
        assert_eq!(logger.handler_count(), 0);
        assert_eq!(logger.default_fields().len(), 1);
    }

    #[test]
    fn test_routing_is_per_level() {
        let memory = Arc::new(MemoryHandler::new());
        let logger = Logger::builder()
            .handler(memory.clone(), &[LogLevel::Error])
            .build();

        logger.info("a");
        logger.error("b");

        let records = memory.records();
        assert_eq!(records.len(), 1);
        let json: serde_json::Value = serde_json::from_slice(&records[0]).unwrap();
        assert_eq!(json["message"], "b");
    }

    #[test]
    fn test_failure_does_not_stop_later_handlers() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = Arc::clone(&errors);
        let memory = Arc::new(MemoryHandler::new());

        let logger = Logger::builder()
            .handler(Arc::new(Failing), &[LogLevel::Info])
            .handler(Arc::new(Panicking), &[LogLevel::Info])
            .handler(memory.clone(), &[LogLevel::Info])
            .on_handler_error(Arc::new(move |name, err| {
                errors_clone.lock().push(format!("{}: {}", name, err));
            }))
            .build();

        logger.info("still delivered");

        assert_eq!(memory.len(), 1);
        let errors = errors.lock();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("failing"));
        assert!(errors[1].contains("handler exploded"));

        let metrics = logger.metrics();
        assert_eq!(metrics.handler_invocations(), 3);
        assert_eq!(metrics.handler_failures(), 2);
        assert_eq!(metrics.handler_panics(), 1);
    }

    #[test]
    fn test_fatal_closes_handlers_before_terminating() {
        struct CloseTracker {
            closed: Arc<AtomicUsize>,
        }

        impl Handler for CloseTracker {
            fn name(&self) -> &str {
                "tracker"
            }

            fn write(&self, _payload: &[u8]) -> Result<()> {
                Ok(())
            }

            fn close(&self) -> Result<()> {
                self.closed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let closed = Arc::new(AtomicUsize::new(0));
        let closed_at_exit = Arc::new(AtomicUsize::new(usize::MAX));
        let exit_code = Arc::new(AtomicI32::new(0));

        let closed_seen = Arc::clone(&closed);
        let closed_at_exit_clone = Arc::clone(&closed_at_exit);
        let exit_code_clone = Arc::clone(&exit_code);

        let logger = Logger::builder()
            .handler(
                Arc::new(CloseTracker {
                    closed: Arc::clone(&closed),
                }),
                &LogLevel::ALL,
            )
            .on_terminate(Arc::new(move |code| {
                closed_at_exit_clone.store(closed_seen.load(Ordering::SeqCst), Ordering::SeqCst);
                exit_code_clone.store(code, Ordering::SeqCst);
            }))
            .build();

        logger.fatal("shutting down");

        // Registered on every level, closed exactly once
        assert_eq!(closed_at_exit.load(Ordering::SeqCst), 1);
        assert_eq!(exit_code.load(Ordering::SeqCst), TERMINATE_EXIT_CODE);
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "Unknown panic");
    }
}
