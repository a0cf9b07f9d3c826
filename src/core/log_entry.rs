//! Log entry structure
//!
//! An [`Entry`] is a value: every `with_*` call returns a new entry and
//! leaves the receiver untouched, so one base entry can feed any number of
//! log calls. Terminal methods (`info`, `error`, ...) also take `&self`;
//! they stamp the level, message and dispatch time on a copy and hand it to
//! the owning [`Logger`].

use super::duration::format_duration;
use super::error::Result;
use super::fields::{FieldValue, Fields};
use super::log_level::LogLevel;
use super::logger::Logger;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::fmt;
use std::time::Instant;

/// Name of the field set by [`Entry::with_error`]
pub const ERROR_FIELD: &str = "error";

/// Name of the field set by [`Entry::stop`]
pub const DURATION_FIELD: &str = "duration";

#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    #[serde(skip)]
    logger: Logger,
    #[serde(skip)]
    start: Option<Instant>,
    /// Handler-supplied output annotations, see [`Entry::str`]
    #[serde(skip)]
    output: Map<String, Value>,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub fields: Fields,
}

impl Entry {
    pub fn new(logger: &Logger) -> Self {
        Self::with_base_fields(logger.clone(), logger.default_fields().clone())
    }

    pub(crate) fn with_base_fields(logger: Logger, fields: Fields) -> Self {
        Self {
            logger,
            start: None,
            output: Map::new(),
            level: LogLevel::default(),
            message: String::new(),
            timestamp: Utc::now(),
            fields,
        }
    }

    /// Returns a new entry with `key` set to `value`
    #[must_use]
    pub fn with_field<K, V>(&self, key: K, value: V) -> Entry
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut entry = self.clone();
        entry.fields.insert(key, value);
        entry
    }

    /// Returns a new entry whose fields are the union of this entry's
    /// fields and `fields`, the latter winning on conflicts
    #[must_use]
    pub fn with_fields(&self, fields: &Fields) -> Entry {
        let mut entry = self.clone();
        entry.fields = self.fields.merged(fields);
        entry
    }

    /// Returns a new entry with the `error` field describing `err`.
    ///
    /// `None` returns an unchanged copy. The description includes the
    /// error's source chain, joined with `": "`.
    #[must_use]
    pub fn with_error<E: StdError>(&self, err: Option<E>) -> Entry {
        match err {
            Some(err) => self.with_field(ERROR_FIELD, error_detail(&err)),
            None => self.clone(),
        }
    }

    /// Returns an entry that remembers `message` and the current instant.
    /// Call [`stop`](Entry::stop) on it to log the elapsed time.
    #[must_use]
    pub fn trace(&self, message: impl Into<String>) -> Entry {
        let mut entry = self.clone();
        entry.message = message.into();
        entry.start = Some(Instant::now());
        entry
    }

    /// Like [`trace`](Entry::trace), but stops automatically when the
    /// returned guard goes out of scope.
    pub fn trace_scope(&self, message: impl Into<String>) -> TraceGuard {
        TraceGuard {
            entry: Some(self.trace(message)),
        }
    }

    /// Log the traced message at Info with a `duration` field.
    ///
    /// An entry that was never traced reports a zero duration.
    pub fn stop(&self) {
        let elapsed = self.start.map(|start| start.elapsed()).unwrap_or_default();
        self.with_field(DURATION_FIELD, format_duration(elapsed))
            .info(self.message.clone());
    }

    /// Dispatch a copy of this entry at `level`.
    ///
    /// Fatal and Panic close every handler and then terminate the process.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let mut entry = self.clone();
        entry.level = level;
        entry.message = message.into();
        entry.start = None;

        let logger = self.logger.clone();
        logger.dispatch(entry);
        if level.is_terminal() {
            logger.terminate();
        }
    }

    pub fn log_fmt(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        self.log(level, fmt::format(args));
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    /// Alias of [`info`](Entry::info)
    #[inline]
    pub fn print(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    /// Alias of [`info`](Entry::info)
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

    /// Log at Fatal, close all handlers and exit the process
    #[inline]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }

    /// Log at Panic, close all handlers and exit the process
    #[inline]
    pub fn panic(&self, message: impl Into<String>) {
        self.log(LogLevel::Panic, message);
    }

    /// Add a string annotation to the rendered output
    pub fn str(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.output.insert(key.into(), Value::String(value.into()));
        self
    }

    /// Add a small integer annotation to the rendered output
    pub fn uint8(&mut self, key: impl Into<String>, value: u8) -> &mut Self {
        self.output.insert(key.into(), Value::from(value));
        self
    }

    /// Annotations added through [`str`](Entry::str) and
    /// [`uint8`](Entry::uint8)
    pub fn annotations(&self) -> &Map<String, Value> {
        &self.output
    }

    /// Render the entry as one JSON object.
    ///
    /// Keys come from the annotations, then `message` (when non-empty),
    /// then the fields. An earlier source wins when a key repeats.
    pub fn buffer(&self) -> Result<Vec<u8>> {
        let mut object = self.output.clone();
        if !self.message.is_empty() {
            object
                .entry("message")
                .or_insert_with(|| Value::String(self.message.clone()));
        }
        for (key, value) in self.fields.iter() {
            object
                .entry(key)
                .or_insert_with(|| value.to_json_value());
        }
        Ok(serde_json::to_vec(&Value::Object(object))?)
    }
}

/// Emits the traced entry when dropped.
///
/// # Example
///
/// ```
/// use rust_field_logger::Logger;
///
/// let logger = Logger::new();
/// {
///     let _timer = logger.with_field("job", "reindex").trace_scope("reindexing");
///     // ... work ...
/// } // logs "reindexing" at Info with a `duration` field
/// ```
#[must_use = "the trace is logged when the guard is dropped"]
pub struct TraceGuard {
    entry: Option<Entry>,
}

impl TraceGuard {
    /// Stop the trace now instead of at the end of the scope
    pub fn stop(mut self) {
        if let Some(entry) = self.entry.take() {
            entry.stop();
        }
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            entry.stop();
        }
    }
}

/// Display text of `err` followed by each cause, joined with `": "`
pub(crate) fn error_detail(err: &dyn StdError) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}
