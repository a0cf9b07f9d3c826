//! Logger metrics for observability
//!
//! Provides counters for monitoring dispatch health: how many entries were
//! dispatched, how many handler invocations ran, and how many of those
//! failed or panicked.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// # Example
///
/// ```
/// use rust_field_logger::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
///
/// metrics.record_dispatched();
/// metrics.record_invocation();
/// metrics.record_failure();
///
/// assert_eq!(metrics.dispatched_count(), 1);
/// assert_eq!(metrics.handler_failures(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Number of entries handed to the dispatcher
    dispatched: AtomicU64,

    /// Number of individual handler invocations
    invocations: AtomicU64,

    /// Number of handler invocations that returned an error
    failures: AtomicU64,

    /// Number of handler invocations that panicked
    panics: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            dispatched: AtomicU64::new(0),
            invocations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            panics: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn handler_invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Get the number of failed handler invocations (panics included)
    #[inline]
    pub fn handler_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn handler_panics(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dispatched(&self) -> u64 {
        self.dispatched.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_invocation(&self) -> u64 {
        self.invocations.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failure(&self) -> u64 {
        self.failures.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a handler panic. Panics also count as failures.
    #[inline]
    pub fn record_panic(&self) -> u64 {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.panics.fetch_add(1, Ordering::Relaxed)
    }

    /// Failed invocations as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if no handler has run yet.
    pub fn failure_rate(&self) -> f64 {
        let invocations = self.handler_invocations() as f64;
        if invocations == 0.0 {
            0.0
        } else {
            (self.handler_failures() as f64 / invocations) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.dispatched.store(0, Ordering::Relaxed);
        self.invocations.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.panics.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            dispatched: AtomicU64::new(self.dispatched_count()),
            invocations: AtomicU64::new(self.handler_invocations()),
            failures: AtomicU64::new(self.handler_failures()),
            panics: AtomicU64::new(self.handler_panics()),
        }
    }
}
