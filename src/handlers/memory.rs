//! In-memory handler that keeps every payload, mainly for tests

use crate::core::{Entry, Handler, Result};
use parking_lot::Mutex;

/// Captures rendered payloads so they can be inspected after logging.
///
/// Each entry gets a `level` annotation with the level name before it is
/// rendered. `flush` discards what was captured; `close` keeps it, so
/// records stay readable after the logger shuts down.
#[derive(Debug, Default)]
pub struct MemoryHandler {
    records: Mutex<Vec<Vec<u8>>>,
}

impl MemoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of all captured payloads, oldest first
    pub fn records(&self) -> Vec<Vec<u8>> {
        self.records.lock().clone()
    }

    pub fn last(&self) -> Option<Vec<u8>> {
        self.records.lock().last().cloned()
    }

    /// Captured payloads parsed as JSON. Payloads that are not valid JSON
    /// are skipped.
    pub fn json_records(&self) -> Vec<serde_json::Value> {
        self.records
            .lock()
            .iter()
            .filter_map(|payload| serde_json::from_slice(payload).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Handler for MemoryHandler {
    fn name(&self) -> &str {
        "memory"
    }

    fn before_writing(&self, entry: &mut Entry) -> Result<()> {
        let level = entry.level.to_str();
        entry.str("level", level);
        Ok(())
    }

    fn write(&self, payload: &[u8]) -> Result<()> {
        self.records.lock().push(payload.to_vec());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
