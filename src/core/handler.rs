//! Handler trait for log output destinations

use super::{error::Result, log_entry::Entry};

/// A sink that receives dispatched entries.
///
/// For every entry routed to it, a handler sees the same three steps in
/// order: [`before_writing`](Handler::before_writing) on a private copy of
/// the entry, [`encode`](Handler::encode) of that copy, and
/// [`write`](Handler::write) of the resulting bytes. Handlers are shared
/// between threads and levels, so every method takes `&self`.
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    /// Annotate or reshape the entry before it is encoded.
    fn before_writing(&self, entry: &mut Entry) -> Result<()> {
        let _ = entry;
        Ok(())
    }

    /// Render the entry to bytes. Defaults to [`Entry::buffer`].
    fn encode(&self, entry: &Entry) -> Result<Vec<u8>> {
        entry.buffer()
    }

    fn write(&self, payload: &[u8]) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Release the handler's resources. Must be idempotent.
    fn close(&self) -> Result<()> {
        self.flush()
    }
}
