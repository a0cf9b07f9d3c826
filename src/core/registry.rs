//! Per-level handler registry
//!
//! Registration is append-only and rare; lookups happen on every dispatch.
//! Each level keeps its handlers in an immutable shared slice, so a lookup
//! holds the read lock only long enough to clone one `Arc`. Registration
//! rebuilds the affected slices under the write lock.

use super::handler::Handler;
use super::log_level::LogLevel;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared handle to a registered handler
pub type HandlerRef = Arc<dyn Handler>;

pub struct HandlerRegistry {
    levels: RwLock<[Arc<[HandlerRef]>; LogLevel::COUNT]>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            levels: RwLock::new(std::array::from_fn(|_| Arc::from(Vec::<HandlerRef>::new()))),
        }
    }

    /// Subscribe `handler` to each of `levels`, after any handler already
    /// registered there. Duplicate levels in the slice are ignored.
    pub fn register(&self, handler: HandlerRef, levels: &[LogLevel]) {
        let mut table = self.levels.write();
        let mut seen = [false; LogLevel::COUNT];

        for level in levels {
            let idx = level.index();
            if seen[idx] {
                continue;
            }
            seen[idx] = true;

            let mut handlers = table[idx].to_vec();
            handlers.push(Arc::clone(&handler));
            table[idx] = Arc::from(handlers);
        }
    }

    /// Handlers subscribed to `level`, in registration order
    pub fn handlers_for(&self, level: LogLevel) -> Arc<[HandlerRef]> {
        Arc::clone(&self.levels.read()[level.index()])
    }

    /// Every registered handler exactly once, ordered by first level seen
    pub fn unique_handlers(&self) -> Vec<HandlerRef> {
        let table = self.levels.read();
        let mut unique: Vec<HandlerRef> = Vec::new();

        for handler in table.iter().flat_map(|slot| slot.iter()) {
            if !unique.iter().any(|known| Arc::ptr_eq(known, handler)) {
                unique.push(Arc::clone(handler));
            }
        }
        unique
    }

    /// Total number of (level, handler) subscriptions
    pub fn len(&self) -> usize {
        self.levels.read().iter().map(|slot| slot.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
