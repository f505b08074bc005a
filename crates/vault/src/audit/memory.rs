//! [`MemoryAuditSink`]: bounded in-process audit buffer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{AuditEntry, AuditSink};

/// Mutex-guarded ring buffer of the most recent audit entries.
///
/// Used when no external sink is configured, and by tests. When full, the
/// oldest entry is evicted. Clones share the same buffer.
#[derive(Clone, Debug)]
pub struct MemoryAuditSink {
    inner: Arc<Mutex<VecDeque<AuditEntry>>>,
    capacity: usize,
}

impl MemoryAuditSink {
    /// Create an empty buffer holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    /// Snapshot of the buffered entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().iter().cloned().collect()
    }

    /// The `limit` most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let buf = self.lock();
        let skip = buf.len().saturating_sub(limit);
        buf.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        // Appends cannot leave the deque half-written, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        let mut buf = self.lock();
        if buf.len() == self.capacity {
            buf.pop_front();
        }
        buf.push_back(entry);
    }
}
