//! [`ChannelAuditSink`]: hands entries to a background writer task.
//!
//! The hot path only performs a non-blocking `try_send`; a slow log backend
//! fills the queue and causes drops, never stalls encryption.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

use super::{AuditEntry, AuditSink};

/// Bounded queue feeding an async writer that emits each entry as a
/// structured `tracing` event on target `audit`.
#[derive(Clone, Debug)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEntry>,
    dropped: Arc<AtomicU64>,
}

impl ChannelAuditSink {
    /// Spawn the writer task on the current Tokio runtime.
    ///
    /// The task exits once every clone of the returned sink is dropped and the
    /// queue has drained, yielding the final count of dropped entries.
    pub fn spawn(capacity: usize) -> (Self, tokio::task::JoinHandle<u64>) {
        let (tx, mut rx) = mpsc::channel::<AuditEntry>(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&dropped);
        let handle = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                write_entry(&entry);
            }
            counter.load(Ordering::Relaxed)
        });
        (Self { tx, dropped }, handle)
    }

    /// Number of entries discarded because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, entry: AuditEntry) {
        match self.tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(audit_id = %entry.id, dropped_total = total, "audit queue full; entry dropped");
            }
            Err(TrySendError::Closed(entry)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(audit_id = %entry.id, dropped_total = total, "audit writer stopped; entry dropped");
            }
        }
    }
}

fn write_entry(entry: &AuditEntry) {
    info!(
        target: "audit",
        audit_id = %entry.id,
        operation = ?entry.operation,
        data_type = %entry.data_type,
        actor_id = entry.actor_id.as_deref(),
        actor_role = entry.actor_role.as_deref(),
        timestamp = %entry.timestamp.to_rfc3339(),
        success = entry.success,
        version = entry.version.as_deref(),
        failure_class = ?entry.failure_class,
        "audit"
    );
}
