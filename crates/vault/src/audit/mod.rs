//! Append-only audit trail of every cryptographic access.
//!
//! The vault emits one [`AuditEntry`] per encrypt, decrypt, redact, or denied
//! access. Entries go to an injected [`AuditSink`]; the core never reads,
//! mutates, or deletes them.
//!
//! # Audit invariants
//!
//! - **No plaintext, ciphertext, or key material** in any entry.
//! - Recording never blocks on I/O: sinks either buffer in memory or hand off
//!   to a background writer.

pub mod channel;
pub mod memory;

pub use channel::ChannelAuditSink;
pub use memory::MemoryAuditSink;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of cryptographic operation attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    Encrypt,
    Decrypt,
    Redact,
}

/// Coarse reason an operation failed. Never carries the offending value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The actor's role is not on the privileged allow-list.
    Unauthorized,
    /// Authentication failed or the stored value was malformed.
    DecryptFailed,
    /// The envelope names a key version that is not loaded.
    UnknownVersion,
    /// Encryption failed.
    EncryptFailed,
}

/// Immutable record of one operation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub operation: AuditOperation,
    /// What was touched, e.g. `"routing_number"` or `"banking_record"`.
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_role: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    /// Key version involved, when a key was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_class: Option<FailureClass>,
}

impl AuditEntry {
    /// A successful entry stamped with a fresh id and the current time.
    pub fn new(operation: AuditOperation, data_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            data_type: data_type.into(),
            actor_id: None,
            actor_role: None,
            timestamp: Utc::now(),
            success: true,
            version: None,
            failure_class: None,
        }
    }

    pub fn with_actor(mut self, actor: Option<&Actor>) -> Self {
        if let Some(actor) = actor {
            self.actor_id = Some(actor.id.clone());
            self.actor_role = Some(actor.role.clone());
        }
        self
    }

    pub fn with_version(mut self, version: Option<&str>) -> Self {
        self.version = version.map(str::to_owned);
        self
    }

    /// Mark the entry as a failure of the given class.
    pub fn failed(mut self, class: FailureClass) -> Self {
        self.success = false;
        self.failure_class = Some(class);
        self
    }
}

/// Identity of the caller, as asserted by the surrounding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }
}

/// Destination for audit entries.
///
/// Implementations must accept concurrent calls from many threads and must
/// not block the caller on I/O.
#[cfg_attr(test, mockall::automock)]
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Cheaply cloneable handle to the configured [`AuditSink`].
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// An audit log backed by a fresh [`MemoryAuditSink`], returned alongside
    /// it so the buffer can be queried.
    pub fn in_memory(capacity: usize) -> (Self, MemoryAuditSink) {
        let buffer = MemoryAuditSink::new(capacity);
        (Self::new(Arc::new(buffer.clone())), buffer)
    }

    /// Append an entry.
    pub fn record(&self, entry: AuditEntry) {
        self.sink.record(entry);
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuditLog")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_is_successful_and_anonymous() {
        let entry = AuditEntry::new(AuditOperation::Redact, "banking_record");
        assert!(entry.success);
        assert!(entry.actor_id.is_none());
        assert!(entry.failure_class.is_none());
    }

    #[test]
    fn failed_sets_class() {
        let actor = Actor::new("u-7", "viewer");
        let entry = AuditEntry::new(AuditOperation::Decrypt, "routing_number")
            .with_actor(Some(&actor))
            .failed(FailureClass::Unauthorized);
        assert!(!entry.success);
        assert_eq!(entry.failure_class, Some(FailureClass::Unauthorized));
        assert_eq!(entry.actor_role.as_deref(), Some("viewer"));
    }

    #[test]
    fn serialises_snake_case_and_skips_empty_fields() {
        let entry = AuditEntry::new(AuditOperation::Decrypt, "account_number")
            .with_version(Some("v1"))
            .failed(FailureClass::DecryptFailed);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["operation"], "decrypt");
        assert_eq!(json["failure_class"], "decrypt_failed");
        assert_eq!(json["version"], "v1");
        assert!(json.get("actor_id").is_none());
    }

    #[test]
    fn log_forwards_to_sink() {
        let mut sink = MockAuditSink::new();
        sink.expect_record()
            .withf(|e| e.operation == AuditOperation::Encrypt)
            .times(1)
            .return_const(());
        let log = AuditLog::new(Arc::new(sink));
        log.record(AuditEntry::new(AuditOperation::Encrypt, "field"));
    }
}
