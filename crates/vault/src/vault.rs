//! [`FieldVault`]: the consumer API the surrounding CRUD layer calls.
//!
//! Every operation here records audit entries; the lower layers
//! ([`crate::crypto`], [`crate::migration`], [`crate::redact`]) are pure.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::access::{AccessDecision, AccessGate};
use crate::audit::{Actor, AuditEntry, AuditLog, AuditOperation, FailureClass};
use crate::crypto::{self, envelope};
use crate::error::VaultError;
use crate::keyring::KeyRing;
use crate::migration::{self, DecryptOptions, MigrationError, MigrationReport};
use crate::record::FieldSchema;
use crate::redact;

/// Audit data type for standalone field encryption.
pub const FIELD_DATA_TYPE: &str = "field";

/// Audit data type for whole-record operations.
pub const RECORD_DATA_TYPE: &str = "banking_record";

/// Operation name the access gate evaluates for privileged reads.
pub const DECRYPT_RECORD_OPERATION: &str = "decrypt_record";

/// Plaintext view of a record returned by
/// [`FieldVault::decrypt_record_privileged`].
#[derive(Clone, PartialEq)]
pub struct PrivilegedRead {
    pub record: Value,
    /// `true` if any field was not a current-version envelope.
    pub needs_migration: bool,
    /// Re-encrypted copy of the stored record, when `auto_migrate` was set and
    /// at least one field was re-encrypted. Fields that fell back to
    /// plaintext keep their stored value. The caller persists it.
    pub migrated_record: Option<Value>,
}

impl std::fmt::Debug for PrivilegedRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegedRead")
            .field("record", &"[REDACTED]")
            .field("needs_migration", &self.needs_migration)
            .field("migrated_record", &self.migrated_record.is_some())
            .finish()
    }
}

/// Encryption, redaction, privileged decryption, and migration of banking
/// credential fields.
///
/// Cheap to clone; all clones share the key ring, schema, and audit sink.
#[derive(Debug, Clone)]
pub struct FieldVault {
    keyring: KeyRing,
    schema: Arc<FieldSchema>,
    gate: AccessGate,
    audit: AuditLog,
}

impl FieldVault {
    /// A vault whose access gate admits every privileged role.
    pub fn new(keyring: KeyRing, schema: FieldSchema, audit: AuditLog) -> Self {
        Self {
            gate: AccessGate::new(audit.clone()),
            keyring,
            schema: Arc::new(schema),
            audit,
        }
    }

    /// Replace the access gate.
    pub fn with_gate(mut self, gate: AccessGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn keyring(&self) -> &KeyRing {
        &self.keyring
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Run the access gate for an arbitrary privileged `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Unauthorized`] (already audited) for a role
    /// outside the allow-list.
    pub fn authorize(&self, actor_id: &str, actor_role: &str, operation: &str) -> Result<AccessDecision, VaultError> {
        Ok(self.gate.authorize(actor_id, actor_role, operation)?)
    }

    /// Encrypt one value under the current key, returning its
    /// `enc:<version>:<base64>` envelope string.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Encrypt`] for an empty value or an AEAD failure.
    pub fn encrypt_field(&self, plaintext: &str) -> Result<String, VaultError> {
        self.seal(plaintext, FIELD_DATA_TYPE, None)
    }

    /// Mask every sensitive field for display. Never decrypts, never fails.
    pub fn redact_record(&self, record: &Value, actor: Option<&Actor>) -> Value {
        let redacted = redact::redact_record(record, &self.schema);
        self.audit
            .record(AuditEntry::new(AuditOperation::Redact, RECORD_DATA_TYPE).with_actor(actor));
        redacted
    }

    /// Decrypt every sensitive field of `record` for a privileged actor.
    ///
    /// The role check runs first; a denied actor never reaches the key ring.
    /// Plaintext and undecryptable legacy-looking values pass through and
    /// flag the record for migration.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Unauthorized`] for a role outside the allow-list,
    /// and [`VaultError::Decrypt`] / [`VaultError::Key`] if a versioned
    /// envelope is tampered, malformed, or names a key that is not loaded.
    pub fn decrypt_record_privileged(
        &self,
        record: &Value,
        actor_id: &str,
        actor_role: &str,
        options: DecryptOptions,
    ) -> Result<PrivilegedRead, VaultError> {
        self.gate.authorize(actor_id, actor_role, DECRYPT_RECORD_OPERATION)?;
        let actor = Actor::new(actor_id, actor_role);

        let mut plain = record.clone();
        let mut needs_migration = false;
        let mut replacements: Vec<Option<String>> = Vec::new();

        self.schema.try_for_each_mut(&mut plain, |path, kind, value| {
            let entry = AuditEntry::new(AuditOperation::Decrypt, kind.data_type()).with_actor(Some(&actor));
            match migration::decrypt_with_migration(value, &self.keyring, options) {
                Ok(field) => {
                    let entry = entry.with_version(field.version.as_deref());
                    self.audit.record(if field.fell_back {
                        entry.failed(FailureClass::DecryptFailed)
                    } else {
                        entry
                    });
                    if field.migrated.is_some() {
                        self.audit.record(
                            AuditEntry::new(AuditOperation::Encrypt, kind.data_type())
                                .with_actor(Some(&actor))
                                .with_version(Some(self.keyring.current_version())),
                        );
                    }
                    needs_migration |= field.needs_migration;
                    replacements.push(field.migrated);
                    *value = field.plaintext;
                    Ok(())
                }
                Err(e) => {
                    warn!(field = path, error = %e, "privileged decryption failed");
                    self.audit.record(entry.failed(e.failure_class()));
                    Err(e)
                }
            }
        })?;

        let migrated_record = if replacements.iter().any(Option::is_some) {
            // Same schema, same input: the traversal visits fields in the same order.
            let mut migrated = record.clone();
            let mut replacements = replacements.into_iter();
            self.schema.for_each_mut(&mut migrated, |_, _, value| {
                if let Some(Some(envelope)) = replacements.next() {
                    *value = envelope;
                }
            });
            Some(migrated)
        } else {
            None
        };

        info!(actor_id, needs_migration, "privileged record read");
        Ok(PrivilegedRead {
            record: plain,
            needs_migration,
            migrated_record,
        })
    }

    /// Re-encrypt every sensitive field not already in current-version form.
    ///
    /// Idempotent. On failure the caller's record is unchanged and the error
    /// is returned, never swallowed.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Migration`] naming the first field that could not
    /// be migrated.
    pub fn migrate_record(&self, record: &Value) -> Result<(Value, MigrationReport), VaultError> {
        match migration::migrate_record(record, &self.schema, &self.keyring) {
            Ok((migrated, report)) => {
                for field in &report.fields {
                    let entry = AuditEntry::new(AuditOperation::Encrypt, field.kind.data_type())
                        .with_version(Some(self.keyring.current_version()));
                    self.audit.record(entry);
                }
                if !report.is_empty() {
                    info!(fields = report.fields.len(), "record migrated to current key version");
                }
                Ok((migrated, report))
            }
            Err(e) => {
                warn!(field = e.path(), error = %e, "record migration failed");
                let operation = match e {
                    MigrationError::Encrypt { .. } => AuditOperation::Encrypt,
                    _ => AuditOperation::Decrypt,
                };
                let err = VaultError::from(e);
                self.audit
                    .record(AuditEntry::new(operation, RECORD_DATA_TYPE).failed(err.failure_class()));
                Err(err)
            }
        }
    }

    fn seal(&self, plaintext: &str, data_type: &str, actor: Option<&Actor>) -> Result<String, VaultError> {
        let version = self.keyring.current_version();
        let entry = AuditEntry::new(AuditOperation::Encrypt, data_type)
            .with_actor(actor)
            .with_version(Some(version));
        match crypto::encrypt(plaintext, self.keyring.current_key(), version) {
            Ok(env) => {
                self.audit.record(entry);
                Ok(envelope::serialize(&env))
            }
            Err(e) => {
                self.audit.record(entry.failed(FailureClass::EncryptFailed));
                Err(e.into())
            }
        }
    }
}
