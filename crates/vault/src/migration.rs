//! Migration-on-read: upgrading stored fields to the current key version.
//!
//! Reads detect fields that are not current-version envelopes and flag them;
//! [`migrate_record`] re-encrypts them. Neither needs a batch job or a lock:
//! each record is migrated independently, and the input record is never
//! modified, so the old value stays authoritative until the caller persists
//! the fully computed replacement.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::{
    self, classify,
    envelope::{self, split_payload},
    EncryptError, FieldFormat, StoredField,
};
use crate::error::VaultError;
use crate::keyring::{KeyLoadError, KeyRing};
use crate::record::{FieldKind, FieldSchema};

/// Options for [`decrypt_with_migration`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecryptOptions {
    /// Also produce a current-version envelope when the field needs migration.
    pub auto_migrate: bool,
}

/// Result of reading one stored field.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptedField {
    pub plaintext: String,
    /// Storage generation the value was read from.
    pub source: FieldFormat,
    /// Key version used to decrypt; `None` when no key was used.
    pub version: Option<String>,
    /// `true` unless the value was already a current-version envelope.
    pub needs_migration: bool,
    /// `true` when a legacy-looking value failed to decrypt and was passed
    /// through as plaintext.
    pub fell_back: bool,
    /// Replacement envelope, present when `auto_migrate` was requested and
    /// the field needed migration. Never produced for a fallback value.
    pub migrated: Option<String>,
}

impl std::fmt::Debug for DecryptedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedField")
            .field("plaintext", &"[REDACTED]")
            .field("source", &self.source)
            .field("version", &self.version)
            .field("needs_migration", &self.needs_migration)
            .field("fell_back", &self.fell_back)
            .field("migrated", &self.migrated.is_some())
            .finish()
    }
}

/// Read one stored field, whatever its generation.
///
/// - Plaintext passes through and is flagged.
/// - A legacy envelope is decrypted with the current key, then each retired
///   key; if none authenticates, the value is passed through as plaintext and
///   flagged, but never re-encrypted.
/// - A versioned envelope is decrypted with the key its tag names, and is
///   flagged unless that tag is the current version.
///
/// # Errors
///
/// For versioned envelopes only: [`VaultError::Decrypt`] on a malformed or
/// tampered value and [`VaultError::Key`] when the tag names a key that is not
/// loaded. Also [`VaultError::Encrypt`] if `auto_migrate` re-encryption fails.
pub fn decrypt_with_migration(
    stored: &str,
    keyring: &KeyRing,
    options: DecryptOptions,
) -> Result<DecryptedField, VaultError> {
    let opened = open(stored, keyring)?;
    let needs_migration = !(opened.source == FieldFormat::Versioned
        && opened.version.as_deref() == Some(keyring.current_version()));

    let migrated = if options.auto_migrate && needs_migration && !opened.fell_back {
        Some(seal(&opened.plaintext, keyring)?)
    } else {
        None
    };

    Ok(DecryptedField {
        plaintext: opened.plaintext,
        source: opened.source,
        version: opened.version,
        needs_migration,
        fell_back: opened.fell_back,
        migrated,
    })
}

/// Errors that abort a record migration. The input record is left untouched.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The envelope names a key version that is not loaded (key loss).
    #[error("field {path}: no key loaded for version {version}")]
    UnknownVersion { path: String, version: String },

    /// A versioned envelope failed to parse or authenticate, or a
    /// legacy-format value did not decrypt under any loaded key.
    #[error("field {path}: stored envelope failed to decrypt")]
    Corrupted { path: String },

    /// Re-encryption under the current key failed.
    #[error("field {path}: re-encryption failed")]
    Encrypt {
        path: String,
        #[source]
        source: EncryptError,
    },
}

impl MigrationError {
    pub fn path(&self) -> &str {
        match self {
            MigrationError::UnknownVersion { path, .. }
            | MigrationError::Corrupted { path }
            | MigrationError::Encrypt { path, .. } => path,
        }
    }
}

/// One field rewritten by [`migrate_record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigratedField {
    /// Concrete path, with array indices filled in.
    pub path: String,
    pub kind: FieldKind,
    pub from: FieldFormat,
    /// Key version the old value was encrypted under, if known.
    pub from_version: Option<String>,
}

/// Summary of a [`migrate_record`] call. Empty when nothing needed migrating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub fields: Vec<MigratedField>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn paths(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.path.clone()).collect()
    }
}

/// Re-encrypt every sensitive field of `record` that is not already a
/// current-version envelope, returning the new record and a report.
///
/// Idempotent: a record whose fields are all current comes back unchanged
/// with an empty report.
///
/// # Errors
///
/// Returns [`MigrationError`] on the first field that cannot be migrated; no
/// partial result is returned.
pub fn migrate_record(
    record: &Value,
    schema: &FieldSchema,
    keyring: &KeyRing,
) -> Result<(Value, MigrationReport), MigrationError> {
    let mut out = record.clone();
    let mut report = MigrationReport::default();

    schema.try_for_each_mut(&mut out, |path, kind, value| {
        let Some(upgrade) = upgrade_field(value, keyring, path)? else {
            return Ok(());
        };
        debug!(field = path, from = ?upgrade.from, "field migrated");
        *value = upgrade.envelope;
        report.fields.push(MigratedField {
            path: path.to_owned(),
            kind,
            from: upgrade.from,
            from_version: upgrade.from_version,
        });
        Ok(())
    })?;

    Ok((out, report))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Opened {
    plaintext: String,
    source: FieldFormat,
    version: Option<String>,
    fell_back: bool,
}

fn open(stored: &str, keyring: &KeyRing) -> Result<Opened, VaultError> {
    match classify(stored) {
        StoredField::Plaintext(s) => Ok(Opened {
            plaintext: s.to_owned(),
            source: FieldFormat::Plaintext,
            version: None,
            fell_back: false,
        }),
        StoredField::LegacyEnvelope(raw) => match open_legacy(&raw, keyring) {
            Some((plaintext, version)) => Ok(Opened {
                plaintext,
                source: FieldFormat::Legacy,
                version: Some(version),
                fell_back: false,
            }),
            None => {
                warn!("legacy-format value did not decrypt; treating as plaintext");
                Ok(Opened {
                    plaintext: stored.to_owned(),
                    source: FieldFormat::Legacy,
                    version: None,
                    fell_back: true,
                })
            }
        },
        StoredField::VersionedEnvelope(s) => {
            let env = envelope::parse(s, keyring.current_version())?.into_envelope()?;
            let key = keyring.key_for(&env.version)?;
            let plaintext = crypto::decrypt(&env, key)?;
            Ok(Opened {
                plaintext,
                source: FieldFormat::Versioned,
                version: Some(env.version),
                fell_back: false,
            })
        }
    }
}

/// Legacy values carry no tag: try the current key first, then retired keys.
fn open_legacy(raw: &[u8], keyring: &KeyRing) -> Option<(String, String)> {
    let current = keyring.current_version();
    let retired = keyring.versions().filter(|v| *v != current);
    std::iter::once(current).chain(retired).find_map(|version| {
        let key = keyring.key_for(version).ok()?;
        let env = split_payload(version.to_owned(), raw).ok()?;
        let plaintext = crypto::decrypt(&env, key).ok()?;
        Some((plaintext, version.to_owned()))
    })
}

fn seal(plaintext: &str, keyring: &KeyRing) -> Result<String, EncryptError> {
    let env = crypto::encrypt(plaintext, keyring.current_key(), keyring.current_version())?;
    Ok(envelope::serialize(&env))
}

struct Upgrade {
    envelope: String,
    from: FieldFormat,
    from_version: Option<String>,
}

/// Compute the replacement for one stored value, or `None` if it is current.
fn upgrade_field(stored: &str, keyring: &KeyRing, path: &str) -> Result<Option<Upgrade>, MigrationError> {
    if let StoredField::VersionedEnvelope(s) = classify(stored) {
        let parsed = envelope::parse(s, keyring.current_version()).map_err(|_| MigrationError::Corrupted {
            path: path.to_owned(),
        })?;
        if parsed.version == keyring.current_version() {
            return Ok(None);
        }
    }

    let opened = open(stored, keyring).map_err(|e| match e {
        VaultError::Key(KeyLoadError::UnknownVersion(version)) => MigrationError::UnknownVersion {
            path: path.to_owned(),
            version,
        },
        _ => MigrationError::Corrupted {
            path: path.to_owned(),
        },
    })?;
    if opened.fell_back {
        // Re-encrypting the stored bytes would hide the value from every later read.
        return Err(MigrationError::Corrupted {
            path: path.to_owned(),
        });
    }
    let envelope = seal(&opened.plaintext, keyring).map_err(|source| MigrationError::Encrypt {
        path: path.to_owned(),
        source,
    })?;

    Ok(Some(Upgrade {
        envelope,
        from: opened.source,
        from_version: opened.version,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::envelope::serialize;
    use crate::test_support::{key_v0, key_v1, keyring, keyring_with_previous};
    use serde_json::json;

    fn enc(plaintext: &str, version: &str) -> String {
        let key = if version == "v0" { key_v0() } else { key_v1() };
        serialize(&crypto::encrypt(plaintext, &key, version).unwrap())
    }

    fn legacy(plaintext: &str) -> String {
        enc(plaintext, "v1").strip_prefix("enc:v1:").unwrap().to_owned()
    }

    #[test]
    fn current_envelope_needs_no_migration() {
        let field = decrypt_with_migration(&enc("021000021", "v1"), &keyring(), DecryptOptions::default()).unwrap();
        assert_eq!(field.plaintext, "021000021");
        assert_eq!(field.source, FieldFormat::Versioned);
        assert_eq!(field.version.as_deref(), Some("v1"));
        assert!(!field.needs_migration);
    }

    #[test]
    fn retired_version_decrypts_and_is_flagged() {
        let field =
            decrypt_with_migration(&enc("021000021", "v0"), &keyring_with_previous(), DecryptOptions::default())
                .unwrap();
        assert_eq!(field.plaintext, "021000021");
        assert_eq!(field.version.as_deref(), Some("v0"));
        assert!(field.needs_migration);
    }

    #[test]
    fn retired_version_without_key_fails_without_fallback() {
        let err = decrypt_with_migration(&enc("021000021", "v0"), &keyring(), DecryptOptions::default()).unwrap_err();
        assert!(matches!(err, VaultError::Key(KeyLoadError::UnknownVersion(ref v)) if v == "v0"));
    }

    #[test]
    fn legacy_and_plaintext_pass_with_flag() {
        let ring = keyring();
        let from_legacy = decrypt_with_migration(&legacy("021000021"), &ring, DecryptOptions::default()).unwrap();
        assert_eq!(from_legacy.plaintext, "021000021");
        assert_eq!(from_legacy.source, FieldFormat::Legacy);
        assert!(from_legacy.needs_migration);
        assert!(!from_legacy.fell_back);

        let from_plain = decrypt_with_migration("123456789", &ring, DecryptOptions::default()).unwrap();
        assert_eq!(from_plain.plaintext, "123456789");
        assert_eq!(from_plain.source, FieldFormat::Plaintext);
        assert!(from_plain.needs_migration);
    }

    #[test]
    fn undecryptable_legacy_value_falls_back_to_plaintext() {
        // Valid base64 long enough to look like an envelope, but not one.
        let lookalike = "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVphYmNkZWZnaGlqaw==";
        let field = decrypt_with_migration(lookalike, &keyring(), DecryptOptions::default()).unwrap();
        assert_eq!(field.plaintext, lookalike);
        assert!(field.fell_back);
        assert!(field.needs_migration);
    }

    #[test]
    fn undecryptable_legacy_value_is_not_auto_migrated() {
        let lookalike = "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVphYmNkZWZnaGlqaw==";
        let field = decrypt_with_migration(lookalike, &keyring(), DecryptOptions { auto_migrate: true }).unwrap();
        assert!(field.fell_back);
        assert!(field.needs_migration);
        assert!(field.migrated.is_none());
    }

    #[test]
    fn legacy_value_under_retired_key_decrypts() {
        let stored = enc("021000021", "v0").strip_prefix("enc:v0:").unwrap().to_owned();
        let field = decrypt_with_migration(&stored, &keyring_with_previous(), DecryptOptions::default()).unwrap();
        assert_eq!(field.plaintext, "021000021");
        assert_eq!(field.version.as_deref(), Some("v0"));
        assert!(!field.fell_back);
    }

    #[test]
    fn tampered_versioned_envelope_is_an_error() {
        let mut s = enc("021000021", "v1");
        // Flip a character in the base64 payload, keeping it valid base64.
        let idx = s.len() - 5;
        let replacement = if &s[idx..idx + 1] == "A" { "B" } else { "A" };
        s.replace_range(idx..idx + 1, replacement);
        let err = decrypt_with_migration(&s, &keyring(), DecryptOptions::default()).unwrap_err();
        assert!(matches!(err, VaultError::Decrypt(_)));
    }

    #[test]
    fn auto_migrate_produces_current_envelope() {
        let ring = keyring_with_previous();
        let field =
            decrypt_with_migration(&enc("021000021", "v0"), &ring, DecryptOptions { auto_migrate: true }).unwrap();
        let migrated = field.migrated.unwrap();
        assert!(migrated.starts_with("enc:v1:"));
        let again = decrypt_with_migration(&migrated, &ring, DecryptOptions { auto_migrate: true }).unwrap();
        assert_eq!(again.plaintext, "021000021");
        assert!(again.migrated.is_none());
    }

    #[test]
    fn migrate_upgrades_every_generation() {
        let ring = keyring_with_previous();
        let schema = FieldSchema::default();
        let record = json!({
            "routing_number": enc("021000021", "v0"),
            "account_number": "000123456789",
            "name": "Dr. Ames"
        });
        let (migrated, report) = migrate_record(&record, &schema, &ring).unwrap();

        assert_eq!(report.paths(), vec!["routing_number", "account_number"]);
        assert_eq!(report.fields[0].from_version.as_deref(), Some("v0"));
        assert_eq!(report.fields[1].from, FieldFormat::Plaintext);
        for field in ["routing_number", "account_number"] {
            assert!(migrated[field].as_str().unwrap().starts_with("enc:v1:"));
        }
        assert_eq!(migrated["name"], "Dr. Ames");
        let routing = decrypt_with_migration(migrated["routing_number"].as_str().unwrap(), &ring, DecryptOptions::default())
            .unwrap();
        assert_eq!(routing.plaintext, "021000021");
    }

    #[test]
    fn migrate_upgrades_legacy_value() {
        let record = json!({"routing_number": legacy("021000021")});
        let (migrated, report) = migrate_record(&record, &FieldSchema::default(), &keyring()).unwrap();
        assert_eq!(report.fields[0].from, FieldFormat::Legacy);
        let field = decrypt_with_migration(migrated["routing_number"].as_str().unwrap(), &keyring(), DecryptOptions::default())
            .unwrap();
        assert_eq!(field.plaintext, "021000021");
    }

    #[test]
    fn migrate_recovers_legacy_value_under_retired_key() {
        let ring = keyring_with_previous();
        let stored = enc("021000021", "v0").strip_prefix("enc:v0:").unwrap().to_owned();
        let record = json!({"routing_number": stored});
        let (migrated, report) = migrate_record(&record, &FieldSchema::default(), &ring).unwrap();
        assert_eq!(report.fields[0].from, FieldFormat::Legacy);
        assert_eq!(report.fields[0].from_version.as_deref(), Some("v0"));
        let field =
            decrypt_with_migration(migrated["routing_number"].as_str().unwrap(), &ring, DecryptOptions::default()).unwrap();
        assert_eq!(field.plaintext, "021000021");
        assert!(!field.needs_migration);
    }

    #[test]
    fn migrate_reports_undecryptable_legacy_value_and_leaves_input() {
        let lookalike = "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVphYmNkZWZnaGlqaw==";
        let record = json!({"routing_number": "021000021", "account_number": lookalike});
        let before = record.clone();
        let err = migrate_record(&record, &FieldSchema::default(), &keyring_with_previous()).unwrap_err();
        assert!(matches!(err, MigrationError::Corrupted { .. }));
        assert_eq!(err.path(), "account_number");
        assert_eq!(record, before);
    }

    #[test]
    fn migrate_is_idempotent() {
        let ring = keyring_with_previous();
        let schema = FieldSchema::default();
        let record = json!({"routing_number": enc("021000021", "v0"), "account_number": legacy("000123456789")});
        let (once, _) = migrate_record(&record, &schema, &ring).unwrap();
        let (twice, report) = migrate_record(&once, &schema, &ring).unwrap();
        assert_eq!(once, twice);
        assert!(report.is_empty());
    }

    #[test]
    fn migrate_reports_unknown_version_and_leaves_input() {
        let record = json!({"routing_number": enc("021000021", "v0")});
        let before = record.clone();
        let err = migrate_record(&record, &FieldSchema::default(), &keyring()).unwrap_err();
        assert!(matches!(err, MigrationError::UnknownVersion { ref version, .. } if version == "v0"));
        assert_eq!(err.path(), "routing_number");
        assert_eq!(record, before);
    }

    #[test]
    fn migrate_reports_corruption() {
        let record = json!({"account_number": "enc:v0:not-base64!!"});
        let err = migrate_record(&record, &FieldSchema::default(), &keyring_with_previous()).unwrap_err();
        assert!(matches!(err, MigrationError::Corrupted { .. }));
    }

    #[test]
    fn migrate_reports_corrupt_current_prefix() {
        let record = json!({"account_number": "enc:v1:%%%"});
        let err = migrate_record(&record, &FieldSchema::default(), &keyring()).unwrap_err();
        assert!(matches!(err, MigrationError::Corrupted { .. }));
    }
}
