//! Stored-format classification.
//!
//! The format of a stored field is never persisted alongside it: the same
//! column holds plaintext, legacy envelopes, and versioned envelopes while a
//! table migrates, so the shape of the string is re-examined on every read.
//!
//! # Known ambiguity
//!
//! A plaintext value that happens to be valid base64 decoding to at least
//! [`MIN_PAYLOAD_LEN`] bytes is classified as [`StoredField::LegacyEnvelope`].
//! Callers treat a failed legacy decryption as plaintext for that reason.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::{envelope::VERSION_PREFIX, MIN_PAYLOAD_LEN};

/// A stored value, classified by its surface form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredField<'a> {
    /// Never encrypted.
    Plaintext(&'a str),
    /// Bare base64 envelope written before version tags existed; holds the
    /// decoded payload.
    LegacyEnvelope(Vec<u8>),
    /// `enc:`-prefixed envelope. The tag may name the current or a retired key.
    VersionedEnvelope(&'a str),
}

impl StoredField<'_> {
    /// The coarse format, suitable for reports and audit entries.
    pub fn format(&self) -> FieldFormat {
        match self {
            StoredField::Plaintext(_) => FieldFormat::Plaintext,
            StoredField::LegacyEnvelope(_) => FieldFormat::Legacy,
            StoredField::VersionedEnvelope(_) => FieldFormat::Versioned,
        }
    }
}

/// Storage generation of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFormat {
    Plaintext,
    Legacy,
    Versioned,
}

/// Classify a stored string. Checks run in a fixed order: version prefix,
/// then legacy base64, then plaintext by elimination.
pub fn classify(stored: &str) -> StoredField<'_> {
    if is_versioned(stored) {
        return StoredField::VersionedEnvelope(stored);
    }
    match decode_legacy(stored) {
        Some(raw) => StoredField::LegacyEnvelope(raw),
        None => StoredField::Plaintext(stored),
    }
}

/// `true` if `stored` carries the version prefix.
pub fn is_versioned(stored: &str) -> bool {
    stored.starts_with(VERSION_PREFIX)
}

/// `true` if `stored` is unprefixed, valid base64, and long enough to hold an
/// envelope once decoded.
pub fn is_legacy_encrypted(stored: &str) -> bool {
    !is_versioned(stored) && decode_legacy(stored).is_some()
}

/// `true` if `stored` is neither versioned nor legacy-encrypted.
pub fn is_plaintext(stored: &str) -> bool {
    !is_versioned(stored) && !is_legacy_encrypted(stored)
}

fn decode_legacy(stored: &str) -> Option<Vec<u8>> {
    STANDARD
        .decode(stored)
        .ok()
        .filter(|raw| raw.len() >= MIN_PAYLOAD_LEN)
}
