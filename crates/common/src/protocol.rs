//! Request and response types exchanged with the vault HTTP API.
//!
//! Records are arbitrary JSON objects; only the fields named by the vault's
//! field schema are ever transformed.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Field encryption
// ---------------------------------------------------------------------------

/// Request body for `POST /fields/encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptFieldRequest {
    /// The sensitive value to encrypt (e.g. a routing number).
    pub plaintext: String,
}

/// Successful response body for `POST /fields/encrypt`.
///
/// `value` is always a current-version envelope, `enc:<version>:<base64>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptFieldResponse {
    pub value: String,
}

// ---------------------------------------------------------------------------
// Record endpoints
// ---------------------------------------------------------------------------

/// Request body for `POST /records/redact` and `POST /records/migrate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRequest {
    /// A stored record as read from the persistence layer.
    pub record: serde_json::Value,
}

/// Response body for `POST /records/redact`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResponse {
    pub record: serde_json::Value,
}

/// Request body for `POST /records/decrypt`.
///
/// The actor is identified by the `X-Actor-Id` / `X-Actor-Role` headers, not
/// by the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptRecordRequest {
    pub record: serde_json::Value,
    /// Also return a re-encrypted copy of the record when any field is stored
    /// in an out-of-date format.
    #[serde(default)]
    pub auto_migrate: bool,
}

/// Successful response body for `POST /records/decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptRecordResponse {
    /// The record with every sensitive field in plaintext.
    pub record: serde_json::Value,
    /// `true` if at least one field was not a current-version envelope.
    pub needs_migration: bool,
    /// Present when `auto_migrate` was requested and a migration was needed.
    /// Callers persist this in place of the stored record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_record: Option<serde_json::Value>,
}

/// Successful response body for `POST /records/migrate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateRecordResponse {
    pub record: serde_json::Value,
    /// Paths of the fields that were re-encrypted. Empty when already current.
    pub migrated_fields: Vec<String>,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"forbidden"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::ServiceError> for ErrorResponse {
    fn from(err: &crate::ServiceError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"`.
    pub status: String,
    /// Version tag new values are encrypted under.
    pub current_version: String,
    /// Every version tag the key ring can decrypt, current included.
    pub key_versions: Vec<String>,
    /// Short SHA-256 fingerprint per version, in the same order as `key_versions`.
    pub fingerprints: Vec<String>,
}
