//! Versioned field-level encryption for banking credentials at rest.
//!
//! # Components
//!
//! - [`keyring`]: current and retired AES-256 keys, loaded once from the environment.
//! - [`crypto`]: AES-256-GCM cipher, `enc:<version>:` envelope codec, and the
//!   stored-format classifier.
//! - [`audit`]: append-only audit trail with in-memory and async-writer sinks.
//! - [`access`]: role allow-list gating every plaintext-revealing operation.
//! - [`redact`]: length-based display masks that never decrypt.
//! - [`migration`]: migration-on-read and explicit record re-encryption.
//! - [`FieldVault`]: the consumer API tying the above together.
//!
//! The [`server`] module exposes [`FieldVault`] over HTTP for the `vault` binary.

pub mod access;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keyring;
pub mod migration;
pub mod record;
pub mod redact;
pub mod server;
pub mod telemetry;
pub mod vault;

pub use error::VaultError;
pub use keyring::KeyRing;
pub use migration::DecryptOptions;
pub use record::{FieldKind, FieldSchema, SensitiveField};
pub use vault::{FieldVault, PrivilegedRead};

#[cfg(test)]
pub(crate) mod test_support;
