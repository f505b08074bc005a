//! AES-256-GCM field encryption primitives.
//!
//! This module is intentionally free of HTTP, audit, and access-control
//! dependencies. It provides the low-level encrypt/decrypt operations, the
//! envelope wire codec, and the stored-format classifier used by the vault.
//!
//! # Envelope format
//!
//! ```text
//! enc:<version>:<base64(iv ‖ ciphertext ‖ tag)>     current writers
//! <base64(iv ‖ ciphertext ‖ tag)>                   legacy, read-only
//! ```
//!
//! The IV is 16 bytes and the tag 16 bytes; both are fixed so the payload can
//! be split from either end without a length header.

pub mod cipher;
pub mod classify;
pub mod envelope;

pub use cipher::{decrypt, encrypt, DecryptError, EncryptError, Envelope};
pub use classify::{classify, FieldFormat, StoredField};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of the per-encryption IV (16 bytes = 128 bits).
pub const IV_LEN: usize = 16;

/// Byte length of the GCM authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;

/// Smallest decoded payload that can hold an envelope: IV, tag, and at least
/// one byte of ciphertext.
pub const MIN_PAYLOAD_LEN: usize = IV_LEN + TAG_LEN + 1;
