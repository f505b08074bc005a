//! AES-256-GCM encryption and decryption of individual string fields.
//!
//! **Algorithm:** AES-256-GCM with a 128-bit IV and a 128-bit tag. The IV
//! width is fixed by the persisted envelope format and must not change.
//!
//! **Never reuse an IV under the same key.** GCM IV reuse breaks both
//! confidentiality and authentication; every call to [`encrypt`] draws a
//! fresh IV from the OS CSPRNG.

use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, rand_core::RngCore, AeadInPlace, KeyInit, OsRng},
    aes::Aes256,
    AesGcm, Nonce, Tag,
};
use thiserror::Error;

use super::{IV_LEN, TAG_LEN};
use crate::keyring::KeyBytes;

/// AES-256-GCM with a 16-byte nonce.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// One encrypted value: the logical fields of the wire envelope.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Key version tag the value was encrypted under (e.g. `"v1"`).
    pub version: String,
    /// Random per-encryption IV.
    pub iv: [u8; IV_LEN],
    /// Ciphertext without the tag.
    pub ciphertext: Vec<u8>,
    /// GCM authentication tag.
    pub tag: [u8; TAG_LEN],
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Ciphertext bytes stay out of logs; lengths are enough to debug framing.
        f.debug_struct("Envelope")
            .field("version", &self.version)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// Errors produced when encrypting a field.
#[derive(Debug, Error)]
pub enum EncryptError {
    /// The envelope format cannot carry a zero-length ciphertext.
    #[error("cannot encrypt an empty value")]
    EmptyPlaintext,

    /// AES-GCM encryption failed (should be unreachable with a valid key).
    #[error("aead operation failed")]
    AeadFailure,
}

/// Errors produced when decrypting a field.
///
/// Both variants render identically so callers cannot tell tampering, a wrong
/// key, and a truncated buffer apart.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecryptError {
    /// The tag did not verify: wrong key, tampered ciphertext, or tampered tag.
    #[error("decryption failed")]
    AuthenticationFailed,

    /// The stored string could not be decoded into an envelope.
    #[error("decryption failed")]
    Malformed,
}

/// Encrypt a plaintext string field with `key`, tagging the envelope with
/// `version`.
///
/// # Errors
///
/// Returns [`EncryptError::EmptyPlaintext`] for `""` and
/// [`EncryptError::AeadFailure`] on an internal AEAD error.
pub fn encrypt(plaintext: &str, key: &KeyBytes, version: &str) -> Result<Envelope, EncryptError> {
    if plaintext.is_empty() {
        return Err(EncryptError::EmptyPlaintext);
    }
    let cipher = build_cipher(key);

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let mut buffer = plaintext.as_bytes().to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::<U16>::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| EncryptError::AeadFailure)?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);

    Ok(Envelope {
        version: version.to_owned(),
        iv,
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

/// Decrypt an [`Envelope`] back to its plaintext string.
///
/// The tag is verified before any plaintext is released.
///
/// # Errors
///
/// Returns [`DecryptError::AuthenticationFailed`] if the tag does not verify
/// and [`DecryptError::Malformed`] if the recovered bytes are not UTF-8.
pub fn decrypt(envelope: &Envelope, key: &KeyBytes) -> Result<String, DecryptError> {
    let cipher = build_cipher(key);
    let mut buffer = envelope.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(
            Nonce::<U16>::from_slice(&envelope.iv),
            b"",
            &mut buffer,
            Tag::<U16>::from_slice(&envelope.tag),
        )
        .map_err(|_| DecryptError::AuthenticationFailed)?;
    String::from_utf8(buffer).map_err(|_| DecryptError::Malformed)
}

fn build_cipher(key: &KeyBytes) -> Aes256Gcm16 {
    Aes256Gcm16::new(GenericArray::from_slice(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{key_v0, key_v1};

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = key_v1();
        for plaintext in ["021000021", "000123456789", "é-ünïcode-✓"] {
            let envelope = encrypt(plaintext, &key, "v1").unwrap();
            assert_eq!(decrypt(&envelope, &key).unwrap(), plaintext);
        }
    }

    #[test]
    fn same_plaintext_yields_distinct_envelopes() {
        let key = key_v1();
        let a = encrypt("021000021", &key, "v1").unwrap();
        let b = encrypt("021000021", &key, "v1").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let envelope = encrypt("secret", &key_v1(), "v1").unwrap();
        assert_eq!(
            decrypt(&envelope, &key_v0()),
            Err(DecryptError::AuthenticationFailed)
        );
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let key = key_v1();
        let original = encrypt("tamper me", &key, "v1").unwrap();
        for i in 0..original.ciphertext.len() {
            let mut envelope = original.clone();
            envelope.ciphertext[i] ^= 0x01;
            assert!(decrypt(&envelope, &key).is_err(), "byte {i} flip not detected");
        }
    }

    #[test]
    fn tampered_tag_fails_auth() {
        let key = key_v1();
        let original = encrypt("tamper me", &key, "v1").unwrap();
        for i in 0..TAG_LEN {
            let mut envelope = original.clone();
            envelope.tag[i] ^= 0x80;
            assert!(decrypt(&envelope, &key).is_err(), "tag byte {i} flip not detected");
        }
    }

    #[test]
    fn tampered_iv_fails_auth() {
        let key = key_v1();
        let mut envelope = encrypt("tamper me", &key, "v1").unwrap();
        envelope.iv[0] ^= 0xFF;
        assert!(decrypt(&envelope, &key).is_err());
    }

    #[test]
    fn empty_plaintext_rejected() {
        assert!(matches!(
            encrypt("", &key_v1(), "v1"),
            Err(EncryptError::EmptyPlaintext)
        ));
    }

    #[test]
    fn decrypt_errors_are_indistinguishable() {
        assert_eq!(
            DecryptError::AuthenticationFailed.to_string(),
            DecryptError::Malformed.to_string()
        );
    }

    #[test]
    fn debug_omits_ciphertext() {
        let envelope = encrypt("021000021", &key_v1(), "v1").unwrap();
        let rendered = format!("{envelope:?}");
        assert!(rendered.contains("v1"));
        assert!(rendered.contains("ciphertext_len"));
        assert!(!rendered.contains("ciphertext:"));
    }
}
