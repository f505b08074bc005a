//! [`KeyRing`]: immutable set of AES-256 keys indexed by version tag.

use std::collections::BTreeMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

use super::{CURRENT_KEY_VAR, PREVIOUS_KEY_PREFIX};
use crate::crypto::{envelope::is_version_tag, KEY_LEN};

/// Errors produced while loading or querying the key ring.
///
/// Messages name variables and version tags only, never key material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyLoadError {
    /// `CURRENT_KEY` is not set.
    #[error("{CURRENT_KEY_VAR} is required")]
    MissingCurrentKey,

    /// A key is not exactly 64 hexadecimal characters.
    #[error("key for version {version} must be exactly 64 hexadecimal characters")]
    InvalidFormat { version: String },

    /// A version tag does not match `v<digits>`.
    #[error("invalid key version tag {0:?}: expected v<digits>")]
    InvalidVersionTag(String),

    /// Two keys claim the same version tag.
    #[error("key version {0} is defined more than once")]
    DuplicateVersion(String),

    /// No key is loaded for the requested version.
    #[error("no key loaded for version {0}")]
    UnknownVersion(String),
}

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// When this type is dropped, the memory is zeroized (a volatile write the
/// optimizer cannot elide) to minimise the window during which key material
/// lives in RAM.
#[derive(Clone)]
pub struct KeyBytes(Box<[u8; KEY_LEN]>);

impl KeyBytes {
    /// Parse a 64-character hexadecimal key, attributing failures to `version`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError::InvalidFormat`] unless `hex_key` matches
    /// `^[0-9a-fA-F]{64}$`.
    pub fn from_hex(version: &str, hex_key: &str) -> Result<Self, KeyLoadError> {
        let invalid = || KeyLoadError::InvalidFormat {
            version: version.to_owned(),
        };
        if hex_key.len() != KEY_LEN * 2 || !hex_key.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        hex::decode_to_slice(hex_key, &mut buf[..]).map_err(|_| invalid())?;
        Ok(Self(buf))
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// First 8 bytes of the key's SHA-256 digest, hex-encoded.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0[..]);
        hex::encode(&digest[..8])
    }
}

impl Zeroize for KeyBytes {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for KeyBytes {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl std::fmt::Debug for KeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material never appears in Debug output.
        f.write_str("KeyBytes([REDACTED])")
    }
}

/// Process-wide, read-only set of keys: one current, zero or more retired.
///
/// Cloning is an `Arc` bump; all clones share the same keys, and concurrent
/// readers need no synchronisation because nothing mutates after construction.
#[derive(Clone)]
pub struct KeyRing {
    inner: Arc<Inner>,
}

struct Inner {
    current: String,
    keys: BTreeMap<String, KeyBytes>,
}

impl KeyRing {
    /// Build a ring from a current key and any number of `(version, hex)`
    /// retired keys.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError`] on the first malformed key or version tag, or
    /// if a retired key reuses a tag already in the ring.
    pub fn new<I>(current_version: &str, current_key_hex: &str, previous: I) -> Result<Self, KeyLoadError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if !is_version_tag(current_version) {
            return Err(KeyLoadError::InvalidVersionTag(current_version.to_owned()));
        }
        let mut keys = BTreeMap::new();
        keys.insert(
            current_version.to_owned(),
            KeyBytes::from_hex(current_version, current_key_hex)?,
        );

        for (version, hex_key) in previous {
            if !is_version_tag(&version) {
                return Err(KeyLoadError::InvalidVersionTag(version));
            }
            if keys.contains_key(&version) {
                return Err(KeyLoadError::DuplicateVersion(version));
            }
            let key = KeyBytes::from_hex(&version, &hex_key)?;
            keys.insert(version, key);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                current: current_version.to_owned(),
                keys,
            }),
        })
    }

    /// Build a ring from environment-style `(name, value)` pairs.
    ///
    /// `CURRENT_KEY` is required; `PREVIOUS_KEY_<version>` entries are
    /// optional and their suffix is lowercased (`PREVIOUS_KEY_V0` → `v0`).
    /// Unrelated variables are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError::MissingCurrentKey`] if `CURRENT_KEY` is absent,
    /// and any error from [`KeyRing::new`].
    pub fn from_vars<I>(current_version: &str, vars: I) -> Result<Self, KeyLoadError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut current = None;
        let mut previous = Vec::new();
        for (name, value) in vars {
            if name == CURRENT_KEY_VAR {
                current = Some(value);
            } else if let Some(suffix) = name.strip_prefix(PREVIOUS_KEY_PREFIX) {
                previous.push((suffix.to_ascii_lowercase(), value));
            }
        }
        let current = current.ok_or(KeyLoadError::MissingCurrentKey)?;
        // Sorted so the first reported error does not depend on env ordering.
        previous.sort();
        Self::new(current_version, &current, previous)
    }

    /// Version tag that all new encryptions use.
    pub fn current_version(&self) -> &str {
        &self.inner.current
    }

    /// The key for [`KeyRing::current_version`].
    pub fn current_key(&self) -> &KeyBytes {
        // The constructor always inserts the current version.
        &self.inner.keys[&self.inner.current]
    }

    /// Look up the key for `version`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError::UnknownVersion`] if no key carries that tag.
    /// There is no fallback to the current key.
    pub fn key_for(&self, version: &str) -> Result<&KeyBytes, KeyLoadError> {
        self.inner
            .keys
            .get(version)
            .ok_or_else(|| KeyLoadError::UnknownVersion(version.to_owned()))
    }

    /// All loaded version tags, current included, in sorted order.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.inner.keys.keys().map(String::as_str)
    }

    /// Short fingerprint of the key for `version`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError::UnknownVersion`] if no key carries that tag.
    pub fn fingerprint(&self, version: &str) -> Result<String, KeyLoadError> {
        Ok(self.key_for(version)?.fingerprint())
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("current", &self.inner.current)
            .field("versions", &self.inner.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}
