//! Fixed keys and key rings shared by unit tests.

use crate::keyring::{KeyBytes, KeyRing};

pub const TEST_KEY_V1: &str = "5f1c9a7e3b2d4c6a8e0f1a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f";
pub const TEST_KEY_V0: &str = "0a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f9";

pub fn key_v1() -> KeyBytes {
    KeyBytes::from_hex("v1", TEST_KEY_V1).unwrap()
}

pub fn key_v0() -> KeyBytes {
    KeyBytes::from_hex("v0", TEST_KEY_V0).unwrap()
}

/// Current key `v1` only.
pub fn keyring() -> KeyRing {
    KeyRing::new("v1", TEST_KEY_V1, Vec::new()).unwrap()
}

/// Current key `v1` plus retired key `v0`.
pub fn keyring_with_previous() -> KeyRing {
    KeyRing::new("v1", TEST_KEY_V1, vec![("v0".to_owned(), TEST_KEY_V0.to_owned())]).unwrap()
}
