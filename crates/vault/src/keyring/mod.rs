//! Key ring loading from the process environment.
//!
//! # Lifecycle
//!
//! 1. At startup, [`load_from_env`] reads `CURRENT_KEY` and every
//!    `PREVIOUS_KEY_<version>` variable and validates each one.
//! 2. Any malformed key aborts startup; nothing is deferred to first use.
//! 3. The resulting [`KeyRing`] is immutable and shared by cheap clones for
//!    the rest of the process. Rotation means redeploying with a new
//!    environment, not mutating the ring.
//!
//! # Security invariants
//!
//! - Key bytes are **never** logged or included in traces. Keys are referred
//!   to by version tag and a short SHA-256 fingerprint.
//! - Key bytes are zeroed when the last clone of the ring is dropped.

pub mod ring;

pub use ring::{KeyBytes, KeyLoadError, KeyRing};

use tracing::info;

/// Environment variable holding the current key.
pub const CURRENT_KEY_VAR: &str = "CURRENT_KEY";

/// Prefix of environment variables holding retired keys.
pub const PREVIOUS_KEY_PREFIX: &str = "PREVIOUS_KEY_";

/// Load the key ring from the process environment, assigning
/// `current_version` to `CURRENT_KEY`.
///
/// # Errors
///
/// Returns [`KeyLoadError`] if `CURRENT_KEY` is absent or any key or version
/// tag is malformed.
pub fn load_from_env(current_version: &str) -> Result<KeyRing, KeyLoadError> {
    let ring = KeyRing::from_vars(current_version, std::env::vars())?;
    for version in ring.versions() {
        info!(
            version,
            fingerprint = %ring.fingerprint(version)?,
            current = version == ring.current_version(),
            "loaded encryption key"
        );
    }
    Ok(ring)
}
