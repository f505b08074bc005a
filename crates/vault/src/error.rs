//! Vault error taxonomy and its mapping onto [`common::ServiceError`].

use common::ServiceError;
use thiserror::Error;

use crate::access::AuthorizationError;
use crate::audit::FailureClass;
use crate::crypto::{DecryptError, EncryptError};
use crate::keyring::KeyLoadError;
use crate::migration::MigrationError;

/// Any failure surfaced by the [`crate::FieldVault`] consumer API.
///
/// No variant carries plaintext, ciphertext, or key bytes.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Expected rejection: the actor may not see plaintext.
    #[error(transparent)]
    Unauthorized(#[from] AuthorizationError),

    /// A stored envelope did not decrypt. Recoverable at the call site.
    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    /// Key ring failure; at read time, an envelope naming a version that is
    /// not loaded.
    #[error(transparent)]
    Key(#[from] KeyLoadError),

    #[error(transparent)]
    Encrypt(#[from] EncryptError),

    /// Explicit re-encryption failed; indicates key loss or corruption.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl VaultError {
    /// Audit classification of this failure.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            VaultError::Unauthorized(_) => FailureClass::Unauthorized,
            VaultError::Decrypt(_) => FailureClass::DecryptFailed,
            VaultError::Key(_) => FailureClass::UnknownVersion,
            VaultError::Encrypt(_) => FailureClass::EncryptFailed,
            VaultError::Migration(MigrationError::UnknownVersion { .. }) => FailureClass::UnknownVersion,
            VaultError::Migration(MigrationError::Corrupted { .. }) => FailureClass::DecryptFailed,
            VaultError::Migration(MigrationError::Encrypt { .. }) => FailureClass::EncryptFailed,
        }
    }
}

impl From<VaultError> for ServiceError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Unauthorized(_) => ServiceError::Forbidden,
            // Version routing failures look like any other decryption failure to callers.
            VaultError::Decrypt(_) | VaultError::Key(KeyLoadError::UnknownVersion(_)) => {
                ServiceError::DecryptionFailure
            }
            VaultError::Key(e) => ServiceError::Internal(e.to_string()),
            VaultError::Encrypt(EncryptError::EmptyPlaintext) => {
                ServiceError::BadRequest("cannot encrypt an empty value".into())
            }
            VaultError::Encrypt(EncryptError::AeadFailure) => ServiceError::Internal("encryption failed".into()),
            VaultError::Migration(e) => ServiceError::Internal(format!("migration failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_failures_map_to_one_response() {
        let auth: ServiceError = VaultError::Decrypt(DecryptError::AuthenticationFailed).into();
        let malformed: ServiceError = VaultError::Decrypt(DecryptError::Malformed).into();
        let unknown: ServiceError = VaultError::Key(KeyLoadError::UnknownVersion("v0".into())).into();
        for e in [&auth, &malformed, &unknown] {
            assert_eq!(e.http_status(), 422);
            assert_eq!(e.to_string(), "decryption failed");
        }
    }

    #[test]
    fn unauthorized_maps_to_forbidden() {
        let err = VaultError::Unauthorized(AuthorizationError::Unauthorized {
            role: "viewer".into(),
            operation: "decrypt_record".into(),
        });
        assert_eq!(err.failure_class(), FailureClass::Unauthorized);
        assert_eq!(ServiceError::from(err).http_status(), 403);
    }

    #[test]
    fn migration_failures_name_the_field() {
        let err = VaultError::Migration(MigrationError::Corrupted {
            path: "routing_number".into(),
        });
        assert_eq!(err.failure_class(), FailureClass::DecryptFailed);
        let svc = ServiceError::from(err);
        assert_eq!(svc.http_status(), 500);
        assert!(svc.to_string().contains("routing_number"));
    }

    #[test]
    fn empty_plaintext_is_bad_request() {
        let svc = ServiceError::from(VaultError::Encrypt(EncryptError::EmptyPlaintext));
        assert_eq!(svc.http_status(), 400);
    }
}
