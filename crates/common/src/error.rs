//! Common error types shared across crates.

use thiserror::Error;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::Forbidden`] → 403
/// - [`ServiceError::DecryptionFailure`] → 422
/// - [`ServiceError::Unavailable`] → 503
/// - [`ServiceError::Internal`] → 500
///
/// Messages carried here are shown to callers and must never embed plaintext,
/// ciphertext, or key bytes.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed: a bad header, a non-object record, or invalid JSON.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The actor's role is not allowed to perform a privileged operation.
    #[error("forbidden")]
    Forbidden,

    /// A stored value could not be decrypted. Deliberately carries no detail.
    #[error("decryption failed")]
    DecryptionFailure,

    /// A required resource is not configured or is temporarily unavailable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::Forbidden => 403,
            ServiceError::DecryptionFailure => 422,
            ServiceError::Unavailable(_) => 503,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in [`crate::protocol::ErrorResponse`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::Forbidden => "forbidden",
            ServiceError::DecryptionFailure => "decryption_failed",
            ServiceError::Unavailable(_) => "service_unavailable",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_codes() {
        assert_eq!(ServiceError::BadRequest("x".into()).http_status(), 400);
        assert_eq!(ServiceError::Forbidden.http_status(), 403);
        assert_eq!(ServiceError::DecryptionFailure.http_status(), 422);
        assert_eq!(ServiceError::Unavailable("x".into()).http_status(), 503);
        assert_eq!(ServiceError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn display_includes_message() {
        let e = ServiceError::BadRequest("missing X-Actor-Role header".into());
        assert!(e.to_string().contains("missing X-Actor-Role header"));
    }

    #[test]
    fn decryption_failure_is_opaque() {
        assert_eq!(ServiceError::DecryptionFailure.to_string(), "decryption failed");
        assert_eq!(ServiceError::DecryptionFailure.code(), "decryption_failed");
    }
}
