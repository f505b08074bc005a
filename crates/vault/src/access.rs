//! Role-based gate in front of every plaintext-revealing operation.
//!
//! The allow-list is a closed enumeration: adding a privileged role is a code
//! change, not a configuration edit. Authorization runs before any key is
//! looked up or any cipher is constructed.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::audit::{Actor, AuditEntry, AuditLog, AuditOperation, FailureClass};

/// Roles permitted to see decrypted banking credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegedRole {
    Administrator,
    FinanceManager,
    ComplianceOfficer,
}

impl PrivilegedRole {
    pub const ALL: [PrivilegedRole; 3] = [
        PrivilegedRole::Administrator,
        PrivilegedRole::FinanceManager,
        PrivilegedRole::ComplianceOfficer,
    ];
}

impl FromStr for PrivilegedRole {
    type Err = ();

    /// Accepts the canonical names plus the spellings the surrounding
    /// application uses (`admin`, `finance-manager`, …), case-insensitively.
    fn from_str(role: &str) -> Result<Self, Self::Err> {
        match role.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "admin" | "administrator" => Ok(PrivilegedRole::Administrator),
            "finance_manager" => Ok(PrivilegedRole::FinanceManager),
            "compliance_officer" => Ok(PrivilegedRole::ComplianceOfficer),
            _ => Err(()),
        }
    }
}

/// The actor's role is not allowed to perform the requested operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("forbidden: role {role:?} may not {operation}")]
    Unauthorized { role: String, operation: String },
}

/// Outcome of a successful authorization. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    /// The allow-listed role the actor's role resolved to.
    pub role: PrivilegedRole,
}

/// Authorizes privileged operations against a fixed set of roles and audits
/// every denial.
#[derive(Debug, Clone)]
pub struct AccessGate {
    allowed: Arc<[PrivilegedRole]>,
    audit: AuditLog,
}

impl AccessGate {
    /// A gate admitting every [`PrivilegedRole`].
    pub fn new(audit: AuditLog) -> Self {
        Self::with_roles(&PrivilegedRole::ALL, audit)
    }

    /// A gate admitting only `roles`.
    pub fn with_roles(roles: &[PrivilegedRole], audit: AuditLog) -> Self {
        Self {
            allowed: Arc::from(roles),
            audit,
        }
    }

    /// Decide whether `actor_role` may perform `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::Unauthorized`] for any role that is not
    /// allow-listed, after recording a failed `decrypt` audit entry.
    pub fn authorize(
        &self,
        actor_id: &str,
        actor_role: &str,
        operation: &str,
    ) -> Result<AccessDecision, AuthorizationError> {
        match PrivilegedRole::from_str(actor_role) {
            Ok(role) if self.allowed.contains(&role) => Ok(AccessDecision { allowed: true, role }),
            _ => {
                warn!(actor_id, actor_role, operation, "privileged access denied");
                let actor = Actor::new(actor_id, actor_role);
                self.audit.record(
                    AuditEntry::new(AuditOperation::Decrypt, operation)
                        .with_actor(Some(&actor))
                        .failed(FailureClass::Unauthorized),
                );
                Err(AuthorizationError::Unauthorized {
                    role: actor_role.to_owned(),
                    operation: operation.to_owned(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MockAuditSink;

    fn silent_gate() -> AccessGate {
        let mut sink = MockAuditSink::new();
        sink.expect_record().times(0);
        AccessGate::new(AuditLog::new(Arc::new(sink)))
    }

    #[test]
    fn role_spellings() {
        assert_eq!("admin".parse::<PrivilegedRole>(), Ok(PrivilegedRole::Administrator));
        assert_eq!("Administrator".parse::<PrivilegedRole>(), Ok(PrivilegedRole::Administrator));
        assert_eq!("finance-manager".parse::<PrivilegedRole>(), Ok(PrivilegedRole::FinanceManager));
        assert_eq!("COMPLIANCE_OFFICER".parse::<PrivilegedRole>(), Ok(PrivilegedRole::ComplianceOfficer));
        assert_eq!("viewer".parse::<PrivilegedRole>(), Err(()));
        assert_eq!("".parse::<PrivilegedRole>(), Err(()));
    }

    #[test]
    fn allow_listed_roles_pass_without_audit() {
        let gate = silent_gate();
        for role in ["admin", "finance_manager", "compliance-officer"] {
            let decision = gate.authorize("u-1", role, "decrypt_record").unwrap();
            assert!(decision.allowed);
        }
    }

    #[test]
    fn denial_is_audited_exactly_once() {
        let mut sink = MockAuditSink::new();
        sink.expect_record()
            .withf(|e| {
                e.operation == AuditOperation::Decrypt
                    && !e.success
                    && e.failure_class == Some(FailureClass::Unauthorized)
                    && e.actor_id.as_deref() == Some("u-9")
                    && e.actor_role.as_deref() == Some("viewer")
                    && e.version.is_none()
            })
            .times(1)
            .return_const(());
        let gate = AccessGate::new(AuditLog::new(Arc::new(sink)));

        let err = gate.authorize("u-9", "viewer", "decrypt_record").unwrap_err();
        assert!(matches!(err, AuthorizationError::Unauthorized { ref role, .. } if role == "viewer"));
    }

    #[test]
    fn restricted_gate_rejects_other_privileged_roles() {
        let (audit, buffer) = AuditLog::in_memory(8);
        let gate = AccessGate::with_roles(&[PrivilegedRole::ComplianceOfficer], audit);
        assert!(gate.authorize("u-2", "compliance_officer", "decrypt_record").is_ok());
        assert!(gate.authorize("u-3", "admin", "decrypt_record").is_err());
        assert_eq!(buffer.len(), 1);
    }
}
