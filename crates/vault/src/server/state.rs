//! Shared application state injected into every Axum handler.

use crate::audit::MemoryAuditSink;
use crate::FieldVault;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-backed) so that Axum can clone the
/// state for each request without copying key material.
#[derive(Clone)]
pub struct AppState {
    pub vault: FieldVault,
    /// Queryable audit buffer; `None` when audit entries go to the log writer.
    pub audit_buffer: Option<MemoryAuditSink>,
}

impl AppState {
    pub fn new(vault: FieldVault, audit_buffer: Option<MemoryAuditSink>) -> Self {
        Self { vault, audit_buffer }
    }
}
