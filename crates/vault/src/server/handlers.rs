//! Axum request handlers for all service endpoints.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{
    DecryptRecordRequest, DecryptRecordResponse, EncryptFieldRequest, EncryptFieldResponse, ErrorResponse,
    HealthResponse, MigrateRecordResponse, RecordRequest, RecordResponse,
};
use common::ServiceError;
use serde::Deserialize;
use tracing::warn;

use super::middleware::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
use super::state::AppState;
use crate::audit::Actor;
use crate::migration::DecryptOptions;

/// Operation name the access gate evaluates for `GET /audit`.
const READ_AUDIT_OPERATION: &str = "read_audit_log";

/// Default number of entries returned by `GET /audit`.
const DEFAULT_AUDIT_LIMIT: usize = 100;

/// `POST /fields/encrypt`: encrypt one value under the current key.
pub async fn encrypt_field(State(state): State<AppState>, Json(req): Json<EncryptFieldRequest>) -> Response {
    match state.vault.encrypt_field(&req.plaintext) {
        Ok(value) => (StatusCode::OK, Json(EncryptFieldResponse { value })).into_response(),
        Err(e) => {
            warn!(error = %e, "field encryption failed");
            error_response(e.into())
        }
    }
}

/// `POST /records/redact`: mask sensitive fields for default display.
///
/// Needs no privilege. Actor headers, when present, are recorded in the audit
/// entry.
pub async fn redact_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecordRequest>,
) -> Response {
    let actor = match optional_actor(&headers) {
        Ok(a) => a,
        Err(e) => return error_response(e),
    };
    let record = state.vault.redact_record(&req.record, actor.as_ref());
    (StatusCode::OK, Json(RecordResponse { record })).into_response()
}

/// `POST /records/decrypt`: privileged plaintext view of a record.
///
/// The actor is taken from `X-Actor-Id` / `X-Actor-Role`. Missing headers are
/// evaluated as an empty role and therefore denied.
pub async fn decrypt_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DecryptRecordRequest>,
) -> Response {
    let actor = match required_actor(&headers) {
        Ok(a) => a,
        Err(e) => return error_response(e),
    };
    if let Err(e) = require_object(&req.record) {
        return error_response(e);
    }

    let options = DecryptOptions {
        auto_migrate: req.auto_migrate,
    };
    match state
        .vault
        .decrypt_record_privileged(&req.record, &actor.id, &actor.role, options)
    {
        Ok(read) => {
            let body = DecryptRecordResponse {
                record: read.record,
                needs_migration: read.needs_migration,
                migrated_record: read.migrated_record,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => error_response(e.into()),
    }
}

/// `POST /records/migrate`: re-encrypt out-of-date fields under the current key.
pub async fn migrate_record(State(state): State<AppState>, Json(req): Json<RecordRequest>) -> Response {
    if let Err(e) = require_object(&req.record) {
        return error_response(e);
    }
    match state.vault.migrate_record(&req.record) {
        Ok((record, report)) => {
            let body = MigrateRecordResponse {
                record,
                migrated_fields: report.paths(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => error_response(e.into()),
    }
}

/// Query parameters for `GET /audit`.
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

/// `GET /audit`: most recent audit entries from the in-memory buffer.
///
/// Requires a privileged actor. Returns `503` when entries are delivered to
/// the log writer instead of the buffer.
pub async fn audit_entries(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> Response {
    let actor = match required_actor(&headers) {
        Ok(a) => a,
        Err(e) => return error_response(e),
    };
    if let Err(e) = state.vault.authorize(&actor.id, &actor.role, READ_AUDIT_OPERATION) {
        return error_response(e.into());
    }
    let Some(buffer) = &state.audit_buffer else {
        return error_response(ServiceError::Unavailable(
            "audit entries are delivered to the log sink".into(),
        ));
    };
    let entries = buffer.recent(query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT));
    (StatusCode::OK, Json(entries)).into_response()
}

/// `GET /health`: liveness check and loaded key versions.
///
/// The key ring is validated at startup, so a running process is always ready.
pub async fn health(State(state): State<AppState>) -> Response {
    let keyring = state.vault.keyring();
    let key_versions: Vec<String> = keyring.versions().map(str::to_owned).collect();
    let fingerprints = key_versions
        .iter()
        .filter_map(|v| keyring.fingerprint(v).ok())
        .collect();

    let body = HealthResponse {
        status: "ok".into(),
        current_version: keyring.current_version().to_owned(),
        key_versions,
        fingerprints,
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn error_response(err: ServiceError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(&err))).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ServiceError> {
    match headers.get(name) {
        Some(v) => v
            .to_str()
            .map(Some)
            .map_err(|_| ServiceError::BadRequest(format!("{name} header contains non-ASCII characters"))),
        None => Ok(None),
    }
}

/// Actor for privileged routes; absent headers become empty strings so the
/// access gate denies and audits them.
fn required_actor(headers: &HeaderMap) -> Result<Actor, ServiceError> {
    let id = header_str(headers, ACTOR_ID_HEADER)?.unwrap_or_default();
    let role = header_str(headers, ACTOR_ROLE_HEADER)?.unwrap_or_default();
    Ok(Actor::new(id, role))
}

fn optional_actor(headers: &HeaderMap) -> Result<Option<Actor>, ServiceError> {
    let id = header_str(headers, ACTOR_ID_HEADER)?;
    let role = header_str(headers, ACTOR_ROLE_HEADER)?;
    Ok(match (id, role) {
        (None, None) => None,
        (id, role) => Some(Actor::new(id.unwrap_or_default(), role.unwrap_or_default())),
    })
}

fn require_object(record: &serde_json::Value) -> Result<(), ServiceError> {
    if record.is_object() {
        Ok(())
    } else {
        Err(ServiceError::BadRequest("record must be a JSON object".into()))
    }
}
