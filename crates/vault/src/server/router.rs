//! Axum router construction.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/fields/encrypt", post(handlers::encrypt_field))
        .route("/records/redact", post(handlers::redact_record))
        .route("/records/decrypt", post(handlers::decrypt_record))
        .route("/records/migrate", post(handlers::migrate_record))
        .route("/audit", get(handlers::audit_entries))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .with_state(state)
}
