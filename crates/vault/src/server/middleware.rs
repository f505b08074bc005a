//! Axum middleware settings applied to the router.

use std::time::Duration;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the caller's actor id, asserted by the surrounding application.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Header carrying the caller's role.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
