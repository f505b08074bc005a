//! Axum HTTP server exposing the [`crate::FieldVault`] consumer API.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared middleware.
//! - Translate actor headers and JSON bodies into vault calls.
//! - Map [`crate::VaultError`] onto status codes without leaking values.

pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
