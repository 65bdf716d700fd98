//! # taskflow-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Accept provider webhooks on `POST /api/webhooks` and hand them to the
//!   trigger dispatcher (driving adapter)
//! - Verify webhook provenance with an HMAC-SHA256 signature over the raw body
//! - Serve the per-owner dashboard metrics and execution history as JSON
//!
//! ## Dependency rule
//! Depends on `taskflow-app` (for port traits and services) and
//! `taskflow-domain` (for domain types used in request/response mapping).
//! Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
pub mod verifier;

#[cfg(test)]
mod stubs;

pub use state::AppState;
pub use verifier::{HmacSha256Verifier, SIGNATURE_HEADER};
