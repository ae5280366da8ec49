//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: stores, token authority and audit trail
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use keystone_auth::TokenVerifier;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    let verifier: Arc<dyn TokenVerifier> = services.tokens.clone();
    let auth_state = middleware::AuthState { verifier };

    // Protected routes: session first, then per-route role and tenant gates.
    let protected = routes::router(&services).layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public_router())
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
