//! HTTP route entry point for `/api/...`.
//!
//! Route groups include:
//! - `/health` → Health check endpoint (public)
//! - `/auth` → Authentication endpoints (register, login, current identity)
//! - `/tickets` → Ticket CRUD, comments, and the chat endpoints consumed by
//!   the realtime client (authenticated users)

use crate::auth::guards::allow_authenticated;
use crate::routes::{auth::auth_routes, health::health_routes, tickets::tickets_routes};
use axum::{Router, middleware::from_fn};
use util::state::AppState;

pub mod auth;
pub mod health;
pub mod tickets;

/// Builds the complete application router for all HTTP endpoints.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health_routes())
        .nest("/auth", auth_routes())
        .nest(
            "/tickets",
            tickets_routes().route_layer(from_fn(allow_authenticated)),
        )
        .with_state(app_state)
}
