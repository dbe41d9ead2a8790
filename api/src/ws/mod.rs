use axum::{Router, middleware::from_fn, routing::get};
use util::state::AppState;

use crate::auth::guards::allow_authenticated;
use crate::ws::mux::ws_entry;

pub mod auth;
pub mod chat;
pub mod core;
pub mod mux;

/// The realtime endpoint: one authenticated socket per client, channels
/// multiplexed over it with subscribe/unsubscribe frames.
pub fn ws_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_entry))
        .route_layer(from_fn(allow_authenticated))
        .with_state(app_state)
}
