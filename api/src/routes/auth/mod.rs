use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use util::state::AppState;

use crate::auth::guards::allow_authenticated;

pub mod get;
pub mod post;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(post::register))
        .route("/login", post(post::login))
        .route(
            "/me",
            get(get::me).route_layer(from_fn(allow_authenticated)),
        )
}
