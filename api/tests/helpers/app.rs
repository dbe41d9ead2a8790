use api::routes::routes;
use api::ws::ws_routes;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use db::test_utils::setup_test_db;
use std::convert::Infallible;
use std::sync::Once;
use tower::util::BoxCloneService;
use util::{state::AppState, ws::WebSocketManager};

/// Seeds the environment the config singleton reads from. Runs once per test
/// binary, before the first `AppConfig` access.
pub fn init_test_env() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        unsafe {
            std::env::set_var("DATABASE_PATH", "sqlite::memory:");
            std::env::set_var("JWT_SECRET", "test-secret-key");
            std::env::set_var("JWT_DURATION_MINUTES", "60");
        }
    });
}

/// Fresh app on a fresh in-memory database.
pub async fn make_test_app() -> (
    BoxCloneService<Request<Body>, Response<Body>, Infallible>,
    AppState,
) {
    init_test_env();

    let db = setup_test_db().await;
    let app_state = AppState::new(db, WebSocketManager::new());

    let router = Router::new()
        .nest("/api", routes(app_state.clone()))
        .nest("/ws", ws_routes(app_state.clone()));

    (BoxCloneService::new(router), app_state)
}
