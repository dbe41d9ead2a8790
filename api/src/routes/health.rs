use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use util::state::AppState;

use crate::response::ApiResponse;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health))
}

/// GET /api/health
///
/// Liveness probe; carries the project name so an operator can tell
/// deployments apart.
async fn health() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(
        json!({ "project": util::config::project_name() }),
        "ok",
    ))
}
