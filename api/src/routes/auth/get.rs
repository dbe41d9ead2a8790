use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use db::models::user::Entity as UserEntity;
use sea_orm::EntityTrait;
use serde::Serialize;
use util::state::AppState;

use crate::auth::AuthUser;
use crate::response::ApiResponse;

#[derive(Debug, Serialize, Default)]
pub struct MeResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// GET /api/auth/me
///
/// The current identity, resolved from the bearer token.
pub async fn me(
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> impl IntoResponse {
    match UserEntity::find_by_id(claims.sub).one(app_state.db()).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                MeResponse {
                    id: user.id,
                    name: user.name,
                    email: user.email,
                    role: user.role.to_string(),
                },
                "Current user",
            )),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("User not found")),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Database error: {e}"))),
        ),
    }
}
