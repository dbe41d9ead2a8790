use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use common::format_validation_errors;
use db::models::ticket_comments::Model as CommentModel;
use serde::{Deserialize, Serialize};
use util::state::AppState;
use validator::Validate;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::tickets::common::scoped_ticket;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub ticket_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CommentModel> for CommentResponse {
    fn from(c: CommentModel) -> Self {
        Self {
            id: c.id,
            ticket_id: c.ticket_id,
            user_id: c.user_id,
            content: c.content,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

/// POST /api/tickets/{ticket_id}/comments
pub async fn create_comment(
    State(app_state): State<AppState>,
    Path(ticket_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(req): Json<CreateCommentRequest>,
) -> impl IntoResponse {
    let db = app_state.db();

    let ticket = match scoped_ticket(db, ticket_id, &claims).await {
        Ok(t) => t,
        Err(resp) => return resp.into_response(),
    };

    if let Err(validation_errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(format_validation_errors(
                &validation_errors,
            ))),
        )
            .into_response();
    }

    match CommentModel::create(db, ticket.id, claims.sub, req.content.trim()).await {
        Ok(comment) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                CommentResponse::from(comment),
                "Comment added successfully",
            )),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error(format!("Database error: {e}"))),
        )
            .into_response(),
    }
}

/// DELETE /api/tickets/{ticket_id}/comments/{comment_id}
///
/// The comment author or an admin may delete a comment.
pub async fn delete_comment(
    State(app_state): State<AppState>,
    Path((ticket_id, comment_id)): Path<(i64, i64)>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> impl IntoResponse {
    let db = app_state.db();

    if let Err(resp) = scoped_ticket(db, ticket_id, &claims).await {
        return resp.into_response();
    }

    if !claims.admin && !CommentModel::is_author(comment_id, claims.sub, db).await {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<()>::error("Forbidden")),
        )
            .into_response();
    }

    match CommentModel::delete(db, comment_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success((), "Comment deleted successfully")),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error(format!("Database error: {e}"))),
        )
            .into_response(),
    }
}
