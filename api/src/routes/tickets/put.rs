use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use db::models::tickets::{ActiveModel as TicketActiveModel, TicketStatus};
use db::models::user::Entity as UserEntity;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, EntityTrait};
use serde::Deserialize;
use util::state::AppState;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::tickets::common::{TicketResponse, scoped_ticket};

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub assigned_admin_id: Option<i64>,
}

/// PUT /api/tickets/{ticket_id}
///
/// Customers may edit the subject/description of their own tickets; admins
/// may additionally change status and assign an admin. Fields outside the
/// caller's role are rejected rather than silently ignored.
pub async fn update_ticket(
    State(app_state): State<AppState>,
    Path(ticket_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(req): Json<UpdateTicketRequest>,
) -> impl IntoResponse {
    let db = app_state.db();

    let ticket = match scoped_ticket(db, ticket_id, &claims).await {
        Ok(t) => t,
        Err(resp) => return resp.into_response(),
    };

    if !claims.admin && (req.status.is_some() || req.assigned_admin_id.is_some()) {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<()>::error(
                "Only admins may change status or assignment",
            )),
        )
            .into_response();
    }

    if let Some(subject) = req.subject.as_deref() {
        if subject.trim().is_empty() || subject.len() > 255 {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error(
                    "Subject is required (max 255 characters)",
                )),
            )
                .into_response();
        }
    }

    if let Some(admin_id) = req.assigned_admin_id {
        match UserEntity::find_by_id(admin_id).one(db).await {
            Ok(Some(u)) if u.is_admin() => {}
            Ok(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::<()>::error("Assignee must be an admin")),
                )
                    .into_response();
            }
            Err(e) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::error(format!("Database error: {e}"))),
                )
                    .into_response();
            }
        }
    }

    let mut active: TicketActiveModel = ticket.into();
    if let Some(subject) = req.subject {
        active.subject = Set(subject.trim().to_owned());
    }
    if let Some(description) = req.description {
        active.description = Set(description);
    }
    if let Some(status) = req.status {
        active.status = Set(status);
    }
    if let Some(admin_id) = req.assigned_admin_id {
        active.assigned_admin_id = Set(Some(admin_id));
    }
    active.updated_at = Set(Utc::now());

    match active.update(db).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                TicketResponse::with_users(db, &updated).await,
                "Ticket updated successfully",
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
