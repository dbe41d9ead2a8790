use axum::{Json, http::StatusCode};
use db::models::tickets::Model as TicketModel;
use db::models::user::{Entity as UserEntity, Model as UserModel};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Serialize;

use crate::auth::claims::Claims;
use crate::auth::guards::Empty;
use crate::response::ApiResponse;

#[derive(Debug, Serialize)]
pub struct TicketUserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<UserModel> for TicketUserResponse {
    fn from(user: UserModel) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: i64,
    pub user_id: i64,
    pub assigned_admin_id: Option<i64>,
    pub subject: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<TicketUserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_admin: Option<TicketUserResponse>,
}

impl TicketResponse {
    pub fn from_model(ticket: &TicketModel) -> Self {
        Self {
            id: ticket.id,
            user_id: ticket.user_id,
            assigned_admin_id: ticket.assigned_admin_id,
            subject: ticket.subject.clone(),
            description: ticket.description.clone(),
            category: ticket.category.to_string(),
            priority: ticket.priority.to_string(),
            status: ticket.status.to_string(),
            created_at: ticket.created_at.to_rfc3339(),
            updated_at: ticket.updated_at.to_rfc3339(),
            user: None,
            assigned_admin: None,
        }
    }

    /// Same as [`from_model`](Self::from_model) but with the owner and
    /// assigned admin relations resolved.
    pub async fn with_users(db: &DatabaseConnection, ticket: &TicketModel) -> Self {
        let mut resp = Self::from_model(ticket);

        if let Ok(Some(owner)) = UserEntity::find_by_id(ticket.user_id).one(db).await {
            resp.user = Some(owner.into());
        }
        if let Some(admin_id) = ticket.assigned_admin_id {
            if let Ok(Some(admin)) = UserEntity::find_by_id(admin_id).one(db).await {
                resp.assigned_admin = Some(admin.into());
            }
        }

        resp
    }
}

/// Fetches a ticket within the caller's scope, or the error response the
/// handler should return. A ticket outside the caller's scope is a 404, not
/// a 403, so its existence is not leaked.
pub async fn scoped_ticket(
    db: &DatabaseConnection,
    ticket_id: i64,
    claims: &Claims,
) -> Result<TicketModel, (StatusCode, Json<ApiResponse<Empty>>)> {
    match TicketModel::find_for_user(db, ticket_id, claims.sub, claims.admin).await {
        Ok(Some(ticket)) => Ok(ticket),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Ticket not found")),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Database error: {e}"))),
        )),
    }
}
