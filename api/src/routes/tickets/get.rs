use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use db::models::tickets::Model as TicketModel;
use util::state::AppState;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::tickets::common::{TicketResponse, scoped_ticket};

/// GET /api/tickets
///
/// List tickets newest-first. Customers see only their own tickets; admins
/// see everything.
pub async fn list_tickets(
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> impl IntoResponse {
    let db = app_state.db();

    match TicketModel::list_for_user(db, claims.sub, claims.admin).await {
        Ok(tickets) => {
            let mut out = Vec::with_capacity(tickets.len());
            for t in &tickets {
                out.push(TicketResponse::with_users(db, t).await);
            }
            (
                StatusCode::OK,
                Json(ApiResponse::success(out, "Tickets retrieved successfully")),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error(format!("Database error: {e}"))),
        )
            .into_response(),
    }
}

/// GET /api/tickets/{ticket_id}
///
/// Scoped fetch with the owner and assigned admin resolved.
pub async fn get_ticket(
    State(app_state): State<AppState>,
    Path(ticket_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> impl IntoResponse {
    let db = app_state.db();

    let ticket = match scoped_ticket(db, ticket_id, &claims).await {
        Ok(t) => t,
        Err(resp) => return resp.into_response(),
    };

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            TicketResponse::with_users(db, &ticket).await,
            "Ticket retrieved successfully",
        )),
    )
        .into_response()
}
