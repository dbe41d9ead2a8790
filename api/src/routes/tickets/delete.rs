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
use crate::routes::tickets::common::scoped_ticket;

/// DELETE /api/tickets/{ticket_id}
///
/// Scoped delete; comments and chat messages go with the ticket (FK cascade).
pub async fn delete_ticket(
    State(app_state): State<AppState>,
    Path(ticket_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> impl IntoResponse {
    let db = app_state.db();

    let ticket = match scoped_ticket(db, ticket_id, &claims).await {
        Ok(t) => t,
        Err(resp) => return resp.into_response(),
    };

    match TicketModel::delete(db, ticket.id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success((), "Ticket deleted successfully")),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error(format!("Database error: {e}"))),
        )
            .into_response(),
    }
}
