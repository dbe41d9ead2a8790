use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use common::format_validation_errors;
use db::models::tickets::{Model as TicketModel, TicketCategory, TicketPriority};
use serde::Deserialize;
use util::state::AppState;
use validator::Validate;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::tickets::common::TicketResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTicketRequest {
    #[validate(length(min = 1, max = 255, message = "Subject is required (max 255 characters)"))]
    pub subject: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    pub category: TicketCategory,
    pub priority: TicketPriority,
}

/// POST /api/tickets
///
/// Open a new support ticket owned by the caller.
///
/// ### Request Body
/// ```json
/// {
///   "subject": "Printer on fire",
///   "description": "It started during the demo",
///   "category": "technical",
///   "priority": "urgent"
/// }
/// ```
///
/// ### Responses
/// - `201 Created` with the ticket and its owner resolved
/// - `400 Bad Request` (validation failure)
/// - `422 Unprocessable Entity` (unknown category/priority)
pub async fn create_ticket(
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(req): Json<CreateTicketRequest>,
) -> impl IntoResponse {
    if let Err(validation_errors) = req.validate() {
        let error_message = format_validation_errors(&validation_errors);
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(error_message)),
        )
            .into_response();
    }

    let db = app_state.db();

    match TicketModel::create(
        db,
        claims.sub,
        req.subject.trim(),
        &req.description,
        req.category,
        req.priority,
    )
    .await
    {
        Ok(ticket) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                TicketResponse::with_users(db, &ticket).await,
                "Ticket created successfully",
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
