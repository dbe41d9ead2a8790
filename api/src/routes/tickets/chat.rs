//! Chat endpoints consumed by the realtime client: history, send, mark-read.
//!
//! Sending persists first and broadcasts strictly after the insert commits,
//! so any client that receives the live event could already fetch the same
//! message from history.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use common::format_validation_errors;
use common::payload::ChatMessagePayload;
use db::models::chat_messages::{
    Column as MessageColumn, Entity as MessageEntity, Model as ChatMessageModel,
};
use db::models::user::Entity as UserEntity;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;
use serde_json::json;
use util::state::AppState;
use validator::Validate;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::tickets::common::scoped_ticket;
use crate::ws::chat::{emit, payload::message_payload};

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 1000, message = "Message is required (max 1000 characters)"))]
    pub message: String,
}

/// GET /api/tickets/{ticket_id}/chat
///
/// Full conversation history, ascending by creation time, every entry fully
/// resolved with its sender descriptor.
pub async fn get_messages(
    State(app_state): State<AppState>,
    Path(ticket_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> impl IntoResponse {
    let db = app_state.db();

    if let Err(resp) = scoped_ticket(db, ticket_id, &claims).await {
        return resp.into_response();
    }

    let rows = MessageEntity::find()
        .find_also_related(UserEntity)
        .filter(MessageColumn::TicketId.eq(ticket_id))
        .order_by_asc(MessageColumn::CreatedAt)
        .all(db)
        .await;

    match rows {
        Ok(rows) => {
            let messages: Vec<ChatMessagePayload> = rows
                .iter()
                .map(|(msg, user)| message_payload(msg, user.as_ref()))
                .collect();
            (
                StatusCode::OK,
                Json(ApiResponse::success(messages, "Messages retrieved")),
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

/// POST /api/tickets/{ticket_id}/chat
///
/// Persist a message, then broadcast it on the ticket channel.
///
/// The broadcast is best-effort: a transport problem is logged and never
/// rolls back the message nor fails this request. Clients that missed the
/// live event pick the message up on their next history fetch.
pub async fn send_message(
    State(app_state): State<AppState>,
    Path(ticket_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(req): Json<SendMessageRequest>,
) -> impl IntoResponse {
    let db = app_state.db();

    if let Err(resp) = scoped_ticket(db, ticket_id, &claims).await {
        return resp.into_response();
    }

    if let Err(validation_errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(format_validation_errors(
                &validation_errors,
            ))),
        )
            .into_response();
    }

    let sender = match UserEntity::find_by_id(claims.sub).one(db).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("User not found")),
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
    };

    let message =
        match ChatMessageModel::create(db, ticket_id, claims.sub, req.message.trim()).await {
            Ok(msg) => msg,
            Err(e) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::error(format!(
                        "Failed to send message: {e}"
                    ))),
                )
                    .into_response();
            }
        };

    tracing::info!(
        message_id = message.id,
        ticket_id,
        user_id = claims.sub,
        "Chat message created"
    );

    // Broadcast only now that the insert has committed.
    let payload = message_payload(&message, Some(&sender));
    emit::message_created(app_state.ws(), payload.clone()).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(payload, "Message sent successfully")),
    )
        .into_response()
}

/// POST /api/tickets/{ticket_id}/chat/mark-read
///
/// Marks all unread messages on the ticket as read, excluding the caller's
/// own messages.
pub async fn mark_read(
    State(app_state): State<AppState>,
    Path(ticket_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> impl IntoResponse {
    let db = app_state.db();

    if let Err(resp) = scoped_ticket(db, ticket_id, &claims).await {
        return resp.into_response();
    }

    match ChatMessageModel::mark_read_excluding(db, ticket_id, claims.sub).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                json!({ "updated": updated }),
                "Messages marked as read",
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
