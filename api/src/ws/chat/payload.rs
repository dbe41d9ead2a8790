// api/src/ws/chat/payload.rs
//
// Builds the shared wire payloads from database rows. This is the only place
// where a chat message is shaped for the outside world; HTTP responses and
// broadcast events both come through here.

use common::payload::{ChatMessagePayload, UserPayload};
use db::models::{chat_messages::Model as ChatMessageModel, user::Model as UserModel};

pub fn user_payload(user: &UserModel) -> UserPayload {
    UserPayload {
        id: user.id,
        name: user.name.clone(),
        email: Some(user.email.clone()),
        role: user.role.to_string(),
        created_at: Some(user.created_at.to_rfc3339()),
        updated_at: Some(user.updated_at.to_rfc3339()),
    }
}

/// Fully resolved message payload. A missing sender row (deleted account)
/// still yields a rendered descriptor, never an absent relation.
pub fn message_payload(msg: &ChatMessageModel, user: Option<&UserModel>) -> ChatMessagePayload {
    let mut payload = ChatMessagePayload {
        id: msg.id,
        message: msg.message.clone(),
        ticket_id: msg.ticket_id,
        user_id: msg.user_id,
        is_read: msg.is_read,
        created_at: msg.created_at.to_rfc3339(),
        updated_at: msg.updated_at.to_rfc3339(),
        user: user.map(user_payload),
    };
    payload.ensure_sender();
    payload
}
