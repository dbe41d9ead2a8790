use axum::{
    Router,
    routing::{delete, get, post},
};
use util::state::AppState;

pub mod chat;
pub mod comments;
pub mod common;
pub mod delete;
pub mod get;
pub mod post;
pub mod put;

pub fn tickets_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get::list_tickets).post(post::create_ticket))
        .route(
            "/{ticket_id}",
            get(get::get_ticket)
                .put(put::update_ticket)
                .delete(delete::delete_ticket),
        )
        .route("/{ticket_id}/comments", post(comments::create_comment))
        .route(
            "/{ticket_id}/comments/{comment_id}",
            delete(comments::delete_comment),
        )
        .route(
            "/{ticket_id}/chat",
            get(chat::get_messages).post(chat::send_message),
        )
        .route("/{ticket_id}/chat/mark-read", post(chat::mark_read))
}
