// api/src/ws/chat/emit.rs
use common::channel::Channel;
use common::events;
use common::payload::ChatMessagePayload;
use serde::Serialize;
use util::ws::WebSocketManager;

use crate::ws::core::{envelope, event::Event};

/* ------------ Events (typed, stable names) ------------ */

#[derive(Debug, Serialize)]
pub struct ChatMessageCreated {
    #[serde(flatten)]
    pub payload: ChatMessagePayload,
}

impl Event for ChatMessageCreated {
    const NAME: &'static str = events::NEW_CHAT_MESSAGE;

    fn channel(&self) -> Channel {
        Channel::ticket(self.payload.ticket_id)
    }

    fn sender_id(&self) -> Option<i64> {
        Some(self.payload.user_id)
    }
}

/* ------------ One-liner emit helpers ------------ */

/// Broadcast a persisted chat message on its ticket channel.
///
/// Call strictly after the insert has committed: a receiver of the live
/// event must already be able to see the message via a history fetch.
/// Best-effort by design; a failed or unheard broadcast is not an error.
pub async fn message_created(ws: &WebSocketManager, payload: ChatMessagePayload) {
    let ev = ChatMessageCreated { payload };
    envelope::emit(ws, &ev).await;
}
