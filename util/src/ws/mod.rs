// util/src/ws/mod.rs
pub mod manager;
pub use manager::{ChannelMessage, WebSocketManager};

use chrono::Utc;
use common::frames::EventEnvelope;
use serde::Serialize;

/// Broadcast a JSON-serialized [`EventEnvelope`] on `channel`.
///
/// `sender_id` tags the originating user so the per-socket pump can apply the
/// sender-echo delivery policy. Serialization failure is logged and dropped;
/// a missed live event is recovered by the next history fetch.
pub async fn emit<T: Serialize>(
    ws: &WebSocketManager,
    channel: &str,
    event: &str,
    sender_id: Option<i64>,
    payload: &T,
) {
    let env = EventEnvelope {
        r#type: "event".into(),
        event: event.into(),
        channel: channel.into(),
        payload: match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Failed to serialize event '{event}' on '{channel}': {e}");
                return;
            }
        },
        ts: Utc::now().to_rfc3339(),
    };
    match serde_json::to_string(&env) {
        Ok(json) => match sender_id {
            Some(uid) => ws.broadcast_from(channel, uid, json).await,
            None => ws.broadcast(channel, json).await,
        },
        Err(e) => tracing::error!("Failed to serialize envelope for '{channel}': {e}"),
    }
}
