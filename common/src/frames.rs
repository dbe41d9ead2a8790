//! WebSocket wire frames shared by the server multiplexer and the client.
//!
//! Both sides parse and emit the same definitions, so there is exactly one
//! place where the contract can change.

use serde::{Deserialize, Serialize};

/// Frames sent by the client over the multiplexed socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Request subscriptions to the named channels. Authorization is
    /// re-evaluated server-side for every request.
    Subscribe { channels: Vec<String> },
    Unsubscribe { channels: Vec<String> },
    Ping,
}

/// Frames sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// First frame after the upgrade; the connection is usable once received.
    Ready { policy_version: u64 },
    Pong,
    /// Outcome of a `subscribe` request. `rejected` pairs each refused
    /// channel name with a reason code.
    SubscribeOk {
        accepted: Vec<String>,
        rejected: Vec<(String, String)>,
    },
    UnsubscribeOk { channels: Vec<String> },
    Event {
        event: String,
        channel: String,
        payload: serde_json::Value,
        ts: String,
    },
    Error { code: String, message: String },
}

/// Standard envelope for application events broadcast on a channel.
///
/// Serializes to the same JSON as [`ServerFrame::Event`]; emitters build this
/// directly so a channel broadcast is a single pre-serialized string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub r#type: String,
    pub event: String,
    pub channel: String,
    pub payload: serde_json::Value,
    pub ts: String,
}
