//! Stable broadcast event names.
//!
//! These are application events carried inside the envelope's `event` field,
//! distinct from the frame-level `type` values (`subscribe_ok`, `pong`, ...).

/// Fired on a ticket channel when a chat message has been persisted.
pub const NEW_CHAT_MESSAGE: &str = "new.chat.message";
