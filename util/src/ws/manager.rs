//! A thread-safe WebSocket manager for channel-based message broadcasting, with presence tracking.
//!
//! Uses Tokio broadcast channels per channel name. Also tracks user presence per
//! channel to support the sender-echo delivery policy and duplicate-notification
//! suppression on the server side.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Type alias for a channel name (e.g. `ticket_42`).
type ChannelName = String;

/// A message traveling through a channel's broadcast queue.
///
/// `sender_id` identifies the user whose action produced the message, so a
/// per-socket pump can withhold the sender's own echo when the delivery
/// policy asks for it. `None` means the message has no single originator
/// (system notices) and is always delivered.
#[derive(Clone, Debug)]
pub struct ChannelMessage {
    pub sender_id: Option<i64>,
    pub text: String,
}

type Sender = broadcast::Sender<ChannelMessage>;
type Receiver = broadcast::Receiver<ChannelMessage>;

/// Manages broadcast channels per channel name to support real-time WebSocket
/// communication.
///
/// - Lazily creates broadcast channels on first subscription
/// - Removes channels when their subscriber count drops to zero after sending
/// - Tracks user presence per channel using a refcount (supports multiple tabs)
#[derive(Clone, Default)]
pub struct WebSocketManager {
    /// Map of channel names to broadcast senders.
    pub inner: Arc<RwLock<HashMap<ChannelName, Sender>>>,
    /// Presence map: channel -> (user_id -> refcount)
    presence: Arc<RwLock<HashMap<ChannelName, HashMap<i64, usize>>>>,
}

impl WebSocketManager {
    /// Creates a new, empty `WebSocketManager`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the given channel, creating it if necessary.
    pub async fn subscribe(&self, channel: &str) -> Receiver {
        let mut map = self.inner.write().await;
        map.entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(100).0)
            .subscribe()
    }

    /// Broadcasts a message with no originator to all subscribers of `channel`.
    ///
    /// If the channel does not exist, it's a no-op.
    /// If the channel has zero subscribers after sending, it is removed.
    pub async fn broadcast<T: Into<String>>(&self, channel: &str, msg: T) {
        self.send(channel, None, msg.into()).await;
    }

    /// Broadcasts a message produced by `sender_id` to all subscribers of
    /// `channel`. Whether the sender's own connection sees it is decided by
    /// each receiving pump, not here.
    pub async fn broadcast_from<T: Into<String>>(&self, channel: &str, sender_id: i64, msg: T) {
        self.send(channel, Some(sender_id), msg.into()).await;
    }

    async fn send(&self, channel: &str, sender_id: Option<i64>, text: String) {
        let mut map = self.inner.write().await;
        if let Some(sender) = map.get(channel) {
            let _ = sender.send(ChannelMessage { sender_id, text });
            if sender.receiver_count() == 0 {
                tracing::info!("Removing channel '{channel}' due to no subscribers.");
                map.remove(channel);
            }
        }
    }

    // -------------------- Presence API --------------------

    /// Increment presence refcount for `user_id` on `channel`.
    /// Call this when a socket subscribes for that channel.
    pub async fn register(&self, channel: &str, user_id: i64) {
        let mut p = self.presence.write().await;
        let entry = p.entry(channel.to_string()).or_default();
        *entry.entry(user_id).or_insert(0) += 1;
    }

    /// Decrement presence refcount for `user_id` on `channel`.
    /// Call this when a socket unsubscribes or closes.
    pub async fn unregister(&self, channel: &str, user_id: i64) {
        let mut p = self.presence.write().await;
        if let Some(users) = p.get_mut(channel) {
            if let Some(cnt) = users.get_mut(&user_id) {
                if *cnt > 1 {
                    *cnt -= 1;
                } else {
                    users.remove(&user_id);
                }
            }
            if users.is_empty() {
                p.remove(channel);
            }
        }
    }

    /// Returns `true` if `user_id` currently has at least one active subscription to `channel`.
    pub async fn is_user_present_on(&self, channel: &str, user_id: i64) -> bool {
        let p = self.presence.read().await;
        p.get(channel).and_then(|m| m.get(&user_id)).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, timeout};

    #[tokio::test]
    async fn it_broadcasts_to_all_subscribers() {
        let manager = WebSocketManager::new();
        let channel = "test-channel";

        let mut r1 = manager.subscribe(channel).await;
        let mut r2 = manager.subscribe(channel).await;

        manager.broadcast(channel, "hello world").await;

        let msg1 = timeout(Duration::from_millis(50), r1.recv())
            .await
            .unwrap()
            .unwrap();
        let msg2 = timeout(Duration::from_millis(50), r2.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(msg1.text, "hello world");
        assert_eq!(msg1.sender_id, None);
        assert_eq!(msg2.text, "hello world");
    }

    #[tokio::test]
    async fn broadcast_from_tags_the_sender() {
        let manager = WebSocketManager::new();
        let channel = "tagged";

        let mut rx = manager.subscribe(channel).await;
        manager.broadcast_from(channel, 7, "mine").await;

        let msg = timeout(Duration::from_millis(50), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.sender_id, Some(7));
        assert_eq!(msg.text, "mine");
    }

    #[tokio::test]
    async fn it_creates_channel_lazily() {
        let manager = WebSocketManager::new();
        let channel = "lazy-create";
        assert!(manager.inner.read().await.get(channel).is_none());
        let _ = manager.subscribe(channel).await;
        assert!(manager.inner.read().await.get(channel).is_some());
    }

    #[tokio::test]
    async fn broadcast_to_empty_channel_does_not_panic() {
        let manager = WebSocketManager::new();
        manager.broadcast("no-subscribers", "silent").await;
    }

    #[tokio::test]
    async fn channel_is_removed_after_broadcast_if_no_subscribers() {
        let manager = WebSocketManager::new();
        let channel = "ephemeral-channel";
        {
            let _ = manager.subscribe(channel).await;
        } // drop receiver
        manager.broadcast(channel, "cleanup").await;
        let map = manager.inner.read().await;
        assert!(!map.contains_key(channel));
    }

    #[tokio::test]
    async fn presence_register_unregister_and_query() {
        let m = WebSocketManager::new();
        let channel = "p";
        assert!(!m.is_user_present_on(channel, 7).await);
        m.register(channel, 7).await;
        assert!(m.is_user_present_on(channel, 7).await);
        m.register(channel, 7).await; // refcount 2
        m.unregister(channel, 7).await; // refcount 1
        assert!(m.is_user_present_on(channel, 7).await);
        m.unregister(channel, 7).await; // refcount 0
        assert!(!m.is_user_present_on(channel, 7).await);
    }
}
