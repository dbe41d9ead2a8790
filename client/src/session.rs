//! One conversation's controller: reconciles history, optimistic sends and
//! live events into the timeline a view can render.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::Utc;
use common::channel::Channel;
use common::events;
use common::payload::{ChatMessagePayload, UserInfo};

use crate::api::ChatApi;
use crate::error::ChatError;
use crate::realtime::{Binding, RealtimeClient};
use crate::timeline::{Timeline, TimelineEntry};

pub struct ChatSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    ticket_id: i64,
    channel_name: String,
    me: UserInfo,
    api: Arc<dyn ChatApi>,
    realtime: RealtimeClient,
    timeline: Mutex<Timeline>,
    /// Guards every late-arriving async result: once false, nothing may
    /// touch the timeline anymore.
    active: AtomicBool,
    binding: Mutex<Option<Binding>>,
    /// Mark foreign messages read as they arrive. The binding only exists
    /// while the conversation view is active, so "on receipt" and "while
    /// viewing" coincide.
    mark_read_on_receive: bool,
}

impl ChatSession {
    pub fn new(
        realtime: RealtimeClient,
        api: Arc<dyn ChatApi>,
        me: UserInfo,
        ticket_id: i64,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                ticket_id,
                channel_name: Channel::ticket(ticket_id).name(),
                me,
                api,
                realtime,
                timeline: Mutex::new(Timeline::new()),
                active: AtomicBool::new(false),
                binding: Mutex::new(None),
                mark_read_on_receive: true,
            }),
        }
    }

    pub fn ticket_id(&self) -> i64 {
        self.inner.ticket_id
    }

    pub fn channel_name(&self) -> &str {
        &self.inner.channel_name
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// A point-in-time copy of the timeline for rendering.
    pub fn messages(&self) -> Vec<TimelineEntry> {
        self.inner.timeline.lock().unwrap().snapshot()
    }

    /// Fetches the history baseline, then binds to the ticket channel's
    /// message event. If the session is deactivated while the fetch is in
    /// flight, the stale result is discarded.
    pub async fn activate(&self) -> Result<(), ChatError> {
        self.inner.active.store(true, Ordering::SeqCst);

        let history = self.inner.api.list_messages(self.inner.ticket_id).await?;
        if !self.inner.active.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.timeline.lock().unwrap().set_history(history);

        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        let handler = move |payload: &serde_json::Value| {
            let Some(inner) = weak.upgrade() else { return };
            inner.on_message_event(payload);
        };

        let binding = self
            .inner
            .realtime
            .bind(&self.inner.channel_name, events::NEW_CHAT_MESSAGE, handler)
            .await?;
        *self.inner.binding.lock().unwrap() = Some(binding);

        Ok(())
    }

    /// Optimistic send: the placeholder is visible immediately, then replaced
    /// by the server-confirmed message, or rolled back on failure.
    pub async fn send(&self, body: &str) -> Result<ChatMessagePayload, ChatError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let local_id = self.inner.timeline.lock().unwrap().push_pending(
            self.inner.ticket_id,
            body,
            &self.inner.me,
            Utc::now().to_rfc3339(),
        );

        match self.inner.api.send_message(self.inner.ticket_id, body).await {
            Ok(mut confirmed) => {
                confirmed.ensure_sender();
                self.inner
                    .timeline
                    .lock()
                    .unwrap()
                    .confirm_pending(local_id, &confirmed);
                Ok(confirmed)
            }
            Err(e) => {
                self.inner.timeline.lock().unwrap().remove_pending(local_id);
                Err(ChatError::Send(e))
            }
        }
    }

    /// Unbinds and releases the subscription. Flips the guard first, so an
    /// in-flight history fetch or straggling event cannot append afterwards.
    pub async fn deactivate(&self) {
        self.inner.active.store(false, Ordering::SeqCst);

        if let Some(binding) = self.inner.binding.lock().unwrap().take() {
            self.inner.realtime.unbind(&binding);
        }
        self.inner.realtime.unsubscribe(&self.inner.channel_name).await;
    }
}

impl SessionInner {
    /// Live event entry point. Normalizes the payload at the boundary, merges
    /// it through the dedup rules, and fires the read-state side effect for
    /// foreign messages.
    fn on_message_event(&self, payload: &serde_json::Value) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }

        let mut message = match serde_json::from_value::<ChatMessagePayload>(payload.clone()) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("discarding malformed chat event payload: {e}");
                return;
            }
        };
        if message.ticket_id != self.ticket_id {
            return;
        }
        message.ensure_sender();

        let authored_by_me = message.user_id == self.me.id;
        let appended = self.timeline.lock().unwrap().apply_event(&message);

        if appended && !authored_by_me && self.mark_read_on_receive {
            let api = self.api.clone();
            let ticket_id = self.ticket_id;
            // Fire-and-forget; a failed mark-read is logged, never surfaced.
            tokio::spawn(async move {
                if let Err(e) = api.mark_read(ticket_id).await {
                    tracing::warn!(ticket_id, "mark-read failed: {e}");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// In-memory stand-in for the chat endpoints.
    struct FakeApi {
        history: Vec<ChatMessagePayload>,
        fail_sends: bool,
        next_id: AtomicUsize,
        mark_read_calls: AtomicUsize,
    }

    impl FakeApi {
        fn new() -> Self {
            Self {
                history: Vec::new(),
                fail_sends: false,
                next_id: AtomicUsize::new(100),
                mark_read_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatApi for FakeApi {
        async fn list_messages(
            &self,
            _ticket_id: i64,
        ) -> Result<Vec<ChatMessagePayload>, ApiError> {
            Ok(self.history.clone())
        }

        async fn send_message(
            &self,
            ticket_id: i64,
            body: &str,
        ) -> Result<ChatMessagePayload, ApiError> {
            if self.fail_sends {
                return Err(ApiError::Rejected("persistence failed".into()));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64;
            Ok(ChatMessagePayload {
                id,
                message: body.into(),
                ticket_id,
                user_id: 3,
                is_read: false,
                created_at: "2025-01-01T00:00:00Z".into(),
                updated_at: "2025-01-01T00:00:00Z".into(),
                user: None,
            })
        }

        async fn mark_read(&self, _ticket_id: i64) -> Result<(), ApiError> {
            self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn me() -> UserInfo {
        UserInfo {
            id: 3,
            name: "Me".into(),
            role: "customer".into(),
        }
    }

    fn session_with(api: Arc<FakeApi>) -> ChatSession {
        // The realtime client is never connected in these tests; binding is
        // exercised end-to-end in tests/chat_flow.rs.
        let realtime = RealtimeClient::new("ws://127.0.0.1:1/ws", "unused");
        ChatSession::new(realtime, api, me(), 42)
    }

    #[tokio::test]
    async fn send_replaces_the_placeholder_with_the_confirmation() {
        let api = Arc::new(FakeApi::new());
        let session = session_with(api);
        session.inner.active.store(true, Ordering::SeqCst);

        let confirmed = session.send("need help").await.unwrap();
        assert_eq!(confirmed.message, "need help");

        let messages = session.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, Some(confirmed.id));
        assert!(!messages[0].pending);
        // The confirmation always carries a rendered sender.
        assert_eq!(messages[0].user.id, 3);
    }

    #[tokio::test]
    async fn failed_send_rolls_back_and_surfaces_the_error() {
        let mut api = FakeApi::new();
        api.fail_sends = true;
        let session = session_with(Arc::new(api));
        session.inner.active.store(true, Ordering::SeqCst);

        let err = session.send("doomed").await.unwrap_err();
        assert!(matches!(err, ChatError::Send(_)));
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn empty_bodies_are_refused_without_a_placeholder() {
        let session = session_with(Arc::new(FakeApi::new()));
        session.inner.active.store(true, Ordering::SeqCst);

        let err = session.send("   ").await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn foreign_event_appends_and_triggers_mark_read() {
        let api = Arc::new(FakeApi::new());
        let session = session_with(api.clone());
        session.inner.active.store(true, Ordering::SeqCst);

        let event = serde_json::json!({
            "id": 7,
            "message": "hello from admin",
            "ticket_id": 42,
            "user_id": 99,
            "is_read": false,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        });
        session.inner.on_message_event(&event);

        let messages = session.messages();
        assert_eq!(messages.len(), 1);
        // Missing sender was synthesized at the boundary.
        assert_eq!(messages[0].user.name, "Unknown User");

        // The read side effect runs on a spawned task.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(api.mark_read_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn own_events_do_not_trigger_mark_read() {
        let api = Arc::new(FakeApi::new());
        let session = session_with(api.clone());
        session.inner.active.store(true, Ordering::SeqCst);

        let event = serde_json::json!({
            "id": 7,
            "message": "mine",
            "ticket_id": 42,
            "user_id": 3,
            "is_read": false,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        });
        session.inner.on_message_event(&event);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(api.mark_read_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn events_for_an_inactive_session_are_dropped() {
        let api = Arc::new(FakeApi::new());
        let session = session_with(api);

        let event = serde_json::json!({
            "id": 7,
            "message": "late",
            "ticket_id": 42,
            "user_id": 99,
            "is_read": false,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        });
        session.inner.on_message_event(&event);
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn events_for_another_ticket_are_dropped() {
        let api = Arc::new(FakeApi::new());
        let session = session_with(api);
        session.inner.active.store(true, Ordering::SeqCst);

        let event = serde_json::json!({
            "id": 7,
            "message": "wrong room",
            "ticket_id": 43,
            "user_id": 99,
            "is_read": false,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        });
        session.inner.on_message_event(&event);
        assert!(session.messages().is_empty());
    }
}
