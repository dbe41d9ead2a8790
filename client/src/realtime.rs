//! Connection and subscription manager for the realtime endpoint.
//!
//! One `RealtimeClient` is the sole owner of the process-wide socket and the
//! subscription registry; sessions only ask it to subscribe, bind, unbind and
//! unsubscribe. Clones share the same underlying connection.
//!
//! State machine: `Disconnected → Connecting → Connected`, with `Error`
//! reachable from any state. Observers are notified exactly on transitions,
//! never polled.
//!
//! After an unexpected drop the client does NOT resubscribe previously bound
//! channels: authorization may have changed while disconnected, so the owning
//! session re-establishes its bindings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::frames::{ClientFrame, ServerFrame};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

use crate::credentials;
use crate::error::RealtimeError;

const DEFAULT_SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

pub type EventHandler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;
type StateObserver = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Identifies one bound handler; pass back to [`RealtimeClient::unbind`] to
/// remove exactly that handler without touching other bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub channel: String,
    pub event: String,
    id: u64,
}

#[derive(Default)]
struct ChannelSub {
    bindings: HashMap<String, Vec<(u64, EventHandler)>>,
}

enum SubscribeOutcome {
    Accepted,
    Rejected(String),
    ConnectionClosed,
}

struct Shared {
    /// Serializes connection attempts so concurrent `initialize` calls
    /// cannot open a second socket.
    init_lock: tokio::sync::Mutex<()>,
    state: Mutex<ConnectionState>,
    observers: Mutex<Vec<(u64, StateObserver)>>,
    subs: Mutex<HashMap<String, ChannelSub>>,
    pending_subscribes: Mutex<HashMap<String, Vec<oneshot::Sender<SubscribeOutcome>>>>,
    ready_waiters: Mutex<Vec<oneshot::Sender<()>>>,
    out_tx: Mutex<Option<mpsc::Sender<Message>>>,
    reader: Mutex<Option<tokio::task::JoinHandle<()>>>,
    writer: Mutex<Option<tokio::task::JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            init_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(ConnectionState::Disconnected),
            observers: Mutex::new(Vec::new()),
            subs: Mutex::new(HashMap::new()),
            pending_subscribes: Mutex::new(HashMap::new()),
            ready_waiters: Mutex::new(Vec::new()),
            out_tx: Mutex::new(None),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Transitions state and fires observers, but only on an actual change.
    fn set_state(&self, next: ConnectionState) {
        let changed = {
            let mut state = self.state.lock().unwrap();
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        };
        if changed {
            let observers: Vec<StateObserver> = self
                .observers
                .lock()
                .unwrap()
                .iter()
                .map(|(_, f)| f.clone())
                .collect();
            for f in observers {
                f(next);
            }
        }
    }

    /// Drops connection-scoped bookkeeping after the socket is gone.
    fn teardown_connection(&self) {
        self.subs.lock().unwrap().clear();
        let waiters: Vec<oneshot::Sender<SubscribeOutcome>> = self
            .pending_subscribes
            .lock()
            .unwrap()
            .drain()
            .flat_map(|(_, v)| v)
            .collect();
        for w in waiters {
            let _ = w.send(SubscribeOutcome::ConnectionClosed);
        }
        *self.out_tx.lock().unwrap() = None;
        self.ready_waiters.lock().unwrap().clear();
    }
}

#[derive(Clone)]
pub struct RealtimeClient {
    url: String,
    token: String,
    subscribe_timeout: Duration,
    inner: Arc<Shared>,
}

impl RealtimeClient {
    /// `url` is the realtime endpoint, e.g. `ws://127.0.0.1:3000/ws`. The
    /// token authenticates the upgrade via the `?token=` query parameter.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            subscribe_timeout: DEFAULT_SUBSCRIBE_TIMEOUT,
            inner: Arc::new(Shared::new()),
        }
    }

    pub fn with_subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = timeout;
        self
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state.lock().unwrap()
    }

    /// Registers a callback fired on every state transition. Returns an id
    /// for [`remove_state_observer`](Self::remove_state_observer).
    pub fn on_state_change(
        &self,
        observer: impl Fn(ConnectionState) + Send + Sync + 'static,
    ) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .observers
            .lock()
            .unwrap()
            .push((id, Arc::new(observer)));
        id
    }

    pub fn remove_state_observer(&self, id: u64) {
        self.inner
            .observers
            .lock()
            .unwrap()
            .retain(|(obs_id, _)| *obs_id != id);
    }

    /// Connects to the realtime endpoint.
    ///
    /// Idempotent: while `Connected` or `Connecting` this returns without
    /// creating a second connection. An absent or structurally invalid
    /// credential aborts before any state transition. The call resolves once
    /// the server's `ready` frame arrives.
    pub async fn initialize(&self) -> Result<(), RealtimeError> {
        let _guard = self.inner.init_lock.lock().await;

        match self.connection_state() {
            ConnectionState::Connected | ConnectionState::Connecting => return Ok(()),
            _ => {}
        }

        credentials::validate_token(&self.token).map_err(RealtimeError::Credential)?;

        self.inner.set_state(ConnectionState::Connecting);

        let url = format!("{}?token={}", self.url, self.token);
        let (socket, _resp) = match connect_async(url).await {
            Ok(ok) => ok,
            Err(e) => {
                self.inner.set_state(ConnectionState::Error);
                return Err(RealtimeError::Transport(e.to_string()));
            }
        };

        let (mut sink, stream) = socket.split();

        let (out_tx, mut out_rx) = mpsc::channel::<Message>(64);
        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if sink.send(frame).await.is_err() {
                    break;
                }
            }
        });

        let (ready_tx, ready_rx) = oneshot::channel();
        self.inner.ready_waiters.lock().unwrap().push(ready_tx);
        *self.inner.out_tx.lock().unwrap() = Some(out_tx);
        *self.inner.writer.lock().unwrap() = Some(writer);

        let reader = tokio::spawn(read_loop(self.inner.clone(), stream));
        *self.inner.reader.lock().unwrap() = Some(reader);

        match tokio::time::timeout(self.subscribe_timeout, ready_rx).await {
            Ok(Ok(())) => Ok(()),
            _ => {
                self.disconnect().await;
                self.inner.set_state(ConnectionState::Error);
                Err(RealtimeError::Transport(
                    "no ready frame from server".into(),
                ))
            }
        }
    }

    /// Subscribes to `channel`, connecting first if necessary.
    ///
    /// At most one live subscription exists per channel: a second call while
    /// one is active (or in flight) reuses it. The server round-trips
    /// authorization before confirming; a rejection tears the local record
    /// down and surfaces as `ChannelNotFound` or `Unauthorized`.
    pub async fn subscribe(&self, channel: &str) -> Result<(), RealtimeError> {
        if self.connection_state() != ConnectionState::Connected {
            self.initialize().await?;
        }

        {
            let mut subs = self.inner.subs.lock().unwrap();
            if subs.contains_key(channel) {
                return Ok(());
            }
            subs.insert(channel.to_string(), ChannelSub::default());
        }

        let (tx, rx) = oneshot::channel();
        self.inner
            .pending_subscribes
            .lock()
            .unwrap()
            .entry(channel.to_string())
            .or_default()
            .push(tx);

        self.send_frame(&ClientFrame::Subscribe {
            channels: vec![channel.to_string()],
        })
        .await?;

        match tokio::time::timeout(self.subscribe_timeout, rx).await {
            Ok(Ok(SubscribeOutcome::Accepted)) => Ok(()),
            Ok(Ok(SubscribeOutcome::Rejected(reason))) => Err(match reason.as_str() {
                "ticket_not_found" | "unknown_channel" => {
                    RealtimeError::ChannelNotFound(channel.to_string())
                }
                _ => RealtimeError::Unauthorized {
                    channel: channel.to_string(),
                    reason,
                },
            }),
            Ok(Ok(SubscribeOutcome::ConnectionClosed)) | Ok(Err(_)) | Err(_) => {
                self.inner.subs.lock().unwrap().remove(channel);
                self.inner.pending_subscribes.lock().unwrap().remove(channel);
                Err(RealtimeError::Transport(
                    "no subscription confirmation".into(),
                ))
            }
        }
    }

    /// Ensures `channel` is subscribed, attaches `handler` to `event`, and
    /// returns the handle that removes exactly this handler again.
    pub async fn bind(
        &self,
        channel: &str,
        event: &str,
        handler: impl Fn(&serde_json::Value) + Send + Sync + 'static,
    ) -> Result<Binding, RealtimeError> {
        self.subscribe(channel).await?;

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let mut subs = self.inner.subs.lock().unwrap();
        subs.entry(channel.to_string())
            .or_default()
            .bindings
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));

        Ok(Binding {
            channel: channel.to_string(),
            event: event.to_string(),
            id,
        })
    }

    /// Removes the one handler identified by `binding`; other bindings on the
    /// same channel are untouched.
    pub fn unbind(&self, binding: &Binding) {
        let mut subs = self.inner.subs.lock().unwrap();
        if let Some(sub) = subs.get_mut(&binding.channel) {
            if let Some(handlers) = sub.bindings.get_mut(&binding.event) {
                handlers.retain(|(id, _)| *id != binding.id);
                if handlers.is_empty() {
                    sub.bindings.remove(&binding.event);
                }
            }
        }
    }

    /// Releases the subscription and all its bindings. Calling this for a
    /// channel that was never subscribed is a no-op.
    pub async fn unsubscribe(&self, channel: &str) {
        let existed = self.inner.subs.lock().unwrap().remove(channel).is_some();
        self.inner.pending_subscribes.lock().unwrap().remove(channel);

        if existed {
            // Best-effort: the connection may already be gone.
            let _ = self
                .send_frame(&ClientFrame::Unsubscribe {
                    channels: vec![channel.to_string()],
                })
                .await;
        }
    }

    /// Unsubscribes every channel, closes the socket and ends in
    /// `Disconnected`. Safe to call repeatedly and from any state.
    pub async fn disconnect(&self) {
        let out_tx = self.inner.out_tx.lock().unwrap().take();
        self.inner.teardown_connection();

        if let Some(tx) = out_tx {
            let _ = tx.send(Message::Close(None)).await;
        }
        if let Some(reader) = self.inner.reader.lock().unwrap().take() {
            reader.abort();
        }
        if let Some(writer) = self.inner.writer.lock().unwrap().take() {
            writer.abort();
        }

        self.inner.set_state(ConnectionState::Disconnected);
    }

    async fn send_frame(&self, frame: &ClientFrame) -> Result<(), RealtimeError> {
        let tx = self.inner.out_tx.lock().unwrap().clone();
        let Some(tx) = tx else {
            return Err(RealtimeError::Transport("not connected".into()));
        };
        let json = serde_json::to_string(frame)
            .map_err(|e| RealtimeError::Transport(format!("frame serialization failed: {e}")))?;
        tx.send(Message::Text(json.into()))
            .await
            .map_err(|_| RealtimeError::Transport("connection closed".into()))
    }
}

async fn read_loop(inner: Arc<Shared>, mut stream: WsStream) {
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(txt)) => handle_frame(&inner, txt.as_str()),
            Ok(Message::Ping(payload)) => {
                let tx = inner.out_tx.lock().unwrap().clone();
                if let Some(tx) = tx {
                    let _ = tx.send(Message::Pong(payload)).await;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("realtime transport error: {e}");
                inner.teardown_connection();
                inner.set_state(ConnectionState::Error);
                return;
            }
        }
    }

    // The stream ended without a transport error: either the server closed
    // or disconnect() aborted us. Subscriptions are not re-established
    // automatically; the owning sessions decide.
    inner.teardown_connection();
    if *inner.state.lock().unwrap() != ConnectionState::Disconnected {
        inner.set_state(ConnectionState::Disconnected);
    }
}

fn handle_frame(inner: &Arc<Shared>, raw: &str) {
    match serde_json::from_str::<ServerFrame>(raw) {
        Ok(ServerFrame::Ready { .. }) => {
            inner.set_state(ConnectionState::Connected);
            for waiter in inner.ready_waiters.lock().unwrap().drain(..) {
                let _ = waiter.send(());
            }
        }

        Ok(ServerFrame::SubscribeOk { accepted, rejected }) => {
            // One lock at a time; never pending and subs together.
            let mut outcomes: Vec<(oneshot::Sender<SubscribeOutcome>, SubscribeOutcome)> =
                Vec::new();
            {
                let mut pending = inner.pending_subscribes.lock().unwrap();
                for channel in &accepted {
                    if let Some(waiters) = pending.remove(channel) {
                        for w in waiters {
                            outcomes.push((w, SubscribeOutcome::Accepted));
                        }
                    }
                }
                for (channel, reason) in &rejected {
                    if let Some(waiters) = pending.remove(channel) {
                        for w in waiters {
                            outcomes.push((w, SubscribeOutcome::Rejected(reason.clone())));
                        }
                    }
                }
            }
            {
                // Not retained: the server refused these subscriptions.
                let mut subs = inner.subs.lock().unwrap();
                for (channel, _) in &rejected {
                    subs.remove(channel);
                }
            }
            for (waiter, outcome) in outcomes {
                let _ = waiter.send(outcome);
            }
        }

        Ok(ServerFrame::Event {
            event,
            channel,
            payload,
            ..
        }) => {
            let handlers: Vec<EventHandler> = {
                let subs = inner.subs.lock().unwrap();
                subs.get(&channel)
                    .and_then(|sub| sub.bindings.get(&event))
                    .map(|v| v.iter().map(|(_, h)| h.clone()).collect())
                    .unwrap_or_default()
            };
            for handler in handlers {
                handler(&payload);
            }
        }

        Ok(ServerFrame::Error { code, message }) => {
            tracing::warn!(%code, %message, "realtime server error frame");
        }

        Ok(ServerFrame::Pong) | Ok(ServerFrame::UnsubscribeOk { .. }) => {}

        Err(e) => {
            tracing::warn!("ignoring malformed realtime frame: {e}");
        }
    }
}
