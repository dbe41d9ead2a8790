//! Single-socket multiplexer: one authenticated connection, channels
//! subscribed and unsubscribed over it with structured frames.

use axum::{
    Extension,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use common::frames::{ClientFrame, ServerFrame};
use futures::{SinkExt, StreamExt};
use std::collections::{HashMap, HashSet};
use util::{config, state::AppState};

use super::auth::{ChannelAccess, authorize_channel};
use crate::auth::claims::AuthUser;

pub async fn ws_entry(
    ws: WebSocketUpgrade,
    State(app): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve(socket, app, user))
}

struct Subs {
    pumps: HashMap<String, tokio::task::JoinHandle<()>>,
}

impl Subs {
    fn new() -> Self {
        Self {
            pumps: HashMap::new(),
        }
    }
}

async fn serve(socket: WebSocket, app: AppState, user: AuthUser) {
    let (mut sink, mut rx) = socket.split();

    let (tx_out, mut rx_out) = tokio::sync::mpsc::channel::<Message>(256);
    let writer = tokio::spawn(async move {
        while let Some(m) = rx_out.recv().await {
            if sink.send(m).await.is_err() {
                break;
            }
        }
    });

    // READY
    send_frame(&tx_out, &ServerFrame::Ready { policy_version: 1 }).await;

    let ws = app.ws_clone();
    let db = app.db_clone();
    let uid = user.0.sub;

    // Delivery policy fixed for the lifetime of the connection.
    let exclude_sender = config::ws_exclude_sender();

    let mut subs = Subs::new();
    let mut presence_channels: HashSet<String> = HashSet::new();

    let spawn_pump = |channel: String| {
        let ws = ws.clone();
        let tx_out = tx_out.clone();
        async move {
            let mut brx = ws.subscribe(&channel).await;
            tokio::spawn(async move {
                while let Ok(cm) = brx.recv().await {
                    if exclude_sender && cm.sender_id == Some(uid) {
                        continue;
                    }
                    if tx_out.send(Message::Text(cm.text.into())).await.is_err() {
                        break;
                    }
                }
            })
        }
    };

    while let Some(Ok(frame)) = rx.next().await {
        match frame {
            Message::Text(txt) => {
                let parsed = serde_json::from_str::<ClientFrame>(txt.as_str());
                match parsed {
                    Ok(ClientFrame::Ping) => {
                        send_frame(&tx_out, &ServerFrame::Pong).await;
                    }

                    Ok(ClientFrame::Subscribe { channels }) => {
                        let mut accepted = Vec::new();
                        let mut rejected = Vec::new();

                        for name in channels {
                            // Authorization runs on every request; ownership
                            // may have changed since the last subscribe.
                            match authorize_channel(&db, &user, &name).await {
                                ChannelAccess::Granted(_peer) => {
                                    if !subs.pumps.contains_key(&name) {
                                        let pump = spawn_pump(name.clone()).await;
                                        subs.pumps.insert(name.clone(), pump);
                                        app.ws().register(&name, uid).await;
                                        presence_channels.insert(name.clone());
                                    }
                                    accepted.push(name);
                                }
                                ChannelAccess::Denied(code) => {
                                    rejected.push((name, code.to_string()));
                                }
                            }
                        }

                        send_frame(&tx_out, &ServerFrame::SubscribeOk { accepted, rejected })
                            .await;
                    }

                    Ok(ClientFrame::Unsubscribe { channels }) => {
                        for name in channels.iter() {
                            if let Some(h) = subs.pumps.remove(name) {
                                h.abort();
                            }
                            if presence_channels.remove(name) {
                                app.ws().unregister(name, uid).await;
                            }
                        }
                        send_frame(&tx_out, &ServerFrame::UnsubscribeOk { channels }).await;
                    }

                    Err(e) => {
                        send_frame(
                            &tx_out,
                            &ServerFrame::Error {
                                code: "bad_request".into(),
                                message: format!("invalid frame: {e}"),
                            },
                        )
                        .await;
                    }
                }
            }

            Message::Ping(b) => {
                let _ = tx_out.send(Message::Pong(b)).await;
            }
            Message::Close(_) => break,
            Message::Pong(_) | Message::Binary(_) => {}
        }
    }

    // cleanup
    for (name, h) in subs.pumps.into_iter() {
        h.abort();
        if presence_channels.contains(&name) {
            app.ws().unregister(&name, uid).await;
        }
    }
    drop(tx_out);
    let _ = writer.await;
}

async fn send_frame(tx_out: &tokio::sync::mpsc::Sender<Message>, frame: &ServerFrame) {
    let json = serde_json::to_string(frame).unwrap();
    let _ = tx_out.send(Message::Text(json.into())).await;
}
