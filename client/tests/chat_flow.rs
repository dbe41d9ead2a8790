//! End-to-end flow against a real server: history fetch, optimistic send,
//! broadcast delivery, echo deduplication and the read-state side effect.

use std::sync::{Arc, Once};
use std::time::Duration;

use api::auth::generate_jwt;
use api::routes::routes;
use api::ws::ws_routes;
use axum::Router;
use client::{ChatError, ChatSession, ConnectionState, HttpChatApi, RealtimeClient, RealtimeError};
use common::payload::UserInfo;
use db::models::chat_messages::Model as ChatMessageModel;
use db::models::tickets::{Model as TicketModel, TicketCategory, TicketPriority};
use db::models::user::{Model as UserModel, UserRole};
use db::test_utils::setup_test_db;
use serial_test::serial;
use util::{state::AppState, ws::WebSocketManager};

fn init_test_env() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        unsafe {
            std::env::set_var("DATABASE_PATH", "sqlite::memory:");
            std::env::set_var("JWT_SECRET", "test-secret-key");
            std::env::set_var("JWT_DURATION_MINUTES", "60");
        }
    });
}

struct Harness {
    state: AppState,
    base_url: String,
    ws_url: String,
}

async fn spawn_app() -> Harness {
    init_test_env();

    let db = setup_test_db().await;
    let state = AppState::new(db, WebSocketManager::new());

    let router = Router::new()
        .nest("/api", routes(state.clone()))
        .nest("/ws", ws_routes(state.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    Harness {
        state,
        base_url: format!("http://{addr}"),
        ws_url: format!("ws://{addr}/ws"),
    }
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn user_info(user: &UserModel) -> UserInfo {
    UserInfo {
        id: user.id,
        name: user.name.clone(),
        role: user.role.to_string(),
    }
}

struct Actors {
    customer: UserModel,
    admin: UserModel,
    ticket: TicketModel,
}

async fn seed(state: &AppState) -> Actors {
    let db = state.db();
    let customer = UserModel::create(db, "Cust", "cust@test.com", "password123", UserRole::Customer)
        .await
        .unwrap();
    let admin = UserModel::create(db, "Admin", "admin@test.com", "password123", UserRole::Admin)
        .await
        .unwrap();
    let ticket = TicketModel::create(
        db,
        customer.id,
        "Need help",
        "Realtime please",
        TicketCategory::Support,
        TicketPriority::High,
    )
    .await
    .unwrap();
    Actors {
        customer,
        admin,
        ticket,
    }
}

#[tokio::test]
#[serial]
async fn full_conversation_flow() {
    let harness = spawn_app().await;
    let actors = seed(&harness.state).await;

    let (customer_token, _) = generate_jwt(actors.customer.id, false);
    let (admin_token, _) = generate_jwt(actors.admin.id, true);

    // Customer opens the chat: empty history, then a live binding.
    let customer_rt = RealtimeClient::new(harness.ws_url.as_str(), customer_token.as_str());
    let customer_session = ChatSession::new(
        customer_rt.clone(),
        Arc::new(HttpChatApi::new(harness.base_url.as_str(), customer_token.as_str())),
        user_info(&actors.customer),
        actors.ticket.id,
    );
    customer_session.activate().await.unwrap();
    assert!(customer_session.messages().is_empty());
    assert_eq!(customer_rt.connection_state(), ConnectionState::Connected);

    // A second client (the admin) is watching the same conversation.
    let admin_rt = RealtimeClient::new(harness.ws_url.as_str(), admin_token.as_str());
    let admin_session = ChatSession::new(
        admin_rt.clone(),
        Arc::new(HttpChatApi::new(harness.base_url.as_str(), admin_token.as_str())),
        user_info(&actors.admin),
        actors.ticket.id,
    );
    admin_session.activate().await.unwrap();

    // Optimistic send: the confirmed message replaces the placeholder.
    let confirmed = customer_session.send("need help").await.unwrap();
    assert!(confirmed.id > 0);
    let mine = customer_session.messages();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, Some(confirmed.id));
    assert!(!mine[0].pending);

    // The admin receives the broadcast exactly once.
    wait_until("admin to receive the broadcast", || {
        admin_session.messages().len() == 1
    })
    .await;
    let theirs = admin_session.messages();
    assert_eq!(theirs[0].id, Some(confirmed.id));
    assert_eq!(theirs[0].message, "need help");
    assert_eq!(theirs[0].user.name, "Cust");

    // The sender's own echo must not have duplicated the entry.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(customer_session.messages().len(), 1);
    assert_eq!(admin_session.messages().len(), 1);

    // Receiving a foreign message marked the conversation read for the
    // admin, excluding the admin's own (nonexistent) messages.
    let db = harness.state.db();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let messages = ChatMessageModel::find_all_for_ticket(db, actors.ticket.id)
            .await
            .unwrap();
        if !messages.is_empty() && messages.iter().all(|m| m.is_read) {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for mark-read to land");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    customer_session.deactivate().await;
    admin_session.deactivate().await;
    customer_rt.disconnect().await;
    admin_rt.disconnect().await;
    assert_eq!(customer_rt.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
#[serial]
async fn strangers_cannot_activate_a_session_on_a_foreign_ticket() {
    let harness = spawn_app().await;
    let actors = seed(&harness.state).await;

    let stranger = UserModel::create(
        harness.state.db(),
        "Stranger",
        "stranger@test.com",
        "password123",
        UserRole::Customer,
    )
    .await
    .unwrap();
    let (token, _) = generate_jwt(stranger.id, false);

    let rt = RealtimeClient::new(harness.ws_url.as_str(), token.as_str());
    let session = ChatSession::new(
        rt.clone(),
        Arc::new(HttpChatApi::new(harness.base_url.as_str(), token.as_str())),
        user_info(&stranger),
        actors.ticket.id,
    );

    // The history fetch already refuses: the ticket reads as missing.
    let err = session.activate().await.unwrap_err();
    assert!(matches!(err, ChatError::Api(_)));

    // The subscription gate refuses independently.
    let channel = format!("ticket_{}", actors.ticket.id);
    let err = rt.subscribe(&channel).await.unwrap_err();
    assert!(matches!(err, RealtimeError::Unauthorized { .. }));

    rt.disconnect().await;
}

#[tokio::test]
#[serial]
async fn initialize_and_subscribe_are_idempotent() {
    let harness = spawn_app().await;
    let actors = seed(&harness.state).await;
    let (token, _) = generate_jwt(actors.customer.id, false);

    let rt = RealtimeClient::new(harness.ws_url.as_str(), token.as_str());
    rt.initialize().await.unwrap();
    rt.initialize().await.unwrap();
    assert_eq!(rt.connection_state(), ConnectionState::Connected);

    let channel = format!("ticket_{}", actors.ticket.id);
    rt.subscribe(&channel).await.unwrap();
    rt.subscribe(&channel).await.unwrap();

    // Subscribing to a channel for a missing ticket is refused cleanly.
    let err = rt.subscribe("ticket_999999").await.unwrap_err();
    assert!(matches!(err, RealtimeError::ChannelNotFound(_)));

    rt.disconnect().await;
}

#[tokio::test]
#[serial]
async fn state_observers_fire_on_transitions_only() {
    let harness = spawn_app().await;
    let actors = seed(&harness.state).await;
    let (token, _) = generate_jwt(actors.customer.id, false);

    let rt = RealtimeClient::new(harness.ws_url.as_str(), token.as_str());
    let seen: Arc<std::sync::Mutex<Vec<ConnectionState>>> =
        Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    rt.on_state_change(move |s| sink.lock().unwrap().push(s));

    rt.initialize().await.unwrap();
    rt.disconnect().await;

    let states = seen.lock().unwrap().clone();
    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected
        ]
    );
}
