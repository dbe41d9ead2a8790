use axum::{
    body::Body,
    http::{Request, Response},
};
use serde_json::Value;
use std::convert::Infallible;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message},
};
use tower::make::Shared;
use tower::util::BoxCloneService;
use url::Url;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Spawns the Axum app on a random local port
pub async fn spawn_server(
    app: BoxCloneService<Request<Body>, Response<Body>, Infallible>,
) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let service = Shared::new(app);

    tokio::spawn(async move {
        axum::serve(listener, service).await.unwrap();
    });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    addr
}

/// Connects to the realtime endpoint at `/ws?token=...`
pub async fn connect_ws(
    addr: &str,
    token: &str,
) -> Result<
    (WsClient, axum::http::Response<Option<Vec<u8>>>),
    tokio_tungstenite::tungstenite::Error,
> {
    let url = Url::parse(&format!("ws://{}/ws?token={}", addr, token)).unwrap();

    let req = url.to_string().into_client_request().unwrap();
    connect_async(req).await
}

/// Sends one JSON frame.
pub async fn send_client_json(ws: &mut WsClient, value: Value) {
    use futures_util::SinkExt;
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Receives the next text frame as JSON, failing after two seconds.
pub async fn recv_server_json(ws: &mut WsClient) -> Value {
    use futures_util::StreamExt;
    let frame = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(txt))) => return txt.to_string(),
                Some(Ok(_)) => continue,
                other => panic!("websocket ended unexpectedly: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a websocket frame");

    serde_json::from_str(&frame).unwrap()
}
