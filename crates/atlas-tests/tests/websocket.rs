use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use atlas_core::config::AppConfig;
use atlas_server::{build_app, AppState};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serve the app on an ephemeral port and return its socket URL.
async fn serve() -> (String, AppState) {
    let state = AppState::build(AppConfig::in_memory())
        .await
        .expect("failed to build in-memory state");
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind listener");
    let addr = listener.local_addr().expect("listener has no address");
    let app = build_app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server stopped");
    });
    (format!("ws://{addr}/api/websocket"), state)
}

async fn connect(url: &str) -> Client {
    let (client, _) = connect_async(url).await.expect("websocket handshake failed");
    client
}

async fn send_event(client: &mut Client, frame: Value) {
    client
        .send(Message::Text(frame.to_string().into()))
        .await
        .expect("failed to send frame");
}

/// Next JSON event, skipping metric samples.
async fn next_event(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            let event: Value = serde_json::from_str(text.as_str()).expect("frame is not JSON");
            if event["event"] != "metrics-update" {
                return event;
            }
        }
    }
}

async fn assert_silent(client: &mut Client) {
    let waited = tokio::time::timeout(Duration::from_millis(300), next_event(client)).await;
    assert!(waited.is_err(), "unexpected frame: {:?}", waited.ok());
}

async fn post_status(state: &AppState, room: &str, status: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/websocket/status")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"room": room, "status": status}).to_string()))
        .expect("failed to build request");
    let response = build_app(state.clone())
        .oneshot(request)
        .await
        .expect("router call failed");
    let code = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    (code, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn client_is_welcomed_with_its_id() {
    let (url, _state) = serve().await;
    let mut client = connect(&url).await;

    let welcome = next_event(&mut client).await;
    assert_eq!(welcome["event"], "welcome");
    assert!(!welcome["data"]["clientId"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn status_reaches_only_room_subscribers() {
    let (url, state) = serve().await;
    let mut subscriber = connect(&url).await;
    let mut bystander = connect(&url).await;
    assert_eq!(next_event(&mut subscriber).await["event"], "welcome");
    assert_eq!(next_event(&mut bystander).await["event"], "welcome");

    send_event(&mut subscriber, json!({"event": "subscribe", "data": " project-7 "})).await;
    let ack = next_event(&mut subscriber).await;
    assert_eq!(ack, json!({"event": "subscribed", "data": "project-7"}));

    let (code, body) = post_status(&state, "project-7", json!({"state": "running"})).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["delivered"], 1);

    let update = next_event(&mut subscriber).await;
    assert_eq!(update["event"], "status-update");
    assert_eq!(update["data"]["room"], "project-7");
    assert_eq!(update["data"]["status"]["state"], "running");
    assert_silent(&mut bystander).await;

    send_event(&mut subscriber, json!({"event": "unsubscribe", "data": "project-7"})).await;
    let ack = next_event(&mut subscriber).await;
    assert_eq!(ack, json!({"event": "unsubscribed", "data": "project-7"}));

    let (_, body) = post_status(&state, "project-7", json!({"state": "done"})).await;
    assert_eq!(body["delivered"], 0);
    assert_silent(&mut subscriber).await;
}

#[tokio::test]
async fn malformed_and_blank_frames_are_ignored() {
    let (url, _state) = serve().await;
    let mut client = connect(&url).await;
    assert_eq!(next_event(&mut client).await["event"], "welcome");

    client
        .send(Message::Text("not json".into()))
        .await
        .expect("failed to send frame");
    send_event(&mut client, json!({"event": "dance", "data": "ops"})).await;
    send_event(&mut client, json!({"event": "subscribe", "data": "   "})).await;
    assert_silent(&mut client).await;

    // The connection is still usable afterwards.
    send_event(&mut client, json!({"event": "subscribe", "data": "ops"})).await;
    assert_eq!(next_event(&mut client).await["event"], "subscribed");
}
