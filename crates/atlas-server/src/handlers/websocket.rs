use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Json,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashSet;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use atlas_core::api_types::{StatusUpdateRequest, StatusUpdateResponse};

use crate::error::{ApiError, ApiResult};
use crate::realtime::{ClientEvent, ServerEvent, StatusHub, Welcome};
use crate::state::AppState;

/// GET /api/websocket
pub async fn websocket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            warn!(error = %e, "Failed to encode server event");
            None
        }
    }
}

/// Trimmed room name, or `None` when nothing is left.
fn room_name(raw: &str) -> Option<&str> {
    let room = raw.trim();
    (!room.is_empty()).then_some(room)
}

async fn handle_socket(socket: WebSocket, hub: StatusHub) {
    let (client_id, mut events) = hub.register().await;
    let (mut sender, mut receiver) = socket.split();
    let mut rooms: HashSet<String> = HashSet::new();

    let welcome = ServerEvent::Welcome(Welcome {
        client_id: client_id.clone(),
        message: "Connected to Atlas ERP real-time updates".into(),
    });
    if let Some(frame) = encode(&welcome) {
        if sender.send(frame).await.is_err() {
            hub.disconnect(&client_id).await;
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(client_id = %client_id, error = %e, "WebSocket receive failed");
                        break;
                    }
                };

                let reply = match serde_json::from_str::<ClientEvent>(text.as_str()) {
                    Ok(ClientEvent::Subscribe(raw)) => {
                        let Some(room) = room_name(&raw) else {
                            warn!(client_id = %client_id, "Ignoring subscribe without a room");
                            continue;
                        };
                        hub.subscribe(&client_id, room).await;
                        rooms.insert(room.to_string());
                        ServerEvent::Subscribed(room.to_string())
                    }
                    Ok(ClientEvent::Unsubscribe(raw)) => {
                        let Some(room) = room_name(&raw) else {
                            warn!(client_id = %client_id, "Ignoring unsubscribe without a room");
                            continue;
                        };
                        hub.unsubscribe(&client_id, room).await;
                        rooms.remove(room);
                        ServerEvent::Unsubscribed(room.to_string())
                    }
                    Err(e) => {
                        warn!(client_id = %client_id, error = %e, "Ignoring malformed client frame");
                        continue;
                    }
                };
                if let Some(frame) = encode(&reply) {
                    if sender.send(frame).await.is_err() {
                        break;
                    }
                }
            }
            event = events.recv() => {
                let envelope = match event {
                    Ok(envelope) => envelope,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(client_id = %client_id, skipped, "Client lagged behind, skipping events");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if !envelope.is_for(&rooms) {
                    continue;
                }
                if let Some(frame) = encode(&envelope.event) {
                    if sender.send(frame).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    hub.disconnect(&client_id).await;
}

/// POST /api/websocket/status
pub async fn post_status(
    State(state): State<AppState>,
    body: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<StatusUpdateResponse>> {
    let Json(request) = body?;
    let room = room_name(&request.room)
        .ok_or_else(|| ApiError::bad_request("room must not be empty"))?;
    let delivered = state.hub.publish_status(room, request.status).await;
    info!(room, delivered, "Status update posted");
    Ok(Json(StatusUpdateResponse {
        room: room.to_string(),
        delivered,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_names_are_trimmed() {
        assert_eq!(room_name("  project-7 "), Some("project-7"));
        assert_eq!(room_name("ops"), Some("ops"));
    }

    #[test]
    fn blank_room_names_are_rejected() {
        assert_eq!(room_name(""), None);
        assert_eq!(room_name(" \t\n"), None);
    }
}
