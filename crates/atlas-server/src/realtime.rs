//! Room-based status relay and metric broadcast behind `/api/websocket`.
//!
//! Every connection receives every [`Envelope`] from one broadcast channel
//! and drops the room-scoped ones it has not subscribed to. The hub also
//! keeps a registry of live clients and their rooms so senders can report
//! how many connections an update reached.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub client_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsUpdate {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    pub room: String,
    pub status: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Frames sent to clients as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Welcome(Welcome),
    Subscribed(String),
    Unsubscribed(String),
    MetricsUpdate(MetricsUpdate),
    StatusUpdate(StatusUpdate),
}

/// Frames accepted from clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Subscribe(String),
    Unsubscribe(String),
}

/// A broadcast event, optionally scoped to one room.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub room: Option<String>,
    pub event: ServerEvent,
}

impl Envelope {
    pub fn is_for(&self, rooms: &HashSet<String>) -> bool {
        self.room.as_ref().map_or(true, |room| rooms.contains(room))
    }
}

#[derive(Clone)]
pub struct StatusHub {
    tx: broadcast::Sender<Envelope>,
    clients: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

impl Default for StatusHub {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

impl StatusHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a new connection. The receiver only sees events sent after
    /// this call.
    pub async fn register(&self) -> (String, broadcast::Receiver<Envelope>) {
        let client_id = Uuid::new_v4().to_string();
        let rx = self.tx.subscribe();
        self.clients
            .write()
            .await
            .insert(client_id.clone(), HashSet::new());
        tracing::info!(client_id = %client_id, "WebSocket client connected");
        (client_id, rx)
    }

    pub async fn disconnect(&self, client_id: &str) {
        self.clients.write().await.remove(client_id);
        tracing::info!(client_id = %client_id, "WebSocket client disconnected");
    }

    pub async fn subscribe(&self, client_id: &str, room: &str) {
        if let Some(rooms) = self.clients.write().await.get_mut(client_id) {
            rooms.insert(room.to_string());
        }
        tracing::debug!(client_id, room, "Client joined room");
    }

    pub async fn unsubscribe(&self, client_id: &str, room: &str) {
        if let Some(rooms) = self.clients.write().await.get_mut(client_id) {
            rooms.remove(room);
        }
        tracing::debug!(client_id, room, "Client left room");
    }

    pub async fn room_size(&self, room: &str) -> usize {
        self.clients
            .read()
            .await
            .values()
            .filter(|rooms| rooms.contains(room))
            .count()
    }

    /// Send a metric sample to every connection. Returns the number of
    /// receivers.
    pub fn publish_metrics(&self, value: f64) -> usize {
        let event = ServerEvent::MetricsUpdate(MetricsUpdate {
            value,
            timestamp: Utc::now(),
        });
        self.tx
            .send(Envelope { room: None, event })
            .unwrap_or(0)
    }

    /// Relay a status update to the subscribers of `room`. Returns how many
    /// live connections are subscribed.
    pub async fn publish_status(&self, room: &str, status: serde_json::Value) -> usize {
        let delivered = self.room_size(room).await;
        let event = ServerEvent::StatusUpdate(StatusUpdate {
            room: room.to_string(),
            status,
            timestamp: Utc::now(),
        });
        // No receivers is not an error here.
        let _ = self.tx.send(Envelope {
            room: Some(room.to_string()),
            event,
        });
        tracing::info!(room, delivered, "Relayed status update");
        delivered
    }
}
