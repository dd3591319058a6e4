//! WebSocket Broadcaster
//!
//! Broadcasts store updates and heartbeats to all connected WebSocket clients.

use super::types::WsMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::QueryStore;

/// Channel for broadcasting updates to WebSocket clients
#[derive(Debug, Clone)]
pub struct WebSocketBroadcaster {
    tx: broadcast::Sender<String>,
}

impl WebSocketBroadcaster {
    /// Create a new broadcaster with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to receive broadcast messages
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Broadcast a message to all connected clients
    pub fn broadcast(&self, msg: &WsMessage) {
        if let Ok(json) = serde_json::to_string(msg) {
            // Ignore send errors (no receivers is fine)
            let _ = self.tx.send(json);
        }
    }

    /// Broadcast heartbeat
    pub fn broadcast_heartbeat(&self) {
        self.broadcast(&WsMessage::Heartbeat(chrono::Utc::now().timestamp_millis()));
    }

    /// Relay every store update until the store is dropped
    pub fn forward_store_updates(&self, store: &Arc<QueryStore>) -> JoinHandle<()> {
        let mut rx = store.subscribe();
        let broadcaster = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(update) => {
                        debug!(dataset = %update.key, tick = update.tick, "relaying store update");
                        broadcaster.broadcast(&WsMessage::DatasetUpdated(update));
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "WebSocket relay lagged behind store updates");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Send a heartbeat every `period`
    pub fn spawn_heartbeat(&self, period: Duration) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                broadcaster.broadcast_heartbeat();
            }
        })
    }
}

impl Default for WebSocketBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
