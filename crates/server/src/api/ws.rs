//! WebSocket feed of job updates for the browser UI.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vidgrab_core::Job;

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// WebSocket message sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Snapshot of a job after any change.
    JobUpdate { job: Job },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn type_label(&self) -> &'static str {
        match self {
            WsMessage::JobUpdate { .. } => "job_update",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender.send(msg);
    }

    /// Subscribe to receive messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    pub fn job_updated(&self, job: &Job) {
        self.broadcast(WsMessage::JobUpdate { job: job.clone() });
    }

    /// Forward every orchestrator update to connected clients until the
    /// orchestrator is dropped.
    pub fn relay_jobs(&self, mut updates: broadcast::Receiver<Job>) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(job) => broadcaster.job_updated(&job),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Job update relay lagged, skipped {} updates", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Job update feed closed");
                        break;
                    }
                }
            }
        })
    }

    /// Send a heartbeat every `period`.
    pub fn spawn_heartbeat(&self, period: Duration) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                broadcaster.broadcast(WsMessage::Heartbeat {
                    timestamp: chrono::Utc::now().timestamp(),
                });
            }
        })
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &WsMessage,
) -> Result<(), ()> {
    match serde_json::to_string(msg) {
        Ok(json) => {
            WS_MESSAGES_SENT.with_label_values(&[msg.type_label()]).inc();
            sender
                .send(Message::Text(json.into()))
                .await
                .map_err(|_| debug!("WebSocket send failed, client disconnected"))
        }
        Err(e) => {
            error!("Failed to serialize WsMessage: {}", e);
            Ok(())
        }
    }
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so no update falls in between
    let mut rx = state.ws_broadcaster().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    let snapshot = state.orchestrator().jobs().await;

    let send_task = tokio::spawn(async move {
        for job in snapshot {
            if send_message(&mut sender, &WsMessage::JobUpdate { job })
                .await
                .is_err()
            {
                return;
            }
        }

        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if send_message(&mut sender, &msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    // Intents go through the HTTP API; the socket only listens for close
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Ignoring client text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidgrab_core::JobKind;

    #[test]
    fn test_job_update_serialization() {
        let msg = WsMessage::JobUpdate {
            job: Job::idle(JobKind::Extraction),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "job_update");
        assert_eq!(json["job"]["kind"], "extraction");
        assert_eq!(json["job"]["state"], "idle");
    }

    #[test]
    fn test_heartbeat_serialization() {
        let json = serde_json::to_value(WsMessage::Heartbeat { timestamp: 42 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "heartbeat", "timestamp": 42}));
    }

    #[tokio::test]
    async fn test_relay_forwards_job_updates() {
        let broadcaster = WsBroadcaster::default();
        let mut rx = broadcaster.subscribe();
        let (tx, updates) = broadcast::channel(8);

        let handle = broadcaster.relay_jobs(updates);
        tx.send(Job::idle(JobKind::Compression)).unwrap();

        match rx.recv().await.unwrap() {
            WsMessage::JobUpdate { job } => assert_eq!(job.kind, JobKind::Compression),
            other => panic!("unexpected message: {:?}", other),
        }

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_waits_one_period() {
        let broadcaster = WsBroadcaster::default();
        let mut rx = broadcaster.subscribe();
        let start = tokio::time::Instant::now();

        let handle = broadcaster.spawn_heartbeat(Duration::from_secs(30));
        let msg = rx.recv().await.unwrap();

        assert!(matches!(msg, WsMessage::Heartbeat { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(30));
        handle.abort();
    }
}
