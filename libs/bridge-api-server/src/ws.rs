use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use bridge_api::StoredEvent;

use super::AppState;

// ═══════════════════════════════════════════════════════════════
//  WebSocket: /ws
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(socket, state))
}

// ═══════════════════════════════════════════════════════════════
//  Protocol types
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct WsAction {
    action: String,
    /// Absent or empty: every topic.
    #[serde(default)]
    topic: Option<String>,
}

impl WsAction {
    fn topic(&self) -> Option<String> {
        self.topic.clone().filter(|t| !t.is_empty())
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum WsOutbound<'a> {
    Subscribed { topic: Option<&'a str> },
    Unsubscribed { topic: Option<&'a str> },
    OnCreateEvent { event: &'a StoredEvent },
}

type Subscriptions = HashMap<Option<String>, JoinHandle<()>>;

// ═══════════════════════════════════════════════════════════════
//  Connection handler
// ═══════════════════════════════════════════════════════════════

async fn ws_connection(mut socket: WebSocket, state: AppState) {
    let (mux_tx, mut mux_rx) = mpsc::channel::<StoredEvent>(state.ws_buffer);
    let mut subs: Subscriptions = HashMap::new();

    loop {
        tokio::select! {
            biased;

            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    _ => break,
                };

                let text = match msg {
                    Message::Text(t) => t,
                    Message::Close(_) => break,
                    _ => continue,
                };

                let action: WsAction = match serde_json::from_str(&text) {
                    Ok(a) => a,
                    Err(e) => {
                        send_error(&mut socket, &format!("parse: {e}")).await;
                        continue;
                    }
                };

                let topic = action.topic();
                match action.action.as_str() {
                    "subscribe" => {
                        subs.entry(topic.clone())
                            .or_insert_with(|| spawn_subscription(&state, topic.clone(), mux_tx.clone()));
                        send(&mut socket, &WsOutbound::Subscribed { topic: topic.as_deref() }).await;
                    }
                    "unsubscribe" => {
                        if let Some(handle) = subs.remove(&topic) {
                            handle.abort();
                        }
                        send(&mut socket, &WsOutbound::Unsubscribed { topic: topic.as_deref() }).await;
                    }
                    _ => send_error(&mut socket, "unknown action").await,
                }
            }

            event = mux_rx.recv() => {
                match event {
                    Some(event) => {
                        let msg = WsOutbound::OnCreateEvent { event: &event };
                        if !send(&mut socket, &msg).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    for (_, handle) in subs {
        handle.abort();
    }
}

fn spawn_subscription(
    state: &AppState,
    topic: Option<String>,
    tx: mpsc::Sender<StoredEvent>,
) -> JoinHandle<()> {
    let mut sub = state.gateway.subscribe(topic);
    tokio::spawn(async move {
        while let Some(event) = sub.recv().await {
            if tx.send(event).await.is_err() {
                break;
            }
        }
        tracing::debug!(topic = ?sub.topic(), "subscription closed");
    })
}

/// `false` once the socket is gone.
async fn send(socket: &mut WebSocket, msg: &WsOutbound<'_>) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "serialize ws message");
            true
        }
    }
}

async fn send_error(socket: &mut WebSocket, error: &str) {
    let json = serde_json::json!({ "error": error }).to_string();
    let _ = socket.send(Message::Text(json.into())).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_shape() {
        let event = StoredEvent {
            id: "e1".into(),
            topic: "taxi-rides".into(),
            key: None,
            data: serde_json::json!({ "n": 1 }),
            timestamp: 10,
            processed_at: Default::default(),
            ttl: 20,
            version: 1,
            last_changed_at: 10,
            deleted: false,
        };
        let json = serde_json::to_value(WsOutbound::OnCreateEvent { event: &event }).unwrap();
        assert_eq!(json["type"], "onCreateEvent");
        assert_eq!(json["event"]["id"], "e1");

        let json = serde_json::to_value(WsOutbound::Subscribed { topic: None }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "subscribed", "topic": null }));
    }

    #[test]
    fn test_empty_topic_means_all() {
        let action: WsAction = serde_json::from_str(r#"{"action":"subscribe","topic":""}"#).unwrap();
        assert_eq!(action.topic(), None);
        let action: WsAction = serde_json::from_str(r#"{"action":"subscribe","topic":"a"}"#).unwrap();
        assert_eq!(action.topic().as_deref(), Some("a"));
    }
}
