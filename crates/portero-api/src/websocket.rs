//! WebSocket handler for real-time updates

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use hikconnect_client::CallStatus;
use intercom_core::WatcherEvent;
use serde::Serialize;

use crate::AppState;

/// WebSocket events sent to clients
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    Connected,
    CallStatusChanged {
        serial: String,
        status: CallStatus,
        previous: Option<CallStatus>,
    },
    DoorbellRinging {
        serial: String,
    },
    AvailabilityChanged {
        serial: String,
        available: bool,
    },
    DeviceUpdated {
        serial: String,
    },
}

impl From<WatcherEvent> for WsEvent {
    fn from(event: WatcherEvent) -> Self {
        match event {
            WatcherEvent::CallStatusChanged {
                serial,
                status,
                previous,
            } => WsEvent::CallStatusChanged {
                serial,
                status,
                previous,
            },
            WatcherEvent::DoorbellRinging { serial } => WsEvent::DoorbellRinging { serial },
            WatcherEvent::AvailabilityChanged { serial, available } => {
                WsEvent::AvailabilityChanged { serial, available }
            }
            WatcherEvent::DeviceUpdated { serial } => WsEvent::DeviceUpdated { serial },
        }
    }
}

/// Handle a WebSocket connection
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Send connected message
    let connected_msg = serde_json::to_string(&WsEvent::Connected).unwrap();
    if sender.send(Message::Text(connected_msg)).await.is_err() {
        return;
    }

    // Forward watcher events to the client
    let mut event_rx = state.watcher.subscribe();
    let send_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    let json = serde_json::to_string(&WsEvent::from(event)).unwrap();
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                    // Skip missed messages
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    });

    // Handle incoming messages (for future use)
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(_text)) => {
                // Handle client commands here if needed
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // Clean up
    send_task.abort();
}
