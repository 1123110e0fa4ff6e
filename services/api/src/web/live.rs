//! services/api/src/web/live.rs
//!
//! The live WebSocket feed. Each connection registers with the broadcaster and
//! receives every `LiveEvent` as a JSON text frame until either side closes.

use crate::web::{
    broadcast::Subscription,
    protocol::LiveEvent,
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use santri_core::User;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to live-feed connections.
pub async fn live_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user.id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    let Subscription { id, receiver } = app_state.broadcaster.subscribe().await;
    info!(user = %user_id, subscriber = %id, "live feed connected");

    let (sender, mut incoming) = socket.split();
    let token = CancellationToken::new();

    // --- 1. Forward broadcast events to the socket ---
    let forward_task = {
        let token = token.clone();
        tokio::spawn(async move { forward_events(sender, receiver, token).await })
    };

    // --- 2. Drain client frames until Close ---
    // The feed is one-way; the only client frame with meaning is Close.
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            frame = incoming.next() => match frame {
                Some(Ok(Message::Close(_))) => {
                    debug!(subscriber = %id, "client sent close");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(subscriber = %id, "live socket error: {}", e);
                    break;
                }
                None => break,
            },
        }
    }

    // --- 3. Cleanup ---
    token.cancel();
    app_state.broadcaster.unsubscribe(id).await;
    if let Err(e) = forward_task.await {
        error!("live forwarder panicked: {:?}", e);
    }
    info!(user = %user_id, subscriber = %id, "live feed closed");
}

async fn forward_events(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: tokio::sync::mpsc::UnboundedReceiver<LiveEvent>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = receiver.recv() => event,
        };
        // `None` means we were unsubscribed or the server is shutting down.
        let Some(event) = event else {
            let _ = sender.send(Message::Close(None)).await;
            break;
        };
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                error!("failed to encode live event: {}", e);
                continue;
            }
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
    // Wake the reader loop if we stopped first.
    token.cancel();
}
