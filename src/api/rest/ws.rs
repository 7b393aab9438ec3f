use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WatchQuery {
    /// Only forward entries for this tracking code.
    pub tracking_id: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WatchQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.tracking_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, tracking_id: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = BroadcastStream::new(state.tracking_events_tx.subscribe());

    info!(tracking_id = ?tracking_id, "websocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(update) = updates.next().await {
            let entry = match update {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "websocket subscriber lagged");
                    continue;
                }
            };

            if tracking_id
                .as_ref()
                .is_some_and(|wanted| *wanted != entry.tracking_id)
            {
                continue;
            }

            let json = match serde_json::to_string(&entry) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize tracking entry for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}
