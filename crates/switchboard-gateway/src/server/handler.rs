//! WebSocket handler
//!
//! Handles client WebSocket connections: reads envelopes, writes queued frames
//! and runs the heartbeat until either side goes away.

use crate::connection::Connection;
use crate::handlers::MessageDispatcher;
use crate::heartbeat::HeartbeatMonitor;
use crate::protocol::OutboundFrame;
use crate::server::GatewayState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Channel buffer size for outgoing frames
const MESSAGE_BUFFER_SIZE: usize = 256;

/// How long the writer may take to flush a close frame
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// WebSocket gateway handler
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(state, socket))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, socket: WebSocket) {
    let (tx, mut rx) = mpsc::channel::<OutboundFrame>(MESSAGE_BUFFER_SIZE);
    let connection = state.connections.add_connection(tx);
    let connection_id = connection.id().to_string();

    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Receive envelopes from the client
    let state_recv = state.clone();
    let connection_recv = connection.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    MessageDispatcher::handle_text(&state_recv, &connection_recv, &text).await;
                }
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        MessageDispatcher::handle_text(&state_recv, &connection_recv, &text).await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            connection_id = %connection_recv.id(),
                            error = %e,
                            "Non-UTF-8 binary frame dropped"
                        );
                    }
                },
                Ok(Message::Pong(_)) => {
                    let latency = connection_recv.record_pong();
                    tracing::trace!(connection_id = %connection_recv.id(), latency_ms = ?latency, "Pong received");
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by axum
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(connection_id = %connection_recv.id(), "Client closed connection");
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection_recv.id(),
                        error = %e,
                        "WebSocket error"
                    );
                    break;
                }
            }
        }
    });

    // Write queued frames to the client
    let connection_id_send = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let message = match frame {
                OutboundFrame::Text(text) => Message::Text(text),
                OutboundFrame::Ping => Message::Ping(Vec::new()),
                OutboundFrame::Close => {
                    if let Err(e) = ws_sink.send(Message::Close(None)).await {
                        tracing::debug!(connection_id = %connection_id_send, error = %e, "Close frame not sent");
                    }
                    break;
                }
            };

            if let Err(e) = ws_sink.send(message).await {
                tracing::warn!(
                    connection_id = %connection_id_send,
                    error = %e,
                    "Failed to send message to WebSocket"
                );
                break;
            }
        }

        if let Err(e) = ws_sink.close().await {
            tracing::debug!(connection_id = %connection_id_send, error = %e, "WebSocket sink not closed cleanly");
        }
    });

    let mut heartbeat_task =
        tokio::spawn(HeartbeatMonitor::new(connection.clone(), &state.heartbeat).run());

    // Wait for any task to complete
    tokio::select! {
        _ = &mut recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task ended");
        }
        _ = &mut send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task ended");
        }
        exit = &mut heartbeat_task => {
            tracing::debug!(connection_id = %connection_id, exit = ?exit.ok(), "Heartbeat task ended");
            // Let the writer flush a pending close frame
            if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut send_task).await.is_err() {
                tracing::debug!(connection_id = %connection_id, "Close frame not flushed in time");
            }
        }
    }

    recv_task.abort();
    send_task.abort();
    heartbeat_task.abort();

    cleanup_connection(&state, &connection);
}

/// Clean up a connection on disconnect
fn cleanup_connection(state: &GatewayState, connection: &Arc<Connection>) {
    let purged = state.transactions.purge_connection(connection.id());
    state.connections.remove_connection(connection.id());

    tracing::info!(
        connection_id = %connection.id(),
        purged_transactions = purged,
        "Connection closed"
    );
}
