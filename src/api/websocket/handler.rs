//! WebSocket connection handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tracing::debug;

use super::state::AppState;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::types::ConnectionId;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let connection_id = state.hub.connect();
    let mut outbound = state.transport.attach(&connection_id);

    let welcome = ServerMessage::Connected {
        connection_id: connection_id.clone(),
    };
    if !send_message(&mut socket, &welcome).await {
        state.hub.disconnect(&connection_id);
        return; // Client disconnected immediately
    }

    loop {
        tokio::select! {
            // Relay messages queued for this connection
            queued = outbound.recv() => {
                match queued {
                    Some(message) => {
                        if !send_message(&mut socket, &message).await {
                            break;
                        }
                    }
                    None => break, // Route released
                }
            }

            // Handle client messages
            result = socket.recv() => {
                match result {
                    Some(Ok(msg)) => {
                        if !handle_client_message(&state, &connection_id, msg, &mut socket).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(connection = %connection_id, error = %e, "websocket error");
                        break;
                    }
                    None => break, // Client disconnected
                }
            }
        }
    }

    state.hub.disconnect(&connection_id);
}

async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            debug!(error = %e, "failed to encode outbound message");
            true
        }
    }
}

/// Handle a message from the client
/// Returns false if the connection should be closed
async fn handle_client_message(
    state: &AppState,
    connection_id: &ConnectionId,
    msg: Message,
    socket: &mut WebSocket,
) -> bool {
    match msg {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Subscribe(request)) => {
                    // Ack and snapshot go out through the transport queue
                    state.hub.subscribe(connection_id, request);
                }
                Ok(ClientMessage::Ingest { data }) => {
                    let _ = state.hub.ingest_from(connection_id, data);
                }
                Ok(ClientMessage::Ping) => {
                    return send_message(socket, &ServerMessage::Pong).await;
                }
                Err(e) => {
                    let error = ServerMessage::error("bad_request", format!("unreadable message: {}", e));
                    return send_message(socket, &error).await;
                }
            }
            true
        }
        Message::Binary(_) => true, // Ignore binary messages
        Message::Ping(data) => socket.send(Message::Pong(data)).await.is_ok(),
        Message::Pong(_) => true, // Ignore pong responses
        Message::Close(_) => false, // Client requested close
    }
}
