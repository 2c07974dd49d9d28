//! WebSocket upgrade handler for producer and consumer connections.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Upgrade to WebSocket
//! 2. Announce the connection to the relay loop (unclassified)
//! 3. Pump inbound frames into the relay and its outbound queue onto the socket
//! 4. Report the disconnect so the relay can clean up

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::domain::foundation::ConnectionId;

use super::messages::Outbound;
use super::relay::RelayHandle;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub relay: RelayHandle,
}

impl WebSocketState {
    pub fn new(relay: RelayHandle) -> Self {
        Self { relay }
    }
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws`
///
/// Peers are not authenticated; the first frame must be a `register`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WebSocketState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection until either side ends it.
async fn handle_socket(socket: WebSocket, state: WebSocketState) {
    let (sender, mut receiver) = socket.split();

    let (connection_id, outbound) = match state.relay.connect().await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!("Rejecting connection: {}", e);
            return;
        }
    };

    let mut send_task = tokio::spawn(write_outbound(sender, outbound, connection_id));

    let relay = state.relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            let forwarded = match result {
                Ok(Message::Text(text)) => relay.frame(connection_id, text).await,
                Ok(Message::Pong(_)) => relay.pong(connection_id).await,
                Ok(Message::Binary(_)) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        "Received unsupported binary message"
                    );
                    Ok(())
                }
                Ok(Message::Ping(_)) => {
                    // WebSocket protocol ping - answered automatically by axum
                    Ok(())
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %connection_id, "Peer sent close frame");
                    break;
                }
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, "Receive error: {}", e);
                    break;
                }
            };

            if forwarded.is_err() {
                break;
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let _ = state.relay.disconnect(connection_id).await;
}

/// Drain the relay's outbound queue onto the socket.
///
/// Ends on `Outbound::Close`, when the relay drops the queue, or on a send error.
async fn write_outbound(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    connection_id: ConnectionId,
) {
    while let Some(frame) = outbound.recv().await {
        let result = match frame {
            Outbound::Text(text) => sender.send(Message::Text(text)).await,
            Outbound::Ping => sender.send(Message::Ping(Vec::new())).await,
            Outbound::Close => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        };

        if let Err(e) = result {
            tracing::debug!(
                connection_id = %connection_id,
                "Send error, closing connection: {}",
                e
            );
            break;
        }
    }
    let _ = sender.close().await;
}

/// Create axum router for the WebSocket endpoint.
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route("/ws", get(ws_handler))
}
