use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    services::broadcast,
    state::{SharedState, hub::ClientKey},
};

/// Handle the full lifecycle of a client WebSocket connection.
///
/// The connection is filed under `key`, receives the round snapshot, then
/// only listens for Ping and Close; every fragment it gets is pushed by the hub.
pub async fn handle_socket(state: SharedState, socket: WebSocket, key: ClientKey) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection = broadcast::attach_client(&state, key, outbound_tx.clone()).await;
    info!(connection = connection.id, key = ?connection.key, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Text(text)) => {
                debug!(connection = connection.id, payload = %text, "ignoring inbound text frame");
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = connection.id, error = %err, "websocket error");
                break;
            }
        }
    }

    broadcast::detach_client(&state, &connection);
    info!(connection = connection.id, "client disconnected");

    drop(connection);
    finalize(writer_task, outbound_tx).await;
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
