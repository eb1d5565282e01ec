use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::poll::{parse_client_event, Frame, PollServer};

pub async fn handle_poll_websocket(websocket: WebSocket, poll_server: Arc<PollServer>) {
    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    let connection_id = poll_server.connect(tx).await;

    // Forward outbound frames; a Close frame ends the connection from our side.
    let sender_id = connection_id.clone();
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let (message, closing) = match frame {
                Frame::Text(text) => (Message::text(text), false),
                Frame::Close => (Message::close(), true),
            };
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(connection_id = %sender_id, error = %e, "Failed to send WebSocket message");
                break;
            }
            if closing {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    // Each message is handled to completion before the next is read.
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => {
                if message.is_close() {
                    break;
                }
                handle_websocket_message(&poll_server, &connection_id, message).await;
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    poll_server.handle_disconnect(&connection_id).await;
    sender_task.abort();
}

async fn handle_websocket_message(poll_server: &Arc<PollServer>, connection_id: &str, message: Message) {
    let Ok(text) = message.to_str() else {
        // Ping/pong are answered by warp; binary frames carry nothing for us.
        return;
    };
    tracing::debug!(connection_id = %connection_id, "Received poll message: {}", text);

    match parse_client_event(text) {
        Ok(event) => poll_server.handle_event(connection_id, event).await,
        Err(e) => {
            tracing::warn!(
                connection_id = %connection_id,
                error = %e,
                raw_message = %text,
                "Failed to parse poll message"
            );
        }
    }
}
