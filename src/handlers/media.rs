//! Media WebSocket endpoint.
//!
//! The platform opens `/ws/{contextId}` after media streaming starts. The
//! socket is split into a [`FrameSource`] and a [`FrameSink`] and handed to
//! the orchestrator, which bridges it once the speech session is ready.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::bridge::{FrameSink, FrameSource, TelephonyTransport, TransportError, TransportMessage};
use crate::state::AppState;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

pub async fn media_handler(
    ws: WebSocketUpgrade,
    Path(context_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!(correlation_id = %context_id, "Media WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_socket(socket, context_id, state))
}

async fn handle_media_socket(socket: WebSocket, context_id: String, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    let transport = TelephonyTransport::new(
        Box::new(WsFrameSource { receiver }),
        Box::new(WsFrameSink { sender }),
    );

    if let Err(e) = state.orchestrator.attach_media(&context_id, transport).await {
        warn!(correlation_id = %context_id, "Media transport rejected: {}", e);
    }
}

/// Receiving half of the media WebSocket.
pub struct WsFrameSource {
    receiver: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn next_message(&mut self) -> Option<Result<TransportMessage, TransportError>> {
        loop {
            match self.receiver.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(TransportMessage::Text(text.to_string()))),
                Ok(Message::Binary(data)) => return Some(Ok(TransportMessage::Binary(data))),
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(frame)) => {
                    debug!(close = ?frame, "Media WebSocket closed by peer");
                    return None;
                }
                Err(e) => return Some(Err(TransportError::Io(e.to_string()))),
            }
        }
    }
}

/// Sending half of the media WebSocket.
pub struct WsFrameSink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sender
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // The peer may already be gone; closing the sink still releases it.
        let _ = self.sender.send(Message::Close(None)).await;
        self.sender
            .close()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}
